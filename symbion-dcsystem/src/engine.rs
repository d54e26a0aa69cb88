//! Aggregation engine
//!
//! Each update discovers the current devices, reads their telemetry through
//! the registry and reduces everything into one staged snapshot:
//! - current and power are a net balance, sources negated, loads as reported
//! - energy counters are relayed sums (loads feed energy in, sources energy out)
//! - voltage is the mean over devices above the deadband
//! - every alarm is the worst severity reported by any device

use crate::models::{
    AggregateSnapshot, AlarmLevel, Alarms, DeviceAttribute, DeviceClass, DeviceHandle,
};
use crate::registry::{discover_devices, DeviceRegistry};
use tracing::{debug, trace};

/// Devices reporting this voltage or less are left out of the voltage average
pub const VOLTAGE_DEADBAND: f64 = 1.0;

/// Telemetry of one device for one cycle, defaults already applied
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReading {
    pub handle: DeviceHandle,
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub energy_in: f64,
    pub energy_out: f64,
    pub alarms: Alarms,
}

impl DeviceReading {
    /// Reads one device, substituting defaults for anything missing.
    ///
    /// Power falls back to `voltage * current` when the device does not
    /// report it. Non-finite values count as missing.
    pub fn read<R: DeviceRegistry + ?Sized>(registry: &R, handle: DeviceHandle) -> Self {
        let value = |attribute| {
            registry
                .read_attribute(&handle, attribute)
                .filter(|v: &f64| v.is_finite())
        };
        let alarm = |attribute| value(attribute).map(AlarmLevel::from_value).unwrap_or_default();

        let current = value(DeviceAttribute::Current).unwrap_or(0.0);
        let voltage = value(DeviceAttribute::Voltage).unwrap_or(0.0);
        let power = value(DeviceAttribute::Power).unwrap_or(voltage * current);
        let (energy_in, energy_out) = match handle.class {
            DeviceClass::Load => (value(DeviceAttribute::EnergyIn).unwrap_or(0.0), 0.0),
            DeviceClass::Source => (0.0, value(DeviceAttribute::EnergyOut).unwrap_or(0.0)),
        };
        let alarms = Alarms {
            low_voltage: alarm(DeviceAttribute::LowVoltageAlarm),
            high_voltage: alarm(DeviceAttribute::HighVoltageAlarm),
            low_temperature: alarm(DeviceAttribute::LowTemperatureAlarm),
            high_temperature: alarm(DeviceAttribute::HighTemperatureAlarm),
        };

        DeviceReading {
            handle,
            current,
            voltage,
            power,
            energy_in,
            energy_out,
            alarms,
        }
    }

    /// Current as it counts towards the net balance (sources negated)
    pub fn signed_current(&self) -> f64 {
        match self.handle.class {
            DeviceClass::Load => self.current,
            DeviceClass::Source => -self.current,
        }
    }

    /// Power as it counts towards the net balance (sources negated)
    pub fn signed_power(&self) -> f64 {
        match self.handle.class {
            DeviceClass::Load => self.power,
            DeviceClass::Source => -self.power,
        }
    }
}

/// Running totals of one reduction pass
#[derive(Debug, Default)]
struct Totals {
    current: f64,
    power: f64,
    energy_in: f64,
    energy_out: f64,
    voltage_sum: f64,
    voltage_count: usize,
    alarms: Alarms,
}

impl Totals {
    fn accumulate(mut self, reading: &DeviceReading) -> Self {
        self.current += reading.signed_current();
        self.power += reading.signed_power();
        match reading.handle.class {
            DeviceClass::Load => self.energy_in += reading.energy_in,
            DeviceClass::Source => self.energy_out += reading.energy_out,
        }
        if reading.voltage > VOLTAGE_DEADBAND {
            self.voltage_sum += reading.voltage;
            self.voltage_count += 1;
        }
        self.alarms = self.alarms.escalate(reading.alarms);
        self
    }

    fn into_snapshot(self) -> AggregateSnapshot {
        let voltage = if self.voltage_count > 0 {
            self.voltage_sum / self.voltage_count as f64
        } else {
            0.0
        };
        AggregateSnapshot {
            voltage,
            current: self.current,
            power: self.power,
            energy_in: self.energy_in,
            energy_out: self.energy_out,
            alarms: self.alarms,
        }
    }
}

/// Reduces a set of readings into one snapshot.
///
/// Readings are folded in handle order so the result is identical, bit for
/// bit, whatever order the slice comes in.
pub fn reduce(readings: &[DeviceReading]) -> AggregateSnapshot {
    let mut ordered: Vec<&DeviceReading> = readings.iter().collect();
    ordered.sort_by(|a, b| a.handle.cmp(&b.handle));
    ordered
        .into_iter()
        .fold(Totals::default(), |totals, reading| totals.accumulate(reading))
        .into_snapshot()
}

/// Outcome of one update cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub loads: usize,
    pub sources: usize,
}

impl UpdateReport {
    pub fn devices(&self) -> usize {
        self.loads + self.sources
    }
}

/// Owner of the staging snapshot, rewritten wholesale by every update
#[derive(Debug, Default)]
pub struct Aggregator {
    staged: AggregateSnapshot,
    cycles: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one discovery + reduction cycle into the staging snapshot
    pub fn update<R: DeviceRegistry + ?Sized>(&mut self, registry: &R) -> UpdateReport {
        let handles = discover_devices(registry);
        let mut report = UpdateReport::default();

        let readings: Vec<DeviceReading> = handles
            .into_iter()
            .map(|handle| {
                match handle.class {
                    DeviceClass::Load => report.loads += 1,
                    DeviceClass::Source => report.sources += 1,
                }
                let reading = DeviceReading::read(registry, handle);
                trace!(device = %reading.handle, current = reading.current, voltage = reading.voltage, "device reading");
                reading
            })
            .collect();

        self.staged = reduce(&readings);
        self.cycles += 1;

        debug!(
            loads = report.loads,
            sources = report.sources,
            voltage = self.staged.voltage,
            current = self.staged.current,
            power = self.staged.power,
            "aggregate updated"
        );
        report
    }

    pub fn staged(&self) -> &AggregateSnapshot {
        &self.staged
    }

    /// Direct access to the staging area, for hosts and tests that need to
    /// inject values between an update and the next flush
    pub fn staged_mut(&mut self) -> &mut AggregateSnapshot {
        &mut self.staged
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
