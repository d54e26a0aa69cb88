//! Data model of the DC system aggregator.
//!
//! Device classes and handles, the alarm severity scale, the attribute keys
//! read from each device and the nine fields of the aggregate snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a contributing device on the DC bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    /// Draws current from the bus
    Load,
    /// Supplies current to the bus
    Source,
}

impl DeviceClass {
    /// Discovery order: all loads first, then all sources
    pub const ALL: [DeviceClass; 2] = [DeviceClass::Load, DeviceClass::Source];

    /// Service type name used on the device bus (ex: "dcload")
    pub fn service_type(&self) -> &'static str {
        match self {
            DeviceClass::Load => "dcload",
            DeviceClass::Source => "dcsource",
        }
    }

    /// Attributes read from a device of this class on every cycle
    pub fn attributes(&self) -> [DeviceAttribute; 8] {
        let energy = match self {
            DeviceClass::Load => DeviceAttribute::EnergyIn,
            DeviceClass::Source => DeviceAttribute::EnergyOut,
        };
        [
            DeviceAttribute::Current,
            DeviceAttribute::Voltage,
            DeviceAttribute::Power,
            energy,
            DeviceAttribute::LowVoltageAlarm,
            DeviceAttribute::HighVoltageAlarm,
            DeviceAttribute::LowTemperatureAlarm,
            DeviceAttribute::HighTemperatureAlarm,
        ]
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_type())
    }
}

/// One device discovered during the current cycle.
///
/// Rebuilt from live discovery on every update; never kept across cycles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceHandle {
    pub class: DeviceClass,
    pub name: String,
}

impl DeviceHandle {
    pub fn new<S: Into<String>>(class: DeviceClass, name: S) -> Self {
        Self { class, name: name.into() }
    }

    pub fn load<S: Into<String>>(name: S) -> Self {
        Self::new(DeviceClass::Load, name)
    }

    pub fn source<S: Into<String>>(name: S) -> Self {
        Self::new(DeviceClass::Source, name)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.name)
    }
}

/// Ordinal alarm severity, escalated by taking the maximum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmLevel {
    #[default]
    Ok = 0,
    Warning = 1,
    Alarm = 2,
}

impl AlarmLevel {
    /// Maps a numeric bus value onto the severity scale.
    ///
    /// Non-finite and non-positive values are `Ok`, anything from 2 up is `Alarm`.
    pub fn from_value(value: f64) -> Self {
        if !value.is_finite() {
            return AlarmLevel::Ok;
        }
        match value.round() {
            v if v <= 0.0 => AlarmLevel::Ok,
            v if v < 2.0 => AlarmLevel::Warning,
            _ => AlarmLevel::Alarm,
        }
    }

    pub fn as_value(self) -> f64 {
        self as u8 as f64
    }
}

/// Attribute read from an individual device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceAttribute {
    Current,
    Voltage,
    Power,
    EnergyIn,
    EnergyOut,
    LowVoltageAlarm,
    HighVoltageAlarm,
    LowTemperatureAlarm,
    HighTemperatureAlarm,
}

impl DeviceAttribute {
    /// Bus path of the attribute (ex: "/Dc/0/Current")
    pub fn path(&self) -> &'static str {
        match self {
            DeviceAttribute::Current => "/Dc/0/Current",
            DeviceAttribute::Voltage => "/Dc/0/Voltage",
            DeviceAttribute::Power => "/Dc/0/Power",
            DeviceAttribute::EnergyIn => "/History/EnergyIn",
            DeviceAttribute::EnergyOut => "/History/EnergyOut",
            DeviceAttribute::LowVoltageAlarm => "/Alarms/LowVoltage",
            DeviceAttribute::HighVoltageAlarm => "/Alarms/HighVoltage",
            DeviceAttribute::LowTemperatureAlarm => "/Alarms/LowTemperature",
            DeviceAttribute::HighTemperatureAlarm => "/Alarms/HighTemperature",
        }
    }
}

/// Field of the aggregate snapshot exposed by the composite device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SnapshotField {
    Voltage,
    Current,
    Power,
    EnergyIn,
    EnergyOut,
    LowVoltageAlarm,
    HighVoltageAlarm,
    LowTemperatureAlarm,
    HighTemperatureAlarm,
}

impl SnapshotField {
    pub const ALL: [SnapshotField; 9] = [
        SnapshotField::Voltage,
        SnapshotField::Current,
        SnapshotField::Power,
        SnapshotField::EnergyIn,
        SnapshotField::EnergyOut,
        SnapshotField::LowVoltageAlarm,
        SnapshotField::HighVoltageAlarm,
        SnapshotField::LowTemperatureAlarm,
        SnapshotField::HighTemperatureAlarm,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            SnapshotField::Voltage => "/Dc/0/Voltage",
            SnapshotField::Current => "/Dc/0/Current",
            SnapshotField::Power => "/Dc/0/Power",
            SnapshotField::EnergyIn => "/History/EnergyIn",
            SnapshotField::EnergyOut => "/History/EnergyOut",
            SnapshotField::LowVoltageAlarm => "/Alarms/LowVoltage",
            SnapshotField::HighVoltageAlarm => "/Alarms/HighVoltage",
            SnapshotField::LowTemperatureAlarm => "/Alarms/LowTemperature",
            SnapshotField::HighTemperatureAlarm => "/Alarms/HighTemperature",
        }
    }

    pub fn is_alarm(&self) -> bool {
        matches!(
            self,
            SnapshotField::LowVoltageAlarm
                | SnapshotField::HighVoltageAlarm
                | SnapshotField::LowTemperatureAlarm
                | SnapshotField::HighTemperatureAlarm
        )
    }
}

impl fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// The four alarm severities of a device or of the aggregate
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarms {
    pub low_voltage: AlarmLevel,
    pub high_voltage: AlarmLevel,
    pub low_temperature: AlarmLevel,
    pub high_temperature: AlarmLevel,
}

impl Alarms {
    /// Field-wise worst of `self` and `other`
    pub fn escalate(self, other: Alarms) -> Alarms {
        Alarms {
            low_voltage: self.low_voltage.max(other.low_voltage),
            high_voltage: self.high_voltage.max(other.high_voltage),
            low_temperature: self.low_temperature.max(other.low_temperature),
            high_temperature: self.high_temperature.max(other.high_temperature),
        }
    }

    pub fn worst(&self) -> AlarmLevel {
        self.low_voltage
            .max(self.high_voltage)
            .max(self.low_temperature)
            .max(self.high_temperature)
    }
}

/// Composite telemetry record for one cycle (staged or published)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy_in: f64,
    pub energy_out: f64,
    pub alarms: Alarms,
}

impl AggregateSnapshot {
    pub fn get(&self, field: SnapshotField) -> f64 {
        match field {
            SnapshotField::Voltage => self.voltage,
            SnapshotField::Current => self.current,
            SnapshotField::Power => self.power,
            SnapshotField::EnergyIn => self.energy_in,
            SnapshotField::EnergyOut => self.energy_out,
            SnapshotField::LowVoltageAlarm => self.alarms.low_voltage.as_value(),
            SnapshotField::HighVoltageAlarm => self.alarms.high_voltage.as_value(),
            SnapshotField::LowTemperatureAlarm => self.alarms.low_temperature.as_value(),
            SnapshotField::HighTemperatureAlarm => self.alarms.high_temperature.as_value(),
        }
    }

    /// Sets one field; alarm fields go through [`AlarmLevel::from_value`]
    pub fn set(&mut self, field: SnapshotField, value: f64) {
        match field {
            SnapshotField::Voltage => self.voltage = value,
            SnapshotField::Current => self.current = value,
            SnapshotField::Power => self.power = value,
            SnapshotField::EnergyIn => self.energy_in = value,
            SnapshotField::EnergyOut => self.energy_out = value,
            SnapshotField::LowVoltageAlarm => self.alarms.low_voltage = AlarmLevel::from_value(value),
            SnapshotField::HighVoltageAlarm => self.alarms.high_voltage = AlarmLevel::from_value(value),
            SnapshotField::LowTemperatureAlarm => {
                self.alarms.low_temperature = AlarmLevel::from_value(value)
            }
            SnapshotField::HighTemperatureAlarm => {
                self.alarms.high_temperature = AlarmLevel::from_value(value)
            }
        }
    }

    /// All nine fields in publication order
    pub fn fields(&self) -> impl Iterator<Item = (SnapshotField, f64)> + '_ {
        SnapshotField::ALL.into_iter().map(move |field| (field, self.get(field)))
    }
}
