//! Human readable text attached to published fields at announce time.

use crate::models::SnapshotField;

/// Renders a published value for display
pub type Formatter = fn(f64) -> String;

pub fn format_voltage(value: f64) -> String {
    format!("{:.2}V", value)
}

pub fn format_current(value: f64) -> String {
    format!("{:.3}A", value)
}

pub fn format_power(value: f64) -> String {
    format!("{:.2}W", value)
}

pub fn format_energy(value: f64) -> String {
    format!("{:.6}kWh", value)
}

/// Display formatter for a field; alarms are shown as plain numbers
pub fn formatter_for(field: SnapshotField) -> Option<Formatter> {
    match field {
        SnapshotField::Voltage => Some(format_voltage),
        SnapshotField::Current => Some(format_current),
        SnapshotField::Power => Some(format_power),
        SnapshotField::EnergyIn | SnapshotField::EnergyOut => Some(format_energy),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formats() {
        assert_eq!(format_voltage(48.0), "48.00V");
        assert_eq!(format_current(-5.0), "-5.000A");
        assert_eq!(format_power(239.996), "240.00W");
        assert_eq!(format_energy(1.5), "1.500000kWh");
    }

    #[test]
    fn test_formatter_for_fields() {
        let voltage = formatter_for(SnapshotField::Voltage).unwrap();
        assert_eq!(voltage(12.346), "12.35V");
        let energy = formatter_for(SnapshotField::EnergyOut).unwrap();
        assert_eq!(energy(0.0), "0.000000kWh");
        assert!(formatter_for(SnapshotField::LowVoltageAlarm).is_none());
    }
}
