/*!
Construction d'appareils DC de test

```ignore
DeviceBuilder::load("fridge").current(5.0).voltage(48.0).install(&mut registry);
```
*/

use crate::bus_stub::MockRegistry;
use std::collections::HashMap;
use symbion_dcsystem::{AlarmLevel, DeviceAttribute, DeviceHandle};

/// Builder d'appareil : seuls les attributs fixés sont rapportés au registre
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    handle: DeviceHandle,
    attributes: HashMap<DeviceAttribute, f64>,
}

impl DeviceBuilder {
    pub fn load<S: Into<String>>(name: S) -> Self {
        Self::new(DeviceHandle::load(name))
    }

    pub fn source<S: Into<String>>(name: S) -> Self {
        Self::new(DeviceHandle::source(name))
    }

    pub fn new(handle: DeviceHandle) -> Self {
        Self { handle, attributes: HashMap::new() }
    }

    pub fn attribute(mut self, attribute: DeviceAttribute, value: f64) -> Self {
        self.attributes.insert(attribute, value);
        self
    }

    pub fn current(self, amps: f64) -> Self {
        self.attribute(DeviceAttribute::Current, amps)
    }

    pub fn voltage(self, volts: f64) -> Self {
        self.attribute(DeviceAttribute::Voltage, volts)
    }

    pub fn power(self, watts: f64) -> Self {
        self.attribute(DeviceAttribute::Power, watts)
    }

    pub fn energy_in(self, kwh: f64) -> Self {
        self.attribute(DeviceAttribute::EnergyIn, kwh)
    }

    pub fn energy_out(self, kwh: f64) -> Self {
        self.attribute(DeviceAttribute::EnergyOut, kwh)
    }

    pub fn low_voltage(self, level: AlarmLevel) -> Self {
        self.attribute(DeviceAttribute::LowVoltageAlarm, level.as_value())
    }

    pub fn high_voltage(self, level: AlarmLevel) -> Self {
        self.attribute(DeviceAttribute::HighVoltageAlarm, level.as_value())
    }

    pub fn low_temperature(self, level: AlarmLevel) -> Self {
        self.attribute(DeviceAttribute::LowTemperatureAlarm, level.as_value())
    }

    pub fn high_temperature(self, level: AlarmLevel) -> Self {
        self.attribute(DeviceAttribute::HighTemperatureAlarm, level.as_value())
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    /// Branche l'appareil sur le registre et retourne son handle
    pub fn install(self, registry: &mut MockRegistry) -> DeviceHandle {
        let handle = self.handle.clone();
        registry.insert(self.handle, self.attributes);
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbion_dcsystem::{DeviceClass, DeviceRegistry};

    #[test]
    fn test_builder_installs_only_set_attributes() {
        let mut registry = MockRegistry::new();
        let handle = DeviceBuilder::source("mppt")
            .current(10.0)
            .voltage(48.0)
            .high_temperature(AlarmLevel::Warning)
            .install(&mut registry);

        assert_eq!(handle, DeviceHandle::source("mppt"));
        assert_eq!(registry.list_devices(DeviceClass::Source), vec!["mppt"]);
        assert_eq!(registry.read_attribute(&handle, DeviceAttribute::Current), Some(10.0));
        assert_eq!(registry.read_attribute(&handle, DeviceAttribute::HighTemperatureAlarm), Some(1.0));
        assert_eq!(registry.read_attribute(&handle, DeviceAttribute::Power), None);
    }
}
