//! Device discovery and attribute reads.
//!
//! `DeviceRegistry` is the capability the aggregator consumes from the device
//! bus: list the devices of a class, read the last known value of one of their
//! attributes. Substituting defaults for missing values is the engine's job,
//! not the registry's.

use crate::models::{DeviceAttribute, DeviceClass, DeviceHandle};
use std::sync::Arc;

/// Read side of the device bus
pub trait DeviceRegistry {
    /// Names of all devices of `class` currently known. May be empty.
    fn list_devices(&self, class: DeviceClass) -> Vec<String>;

    /// Last known value of `attribute` on `device`, `None` if unknown or stale
    fn read_attribute(&self, device: &DeviceHandle, attribute: DeviceAttribute) -> Option<f64>;
}

impl<R: DeviceRegistry + ?Sized> DeviceRegistry for &R {
    fn list_devices(&self, class: DeviceClass) -> Vec<String> {
        (**self).list_devices(class)
    }

    fn read_attribute(&self, device: &DeviceHandle, attribute: DeviceAttribute) -> Option<f64> {
        (**self).read_attribute(device, attribute)
    }
}

impl<R: DeviceRegistry + ?Sized> DeviceRegistry for Arc<R> {
    fn list_devices(&self, class: DeviceClass) -> Vec<String> {
        (**self).list_devices(class)
    }

    fn read_attribute(&self, device: &DeviceHandle, attribute: DeviceAttribute) -> Option<f64> {
        (**self).read_attribute(device, attribute)
    }
}

/// Lists every device known to the registry, loads first then sources.
///
/// Runs on every cycle; devices may come and go between two calls.
pub fn discover_devices<R: DeviceRegistry + ?Sized>(registry: &R) -> Vec<DeviceHandle> {
    DeviceClass::ALL
        .iter()
        .flat_map(|class| {
            registry
                .list_devices(*class)
                .into_iter()
                .map(move |name| DeviceHandle::new(*class, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticRegistry {
        devices: HashMap<DeviceClass, Vec<String>>,
    }

    impl DeviceRegistry for StaticRegistry {
        fn list_devices(&self, class: DeviceClass) -> Vec<String> {
            self.devices.get(&class).cloned().unwrap_or_default()
        }

        fn read_attribute(&self, _device: &DeviceHandle, _attribute: DeviceAttribute) -> Option<f64> {
            None
        }
    }

    #[test]
    fn test_discovery_order() {
        let mut devices = HashMap::new();
        devices.insert(DeviceClass::Source, vec!["solar".to_string()]);
        devices.insert(DeviceClass::Load, vec!["fridge".to_string(), "lights".to_string()]);
        let registry = StaticRegistry { devices };

        let handles = discover_devices(&registry);
        assert_eq!(
            handles,
            vec![
                DeviceHandle::load("fridge"),
                DeviceHandle::load("lights"),
                DeviceHandle::source("solar"),
            ]
        );
    }

    #[test]
    fn test_discovery_empty() {
        let registry = StaticRegistry { devices: HashMap::new() };
        assert!(discover_devices(&registry).is_empty());

        let shared = Arc::new(registry);
        assert!(discover_devices(&shared).is_empty());
    }
}
