/**
 * DEVICE CACHE - Dernières valeurs connues des appareils DC du bus
 *
 * RÔLE : Alimenté par le listener MQTT (télémétrie des dcload / dcsource),
 * lu par le moteur d'agrégation à chaque cycle via DeviceRegistry.
 *
 * RÈGLES :
 * - un message partiel ne met à jour que les champs présents, `null` invalide le champ
 * - `connected: false` retire l'appareil immédiatement
 * - une valeur plus vieille que stale_after est considérée absente
 * - un appareil muet depuis device_timeout disparaît de la liste
 */

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::sync::Arc;
use symbion_dcsystem::{DeviceAttribute, DeviceClass, DeviceHandle, DeviceRegistry};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

pub type Shared<T> = Arc<Mutex<T>>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid telemetry JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("telemetry without device_id")]
    MissingDevice,
}

/// Contrat telemetry@v1 (tous les champs sauf device_id sont optionnels)
#[derive(Debug, Deserialize, Default)]
pub struct TelemetryIn {
    pub device_id: String,
    #[serde(default)]
    pub connected: Option<bool>,
    #[serde(default, deserialize_with = "present")]
    pub current: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub voltage: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub power: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub energy_in: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub energy_out: Option<Option<f64>>,
    #[serde(default)]
    pub alarms: Option<AlarmsIn>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AlarmsIn {
    #[serde(default, deserialize_with = "present")]
    pub low_voltage: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub high_voltage: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub low_temperature: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub high_temperature: Option<Option<f64>>,
}

// absent -> None (via default), null -> Some(None), number -> Some(Some(n))
fn present<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

impl TelemetryIn {
    pub fn parse(payload: &[u8]) -> Result<Self, TelemetryError> {
        let msg: TelemetryIn = serde_json::from_slice(payload)?;
        if msg.device_id.trim().is_empty() {
            return Err(TelemetryError::MissingDevice);
        }
        Ok(msg)
    }

    /// Champs présents dans le message; `None` = invalidation
    pub fn updates(&self) -> Vec<(DeviceAttribute, Option<f64>)> {
        let alarms = self.alarms.as_ref();
        [
            (DeviceAttribute::Current, self.current),
            (DeviceAttribute::Voltage, self.voltage),
            (DeviceAttribute::Power, self.power),
            (DeviceAttribute::EnergyIn, self.energy_in),
            (DeviceAttribute::EnergyOut, self.energy_out),
            (DeviceAttribute::LowVoltageAlarm, alarms.and_then(|a| a.low_voltage)),
            (DeviceAttribute::HighVoltageAlarm, alarms.and_then(|a| a.high_voltage)),
            (DeviceAttribute::LowTemperatureAlarm, alarms.and_then(|a| a.low_temperature)),
            (DeviceAttribute::HighTemperatureAlarm, alarms.and_then(|a| a.high_temperature)),
        ]
        .into_iter()
        .filter_map(|(attribute, update)| update.map(|value| (attribute, value)))
        .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct AttributeValue {
    value: f64,
    received_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    last_seen: OffsetDateTime,
    values: HashMap<DeviceAttribute, AttributeValue>,
}

/// Outcome of ingesting one telemetry message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ingested {
    Updated(DeviceHandle),
    Removed(DeviceHandle),
}

#[derive(Clone)]
pub struct DeviceCache {
    devices: Shared<HashMap<DeviceHandle, DeviceEntry>>,
    stale_after: Duration,
    device_timeout: Duration,
}

impl DeviceCache {
    pub fn new(stale_after_secs: u64, device_timeout_secs: u64) -> Self {
        let secs = |s: u64| Duration::seconds(i64::try_from(s).unwrap_or(i64::MAX));
        Self {
            devices: Arc::new(Mutex::new(HashMap::new())),
            stale_after: secs(stale_after_secs),
            device_timeout: secs(device_timeout_secs),
        }
    }

    /// Parse et intègre un message reçu sur le topic télémétrie de `class`
    pub fn ingest(&self, class: DeviceClass, payload: &[u8]) -> Result<Ingested, TelemetryError> {
        let msg = TelemetryIn::parse(payload)?;
        Ok(self.ingest_at(class, msg, OffsetDateTime::now_utc()))
    }

    pub fn ingest_at(&self, class: DeviceClass, msg: TelemetryIn, now: OffsetDateTime) -> Ingested {
        let handle = DeviceHandle::new(class, msg.device_id.trim());
        let mut devices = self.devices.lock();

        if msg.connected == Some(false) {
            if devices.remove(&handle).is_some() {
                info!("device {} disconnected", handle);
            }
            return Ingested::Removed(handle);
        }

        let entry = devices.entry(handle.clone()).or_insert_with(|| {
            info!("new device {}", handle);
            DeviceEntry { last_seen: now, values: HashMap::new() }
        });
        entry.last_seen = now;
        for (attribute, value) in msg.updates() {
            match value {
                Some(value) => {
                    entry.values.insert(attribute, AttributeValue { value, received_at: now });
                }
                None => {
                    entry.values.remove(&attribute);
                }
            }
        }
        Ingested::Updated(handle)
    }

    /// Appareils vivants de `class`, triés par nom; purge ceux en timeout
    pub fn list_at(&self, class: DeviceClass, now: OffsetDateTime) -> Vec<String> {
        let mut devices = self.devices.lock();
        let timeout = self.device_timeout;
        devices.retain(|handle, entry| {
            let alive = now - entry.last_seen <= timeout;
            if !alive {
                info!("device {} timed out (last seen: {})", handle, entry.last_seen);
            }
            alive
        });

        let mut names: Vec<String> = devices
            .keys()
            .filter(|handle| handle.class == class)
            .map(|handle| handle.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn read_at(
        &self,
        device: &DeviceHandle,
        attribute: DeviceAttribute,
        now: OffsetDateTime,
    ) -> Option<f64> {
        let devices = self.devices.lock();
        let stored = devices.get(device)?.values.get(&attribute)?;
        if now - stored.received_at > self.stale_after {
            debug!("stale {} on {}", attribute.path(), device);
            return None;
        }
        Some(stored.value)
    }

    /// (loads, sources) actuellement en cache
    pub fn counts(&self) -> (usize, usize) {
        let devices = self.devices.lock();
        let loads = devices.keys().filter(|h| h.class == DeviceClass::Load).count();
        (loads, devices.len() - loads)
    }
}

impl DeviceRegistry for DeviceCache {
    fn list_devices(&self, class: DeviceClass) -> Vec<String> {
        self.list_at(class, OffsetDateTime::now_utc())
    }

    fn read_attribute(&self, device: &DeviceHandle, attribute: DeviceAttribute) -> Option<f64> {
        self.read_at(device, attribute, OffsetDateTime::now_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2025-06-01 12:00 UTC);

    fn msg(json: serde_json::Value) -> TelemetryIn {
        TelemetryIn::parse(&serde_json::to_vec(&json).unwrap()).unwrap()
    }

    #[test]
    fn test_parse_rejects_missing_device() {
        assert!(matches!(
            TelemetryIn::parse(br#"{"device_id": "  ", "current": 1.0}"#),
            Err(TelemetryError::MissingDevice)
        ));
        assert!(matches!(TelemetryIn::parse(b"not json"), Err(TelemetryError::Payload(_))));
        assert!(matches!(
            TelemetryIn::parse(br#"{"device_id": "x", "current": "high"}"#),
            Err(TelemetryError::Payload(_))
        ));
    }

    #[test]
    fn test_updates_distinguish_null_and_absent() {
        let m = msg(serde_json::json!({
            "device_id": "fridge",
            "current": 2.5,
            "voltage": null,
            "alarms": {"low_voltage": 1}
        }));
        let updates = m.updates();
        assert_eq!(updates.len(), 3);
        assert!(updates.contains(&(DeviceAttribute::Current, Some(2.5))));
        assert!(updates.contains(&(DeviceAttribute::Voltage, None)));
        assert!(updates.contains(&(DeviceAttribute::LowVoltageAlarm, Some(1.0))));
    }

    #[test]
    fn test_partial_messages_merge() {
        let cache = DeviceCache::new(10, 60);
        let fridge = DeviceHandle::load("fridge");
        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "fridge", "current": 2.0, "voltage": 12.5})), T0);
        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "fridge", "current": 3.0})), T0 + Duration::seconds(1));

        let now = T0 + Duration::seconds(2);
        assert_eq!(cache.read_at(&fridge, DeviceAttribute::Current, now), Some(3.0));
        assert_eq!(cache.read_at(&fridge, DeviceAttribute::Voltage, now), Some(12.5));
        assert_eq!(cache.read_at(&fridge, DeviceAttribute::Power, now), None);

        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "fridge", "voltage": null})), now);
        assert_eq!(cache.read_at(&fridge, DeviceAttribute::Voltage, now), None);
    }

    #[test]
    fn test_stale_values_read_as_absent() {
        let cache = DeviceCache::new(10, 60);
        let solar = DeviceHandle::source("solar");
        cache.ingest_at(DeviceClass::Source, msg(serde_json::json!({"device_id": "solar", "current": 8.0})), T0);

        assert_eq!(cache.read_at(&solar, DeviceAttribute::Current, T0 + Duration::seconds(10)), Some(8.0));
        assert_eq!(cache.read_at(&solar, DeviceAttribute::Current, T0 + Duration::seconds(11)), None);
        // still listed: staleness is per attribute
        assert_eq!(cache.list_at(DeviceClass::Source, T0 + Duration::seconds(11)), vec!["solar"]);
    }

    #[test]
    fn test_devices_time_out() {
        let cache = DeviceCache::new(10, 60);
        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "old"})), T0);
        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "new"})), T0 + Duration::seconds(30));

        let later = T0 + Duration::seconds(61);
        assert_eq!(cache.list_at(DeviceClass::Load, later), vec!["new"]);
        assert_eq!(cache.counts(), (1, 0));
    }

    #[test]
    fn test_disconnect_removes_device() {
        let cache = DeviceCache::new(10, 60);
        cache.ingest_at(DeviceClass::Source, msg(serde_json::json!({"device_id": "alt", "current": 20.0})), T0);
        let outcome = cache.ingest_at(
            DeviceClass::Source,
            msg(serde_json::json!({"device_id": "alt", "connected": false})),
            T0,
        );
        assert_eq!(outcome, Ingested::Removed(DeviceHandle::source("alt")));
        assert!(cache.list_at(DeviceClass::Source, T0).is_empty());
    }

    #[test]
    fn test_same_id_in_both_classes() {
        let cache = DeviceCache::new(10, 60);
        cache.ingest_at(DeviceClass::Load, msg(serde_json::json!({"device_id": "shunt", "current": 1.0})), T0);
        cache.ingest_at(DeviceClass::Source, msg(serde_json::json!({"device_id": "shunt", "current": 4.0})), T0);

        assert_eq!(cache.read_at(&DeviceHandle::load("shunt"), DeviceAttribute::Current, T0), Some(1.0));
        assert_eq!(cache.read_at(&DeviceHandle::source("shunt"), DeviceAttribute::Current, T0), Some(4.0));
        assert_eq!(cache.counts(), (1, 1));
    }

    #[test]
    fn test_ingest_raw_payload() {
        let cache = DeviceCache::new(10, 60);
        let outcome = cache
            .ingest(DeviceClass::Load, br#"{"device_id": "pump", "current": 1.5, "voltage": 24.0}"#)
            .unwrap();
        assert_eq!(outcome, Ingested::Updated(DeviceHandle::load("pump")));
        assert_eq!(cache.list_devices(DeviceClass::Load), vec!["pump"]);
        assert_eq!(cache.read_attribute(&DeviceHandle::load("pump"), DeviceAttribute::Voltage), Some(24.0));
    }
}
