use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::Mutex;

/// Contrat symbion/dcsystem/health@v1
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PluginHealth {
    pub uptime_seconds: u64,
    pub loads_tracked: u32,
    pub sources_tracked: u32,
    pub update_cycles: u64,
    pub flush_cycles: u64,
    pub mqtt_status: String,
    pub mqtt_reconnects: u32,
}

/// Counters shared between the MQTT listener and the scheduling loop
#[derive(Clone)]
pub struct HealthTracker {
    start_time: Instant,
    mqtt_reconnects: Arc<AtomicU32>,
    mqtt_status: Arc<Mutex<String>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            mqtt_reconnects: Arc::new(AtomicU32::new(0)),
            mqtt_status: Arc::new(Mutex::new("connecting".to_string())),
        }
    }

    pub fn mark_mqtt_connected(&self) {
        *self.mqtt_status.lock() = "connected".to_string();
    }

    pub fn increment_reconnects(&self) {
        self.mqtt_reconnects.fetch_add(1, Ordering::Relaxed);
        *self.mqtt_status.lock() = "reconnecting".to_string();
    }

    pub fn snapshot(&self, devices: (usize, usize), update_cycles: u64, flush_cycles: u64) -> PluginHealth {
        let (loads, sources) = devices;
        PluginHealth {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            loads_tracked: loads as u32,
            sources_tracked: sources as u32,
            update_cycles,
            flush_cycles,
            mqtt_status: self.mqtt_status.lock().clone(),
            mqtt_reconnects: self.mqtt_reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}
