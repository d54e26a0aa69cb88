use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

pub const CONFIG_ENV: &str = "SYMBION_DCSYSTEM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "dcsystem.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub mqtt: MqttConf,
    pub bus: BusConf,
    pub device: DeviceConf,
    pub timing: TimingConf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub keep_alive_secs: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BusConf {
    pub topic_prefix: String, // ex: "symbion" -> symbion/dc/load/telemetry@v1
}

/// Identity of the composite device on the bus
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeviceConf {
    pub instance: u32,
    pub product_id: u32,
    pub product_name: String,
    pub firmware_version: u32,
    pub hardware_version: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TimingConf {
    pub update_interval_ms: u64,
    pub publish_interval_ms: u64,
    pub health_interval_secs: u64,
    pub stale_after_secs: u64,
    pub device_timeout_secs: u64,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "symbion-plugin-dcsystem".into(),
            keep_alive_secs: 30,
        }
    }
}

impl Default for BusConf {
    fn default() -> Self {
        Self { topic_prefix: "symbion".into() }
    }
}

impl Default for DeviceConf {
    fn default() -> Self {
        Self {
            instance: 1024,
            product_id: 0,
            product_name: "DC System Aggregator".into(),
            firmware_version: 0,
            hardware_version: 0,
        }
    }
}

impl Default for TimingConf {
    fn default() -> Self {
        Self {
            update_interval_ms: 200,
            publish_interval_ms: 1000,
            health_interval_secs: 30,
            stale_after_secs: 10,
            device_timeout_secs: 60,
        }
    }
}

impl TimingConf {
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }
}

impl ServiceConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, ConfigError> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: ServiceConfig = serde_yaml::from_str(txt)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        let non_zero = [
            ("timing.update_interval_ms", t.update_interval_ms),
            ("timing.publish_interval_ms", t.publish_interval_ms),
            ("timing.health_interval_secs", t.health_interval_secs),
            ("timing.stale_after_secs", t.stale_after_secs),
            ("timing.device_timeout_secs", t.device_timeout_secs),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Invalid { field, reason: "must be greater than zero".into() });
            }
        }
        if self.bus.topic_prefix.is_empty() || self.bus.topic_prefix.contains(['+', '#']) {
            return Err(ConfigError::Invalid {
                field: "bus.topic_prefix",
                reason: format!("'{}' is not a valid topic prefix", self.bus.topic_prefix),
            });
        }
        Ok(())
    }

    /// Applies SYMBION_MQTT_HOST / SYMBION_MQTT_PORT on top of the file values
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SYMBION_MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Ok(port) = std::env::var("SYMBION_MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(_) => warn!("ignoring invalid SYMBION_MQTT_PORT '{}'", port),
            }
        }
    }
}

/// Loads the plugin configuration; falls back to defaults when the file is
/// missing or invalid.
pub async fn load_config() -> ServiceConfig {
    let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut cfg = load_config_from(&path).await;
    cfg.apply_env_overrides();
    cfg
}

pub async fn load_config_from<P: AsRef<Path>>(path: P) -> ServiceConfig {
    let path = path.as_ref();
    if !path.exists() {
        warn!("no {}, using default configuration", path.display());
        return ServiceConfig::default();
    }

    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            error!("failed to read {}: {}", path.display(), e);
            return ServiceConfig::default();
        }
    };

    match ServiceConfig::from_yaml_str(&txt) {
        Ok(cfg) => {
            info!("loaded configuration from {}", path.display());
            cfg
        }
        Err(e) => {
            error!("invalid configuration in {}: {}", path.display(), e);
            ServiceConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.device.instance, 1024);
        assert_eq!(cfg.device.product_name, "DC System Aggregator");
        assert_eq!(cfg.timing.update_interval(), Duration::from_millis(200));
        assert_eq!(cfg.timing.publish_interval(), Duration::from_millis(1000));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = ServiceConfig::from_yaml_str(
            "mqtt:\n  host: broker.lan\ntiming:\n  publish_interval_ms: 2000\n",
        )
        .unwrap();
        assert_eq!(cfg.mqtt.host, "broker.lan");
        assert_eq!(cfg.mqtt.port, 1883);
        assert_eq!(cfg.timing.publish_interval_ms, 2000);
        assert_eq!(cfg.timing.update_interval_ms, 200);
        assert_eq!(cfg.bus.topic_prefix, "symbion");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(ServiceConfig::from_yaml_str("  \n").unwrap(), ServiceConfig::default());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = ServiceConfig::from_yaml_str("timing:\n  update_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "timing.update_interval_ms", .. }));
    }

    #[test]
    fn test_rejects_wildcard_prefix() {
        let err = ServiceConfig::from_yaml_str("bus:\n  topic_prefix: \"site/+\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "bus.topic_prefix", .. }));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dcsystem.yaml");
        std::fs::write(&path, "device:\n  instance: 7\n").unwrap();

        let cfg = load_config_from(&path).await;
        assert_eq!(cfg.device.instance, 7);
    }

    #[tokio::test]
    async fn test_invalid_or_missing_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let missing = load_config_from(dir.path().join("nope.yaml")).await;
        assert_eq!(missing, ServiceConfig::default());

        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "mqtt: [not, a, map]\n").unwrap();
        assert_eq!(load_config_from(&path).await, ServiceConfig::default());
    }
}
