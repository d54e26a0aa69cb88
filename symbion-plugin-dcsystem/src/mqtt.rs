use crate::config::{DeviceConf, ServiceConfig};
use crate::devices::{DeviceCache, Ingested};
use crate::health::HealthTracker;
use crate::topics::{output_topic, parse_telemetry_topic, telemetry_topic};
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, Incoming, LastWill, MqttOptions, QoS};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use symbion_dcsystem::{DeviceClass, Formatter, PublishError, Publisher, SnapshotField};
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub fn create_mqtt_client(cfg: &ServiceConfig) -> (AsyncClient, EventLoop) {
    let mut opts = MqttOptions::new(&cfg.mqtt.client_id, &cfg.mqtt.host, cfg.mqtt.port);
    opts.set_keep_alive(Duration::from_secs(cfg.mqtt.keep_alive_secs));
    opts.set_clean_session(true);

    // le broker annonce la déconnexion du dcsystem à notre place
    let connected_topic = output_topic(&cfg.bus.topic_prefix, cfg.device.instance, "/Connected");
    let payload = json!({ "value": 0 }).to_string();
    opts.set_last_will(LastWill::new(connected_topic, payload, QoS::AtLeastOnce, true));

    AsyncClient::new(opts, 64)
}

/// Écoute la télémétrie des dcload / dcsource et alimente le cache
pub fn spawn_mqtt_listener(
    client: AsyncClient,
    mut eventloop: EventLoop,
    prefix: String,
    cache: DeviceCache,
    health: HealthTracker,
) -> JoinHandle<()> {
    task::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    health.mark_mqtt_connected();
                    info!("connected to MQTT broker");
                    // clean session: les abonnements sont à refaire à chaque connexion
                    for class in DeviceClass::ALL {
                        let topic = telemetry_topic(&prefix, class);
                        match client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                            Ok(()) => info!("subscribed to {}", topic),
                            Err(e) => error!("subscribe {} failed: {:?}", topic, e),
                        }
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    handle_publish(&prefix, &cache, &p.topic, &p.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT error: {:?}", e);
                    health.increment_reconnects();
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    })
}

/// Route un message entrant vers le cache; `None` si ignoré ou invalide
pub fn handle_publish(prefix: &str, cache: &DeviceCache, topic: &str, payload: &[u8]) -> Option<Ingested> {
    let class = match parse_telemetry_topic(prefix, topic) {
        Some(class) => class,
        None => {
            debug!("ignoring message on {}", topic);
            return None;
        }
    };

    match cache.ingest(class, payload) {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            warn!("telemetry rejected on {}: {}", topic, e);
            None
        }
    }
}

/// Minimal write capability the publisher needs from the MQTT client
pub trait BusClient {
    fn publish_retained(&self, topic: String, payload: Vec<u8>) -> Result<(), ClientError>;
}

impl BusClient for AsyncClient {
    fn publish_retained(&self, topic: String, payload: Vec<u8>) -> Result<(), ClientError> {
        self.try_publish(topic, QoS::AtLeastOnce, true, payload)
    }
}

/// Arrondi appliqué avant publication (nombre de décimales par champ)
fn decimals(field: SnapshotField) -> i32 {
    match field {
        SnapshotField::Voltage | SnapshotField::Current | SnapshotField::Power => 3,
        SnapshotField::EnergyIn | SnapshotField::EnergyOut => 6,
        _ => 0,
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Payload JSON d'un champ : {"value": n, "text": "48.00V"}
pub fn encode_field(field: SnapshotField, value: f64, formatter: Option<Formatter>) -> Value {
    let rounded = if field.is_alarm() {
        Value::from(value.round() as i64)
    } else {
        serde_json::Number::from_f64(round_to(value, decimals(field)))
            .map(Value::Number)
            .unwrap_or(Value::Null)
    };
    match formatter {
        Some(format) => json!({ "value": rounded, "text": format(value) }),
        None => json!({ "value": rounded }),
    }
}

/// Publisher du dcsystem sur MQTT : un topic retained par champ
pub struct MqttPublisher<C: BusClient = AsyncClient> {
    client: C,
    prefix: String,
    instance: u32,
    formatters: HashMap<SnapshotField, Formatter>,
}

impl<C: BusClient> MqttPublisher<C> {
    pub fn new(client: C, prefix: &str, instance: u32) -> Self {
        Self {
            client,
            prefix: prefix.to_string(),
            instance,
            formatters: HashMap::new(),
        }
    }

    fn send(&self, path: &str, payload: Value) -> Result<(), PublishError> {
        let topic = output_topic(&self.prefix, self.instance, path);
        let bytes = serde_json::to_vec(&payload).map_err(|e| PublishError::Encode {
            field: path.to_string(),
            reason: e.to_string(),
        })?;
        self.client
            .publish_retained(topic, bytes)
            .map_err(|e| PublishError::Rejected {
                field: path.to_string(),
                reason: e.to_string(),
            })
    }

    /// Chemins d'identité publiés une fois au démarrage
    pub fn announce_identity(&mut self, device: &DeviceConf, connection: &str) -> Result<(), PublishError> {
        let identity: [(&str, Value); 9] = [
            ("/Mgmt/ProcessName", json!(env!("CARGO_PKG_NAME"))),
            ("/Mgmt/ProcessVersion", json!(env!("CARGO_PKG_VERSION"))),
            ("/Mgmt/Connection", json!(connection)),
            ("/DeviceInstance", json!(device.instance)),
            ("/ProductId", json!(device.product_id)),
            ("/ProductName", json!(device.product_name)),
            ("/FirmwareVersion", json!(device.firmware_version)),
            ("/HardwareVersion", json!(device.hardware_version)),
            ("/Connected", json!(1)),
        ];
        for (path, value) in identity {
            self.send(path, json!({ "value": value }))?;
        }
        info!("registered dcsystem instance {} ({})", device.instance, device.product_name);
        Ok(())
    }

    /// Arrêt propre : même effet que le last will
    pub fn announce_disconnected(&self) -> Result<(), PublishError> {
        self.send("/Connected", json!({ "value": 0 }))
    }
}

impl<C: BusClient> Publisher for MqttPublisher<C> {
    fn announce(
        &mut self,
        field: SnapshotField,
        initial: f64,
        formatter: Option<Formatter>,
    ) -> Result<(), PublishError> {
        match formatter {
            Some(format) => {
                self.formatters.insert(field, format);
            }
            None => {
                self.formatters.remove(&field);
            }
        }
        self.send(field.path(), encode_field(field, initial, formatter))
    }

    fn write(&mut self, field: SnapshotField, value: f64) -> Result<(), PublishError> {
        let formatter = self.formatters.get(&field).copied();
        self.send(field.path(), encode_field(field, value, formatter))
    }
}
