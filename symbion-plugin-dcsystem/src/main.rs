/**
 * SYMBION PLUGIN DCSYSTEM - Appareil DC composite agrégé
 *
 * RÔLE :
 * Plugin autonome qui combine tous les appareils DC du bus (dcload qui consomment,
 * dcsource qui fournissent) en un seul appareil "DC System" : tension, courant,
 * puissance, compteurs d'énergie et alarmes.
 *
 * FONCTIONNEMENT :
 * - Listener MQTT : télémétrie des appareils -> DeviceCache (dernières valeurs connues)
 * - Timer rapide (200ms) : DcSystem::update, recalcul complet dans la zone de staging
 * - Timer lent (1s) : DcSystem::flush, copie staging -> publié + écriture MQTT
 * - Timer health (30s) : symbion/dcsystem/health@v1
 *
 * COMMUNICATION MQTT :
 * Écoute: symbion/dc/load/telemetry@v1, symbion/dc/source/telemetry@v1
 * Publie: symbion/dcsystem/{instance}/... (retained), symbion/dcsystem/health@v1
 */

mod config;
mod devices;
mod health;
mod mqtt;
mod topics;

use crate::config::ServiceConfig;
use crate::devices::DeviceCache;
use crate::health::HealthTracker;
use crate::mqtt::MqttPublisher;
use crate::topics::health_topic;

use anyhow::{Context, Result};
use rumqttc::{AsyncClient, QoS};
use symbion_dcsystem::DcSystem;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "symbion_plugin_dcsystem=info,symbion_dcsystem=info";

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("symbion plugin dcsystem starting...");

    let cfg = config::load_config().await;
    cfg.validate().context("invalid configuration")?;

    run(cfg).await.context("dcsystem plugin failed")
}

async fn run(cfg: ServiceConfig) -> Result<()> {
    let prefix = cfg.bus.topic_prefix.clone();
    let cache = DeviceCache::new(cfg.timing.stale_after_secs, cfg.timing.device_timeout_secs);
    let health = HealthTracker::new();

    let (client, eventloop) = mqtt::create_mqtt_client(&cfg);
    let listener = mqtt::spawn_mqtt_listener(
        client.clone(),
        eventloop,
        prefix.clone(),
        cache.clone(),
        health.clone(),
    );

    // Les requêtes restent en file jusqu'à la connexion au broker
    let mut publisher = MqttPublisher::new(client.clone(), &prefix, cfg.device.instance);
    let connection = format!("MQTT {}:{}", cfg.mqtt.host, cfg.mqtt.port);
    publisher
        .announce_identity(&cfg.device, &connection)
        .context("failed to register dcsystem identity")?;

    let mut system = DcSystem::new();
    system
        .announce(&mut publisher)
        .context("failed to announce dcsystem fields")?;

    let mut update_timer = interval(cfg.timing.update_interval());
    let mut flush_timer = interval(cfg.timing.publish_interval());
    let mut health_timer = interval(cfg.timing.health_interval());
    for timer in [&mut update_timer, &mut flush_timer, &mut health_timer] {
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "registered DC System Aggregator (update every {}ms, publish every {}ms)",
        cfg.timing.update_interval_ms, cfg.timing.publish_interval_ms
    );

    // Une seule task possède le DcSystem : update et flush ne se chevauchent jamais
    loop {
        tokio::select! {
            _ = update_timer.tick() => {
                let report = system.update(&cache);
                debug!("update: {} loads, {} sources", report.loads, report.sources);
            }
            _ = flush_timer.tick() => {
                if let Err(e) = system.flush(&mut publisher) {
                    warn!("flush incomplete: {}", e);
                }
            }
            _ = health_timer.tick() => {
                publish_health(&client, &prefix, &health, &cache, &system);
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("failed to listen for shutdown signal: {}", e);
                }
                info!("shutting down");
                break;
            }
        }
    }

    if let Err(e) = publisher.announce_disconnected() {
        warn!("failed to announce disconnection: {}", e);
    }
    if let Err(e) = client.disconnect().await {
        warn!("MQTT disconnect failed: {:?}", e);
    }
    listener.abort();
    Ok(())
}

fn publish_health(
    client: &AsyncClient,
    prefix: &str,
    health: &HealthTracker,
    cache: &DeviceCache,
    system: &DcSystem,
) {
    let snapshot = health.snapshot(cache.counts(), system.update_cycles(), system.flush_cycles());
    match serde_json::to_string(&snapshot) {
        Ok(payload) => {
            if let Err(e) = client.try_publish(health_topic(prefix), QoS::AtLeastOnce, false, payload) {
                warn!("[health] failed to publish: {:?}", e);
            } else {
                debug!(
                    "[health] published (uptime: {}s, loads: {}, sources: {})",
                    snapshot.uptime_seconds, snapshot.loads_tracked, snapshot.sources_tracked
                );
            }
        }
        Err(e) => warn!("[health] failed to serialize: {}", e),
    }
}
