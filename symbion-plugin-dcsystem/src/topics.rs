//! Topics MQTT du plugin dcsystem
//!
//! Entrée : {prefix}/dc/load/telemetry@v1, {prefix}/dc/source/telemetry@v1
//! Sortie : {prefix}/dcsystem/{instance}{path} (retained), {prefix}/dcsystem/health@v1

use symbion_dcsystem::DeviceClass;

pub const TELEMETRY_CONTRACT: &str = "telemetry@v1";
pub const HEALTH_CONTRACT: &str = "health@v1";

fn class_segment(class: DeviceClass) -> &'static str {
    match class {
        DeviceClass::Load => "load",
        DeviceClass::Source => "source",
    }
}

/// Ex: "symbion/dc/load/telemetry@v1"
pub fn telemetry_topic(prefix: &str, class: DeviceClass) -> String {
    format!("{}/dc/{}/{}", prefix, class_segment(class), TELEMETRY_CONTRACT)
}

/// Retrouve la classe d'appareil depuis un topic de télémétrie
pub fn parse_telemetry_topic(prefix: &str, topic: &str) -> Option<DeviceClass> {
    DeviceClass::ALL
        .into_iter()
        .find(|class| topic == telemetry_topic(prefix, *class))
}

/// Ex: "symbion/dcsystem/1024/Dc/0/Voltage"
pub fn output_topic(prefix: &str, instance: u32, path: &str) -> String {
    format!("{}/dcsystem/{}{}", prefix, instance, path)
}

pub fn health_topic(prefix: &str) -> String {
    format!("{}/dcsystem/{}", prefix, HEALTH_CONTRACT)
}
