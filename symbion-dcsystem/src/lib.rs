//! Symbion DC System - aggregation core
//!
//! Combines an arbitrary, changing set of DC loads and DC sources into one
//! composite device exposing voltage, current, power, energy counters and
//! alarm states:
//! - `registry`: device discovery and attribute reads (consumed capability)
//! - `engine`: per-cycle reduction into the staging snapshot
//! - `publish`: staging to published snapshot handoff and bus writes
//! - `system`: `DcSystem`, the single owner of both snapshots

pub mod engine;
pub mod error;
pub mod format;
pub mod models;
pub mod publish;
pub mod registry;
pub mod system;

pub use engine::{reduce, Aggregator, DeviceReading, UpdateReport, VOLTAGE_DEADBAND};
pub use error::PublishError;
pub use format::{formatter_for, Formatter};
pub use models::{
    AggregateSnapshot, AlarmLevel, Alarms, DeviceAttribute, DeviceClass, DeviceHandle,
    SnapshotField,
};
pub use publish::{PublishBuffer, Publisher};
pub use registry::{discover_devices, DeviceRegistry};
pub use system::DcSystem;
