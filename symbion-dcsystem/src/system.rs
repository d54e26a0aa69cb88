use crate::engine::{Aggregator, UpdateReport};
use crate::error::PublishError;
use crate::models::AggregateSnapshot;
use crate::publish::{PublishBuffer, Publisher};
use crate::registry::DeviceRegistry;

/// The composite DC system device: staging and published snapshots together.
///
/// Built once at startup and driven by the host's two timers, `update` on the
/// fast one and `flush` on the slow one. The host must not run both at the
/// same time; with a single task driving both that holds trivially.
#[derive(Debug, Default)]
pub struct DcSystem {
    aggregator: Aggregator,
    buffer: PublishBuffer,
}

impl DcSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announce<P: Publisher + ?Sized>(&self, publisher: &mut P) -> Result<(), PublishError> {
        self.buffer.announce(publisher)
    }

    pub fn update<R: DeviceRegistry + ?Sized>(&mut self, registry: &R) -> UpdateReport {
        self.aggregator.update(registry)
    }

    pub fn flush<P: Publisher + ?Sized>(&mut self, publisher: &mut P) -> Result<(), PublishError> {
        self.buffer.flush(self.aggregator.staged(), publisher)
    }

    pub fn staged(&self) -> &AggregateSnapshot {
        self.aggregator.staged()
    }

    pub fn staged_mut(&mut self) -> &mut AggregateSnapshot {
        self.aggregator.staged_mut()
    }

    pub fn published(&self) -> &AggregateSnapshot {
        self.buffer.published()
    }

    pub fn update_cycles(&self) -> u64 {
        self.aggregator.cycles()
    }

    pub fn flush_cycles(&self) -> u64 {
        self.buffer.flushes()
    }
}
