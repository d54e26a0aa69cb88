//! Publish buffer
//!
//! Keeps the externally observable snapshot apart from the staging area.
//! A flush copies the whole staged snapshot and writes every field to the
//! publisher, changed or not; nothing else ever reaches the bus.

use crate::error::PublishError;
use crate::format::{formatter_for, Formatter};
use crate::models::{AggregateSnapshot, SnapshotField};
use tracing::{debug, warn};

/// Write side of the device bus for the composite device
pub trait Publisher {
    /// Registers a published field once at startup
    fn announce(
        &mut self,
        field: SnapshotField,
        initial: f64,
        formatter: Option<Formatter>,
    ) -> Result<(), PublishError>;

    /// Sets the current value of a field
    fn write(&mut self, field: SnapshotField, value: f64) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for &mut P {
    fn announce(
        &mut self,
        field: SnapshotField,
        initial: f64,
        formatter: Option<Formatter>,
    ) -> Result<(), PublishError> {
        (**self).announce(field, initial, formatter)
    }

    fn write(&mut self, field: SnapshotField, value: f64) -> Result<(), PublishError> {
        (**self).write(field, value)
    }
}

impl<P: Publisher + ?Sized> Publisher for Box<P> {
    fn announce(
        &mut self,
        field: SnapshotField,
        initial: f64,
        formatter: Option<Formatter>,
    ) -> Result<(), PublishError> {
        (**self).announce(field, initial, formatter)
    }

    fn write(&mut self, field: SnapshotField, value: f64) -> Result<(), PublishError> {
        (**self).write(field, value)
    }
}

/// Owner of the published snapshot
#[derive(Debug, Default)]
pub struct PublishBuffer {
    published: AggregateSnapshot,
    flushes: u64,
}

impl PublishBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announces all nine fields with their current published value and
    /// display formatter
    pub fn announce<P: Publisher + ?Sized>(&self, publisher: &mut P) -> Result<(), PublishError> {
        for (field, value) in self.published.fields() {
            publisher.announce(field, value, formatter_for(field))?;
        }
        debug!("announced {} fields", SnapshotField::ALL.len());
        Ok(())
    }

    /// Replaces the published snapshot with `staged` and writes every field.
    ///
    /// A failed write does not stop the remaining ones; the first error is
    /// returned once all fields were attempted.
    pub fn flush<P: Publisher + ?Sized>(
        &mut self,
        staged: &AggregateSnapshot,
        publisher: &mut P,
    ) -> Result<(), PublishError> {
        self.published = *staged;
        self.flushes += 1;

        let mut first_error = None;
        for (field, value) in self.published.fields() {
            if let Err(e) = publisher.write(field, value) {
                warn!(%field, error = %e, "failed to publish field");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn published(&self) -> &AggregateSnapshot {
        &self.published
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }
}
