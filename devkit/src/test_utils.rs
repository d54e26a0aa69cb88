/*!
Test Harness pour le dcsystem

Assemble un `DcSystem`, un `MockRegistry` et un `RecordingPublisher` et
pilote les deux cadences (update rapide, flush lent) à la main.
*/

use crate::bus_stub::{MockRegistry, RecordingPublisher};
use crate::fixtures::DeviceBuilder;
use anyhow::Result;
use symbion_dcsystem::{AggregateSnapshot, DcSystem, DeviceHandle, SnapshotField, UpdateReport};

/// Harness de test complet : bus en mémoire + DcSystem annoncé
pub struct TestHarness {
    pub registry: MockRegistry,
    pub publisher: RecordingPublisher,
    pub system: DcSystem,
}

impl TestHarness {
    /// Crée un harness avec les champs déjà annoncés
    pub fn new() -> Self {
        env_logger::builder().is_test(true).try_init().ok(); // Init logging pour tests

        let system = DcSystem::new();
        let mut publisher = RecordingPublisher::new();
        if let Err(e) = system.announce(&mut publisher) {
            log::warn!("announce failed in harness: {}", e);
        }

        Self {
            registry: MockRegistry::new(),
            publisher,
            system,
        }
    }

    /// Branche un appareil construit avec `DeviceBuilder`
    pub fn plug(&mut self, device: DeviceBuilder) -> DeviceHandle {
        device.install(&mut self.registry)
    }

    pub fn unplug(&mut self, handle: &DeviceHandle) -> bool {
        self.registry.remove(handle)
    }

    /// Un tick de la cadence rapide
    pub fn update(&mut self) -> UpdateReport {
        self.system.update(&self.registry)
    }

    /// Un tick de la cadence lente
    pub fn flush(&mut self) -> Result<()> {
        self.system.flush(&mut self.publisher)?;
        Ok(())
    }

    /// update puis flush
    pub fn cycle(&mut self) -> Result<AggregateSnapshot> {
        self.update();
        self.flush()?;
        Ok(*self.system.published())
    }

    pub fn staged(&self) -> &AggregateSnapshot {
        self.system.staged()
    }

    pub fn published(&self) -> &AggregateSnapshot {
        self.system.published()
    }

    /// Assert que la dernière valeur écrite sur le bus pour `field` vaut `expected`
    pub fn assert_published(&self, field: SnapshotField, expected: f64) -> Result<()> {
        match self.publisher.last_value(field) {
            Some(actual) if actual == expected => {
                log::info!("✅ {} = {}", field, expected);
                Ok(())
            }
            Some(actual) => anyhow::bail!("{} mismatch: expected {}, got {}", field, expected, actual),
            None => anyhow::bail!("nothing published for {}", field),
        }
    }

    /// Nombre de flushes ayant écrit les neuf champs
    pub fn complete_flushes(&self) -> usize {
        SnapshotField::ALL
            .iter()
            .map(|field| self.publisher.writes_for(*field).len())
            .min()
            .unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_basic_functionality() {
        let mut harness = TestHarness::new();
        assert_eq!(harness.publisher.announcements().len(), 9);

        harness.plug(DeviceBuilder::load("fridge").current(2.0).voltage(12.0));
        let report = harness.update();
        assert_eq!(report.loads, 1);

        harness.flush().unwrap();
        harness.assert_published(SnapshotField::Current, 2.0).unwrap();
        harness.assert_published(SnapshotField::Power, 24.0).unwrap();
        assert!(harness.assert_published(SnapshotField::Current, 3.0).is_err());
        assert_eq!(harness.complete_flushes(), 1);
    }
}
