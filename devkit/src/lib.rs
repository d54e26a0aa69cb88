/*!
# Symbion DevKit - Stubs et Utilitaires pour le dcsystem

Bibliothèque facilitant le test du moteur d'agrégation DC sans broker:
- Registre d'appareils en mémoire (DeviceRegistry)
- Publisher qui enregistre annonces et écritures
- Builders d'appareils dcload / dcsource
- Harness de test pilotant update / flush
*/

pub mod bus_stub;
pub mod fixtures;
pub mod test_utils;

pub use bus_stub::{MockRegistry, RecordingPublisher};
pub use fixtures::DeviceBuilder;
pub use test_utils::TestHarness;
