/*!
Bus en mémoire pour développement sans broker

`MockRegistry` joue le rôle du bus côté lecture (appareils + attributs),
`RecordingPublisher` celui du bus côté écriture : il enregistre toutes les
annonces et écritures pour les assertions de tests.
*/

use std::collections::HashMap;
use symbion_dcsystem::{
    DeviceAttribute, DeviceClass, DeviceHandle, DeviceRegistry, Formatter, PublishError,
    Publisher, SnapshotField,
};

/// Registre d'appareils en mémoire; liste dans l'ordre d'insertion
#[derive(Debug, Clone, Default)]
pub struct MockRegistry {
    devices: Vec<(DeviceHandle, HashMap<DeviceAttribute, f64>)>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute (ou remplace) un appareil avec ses attributs
    pub fn insert(&mut self, handle: DeviceHandle, attributes: HashMap<DeviceAttribute, f64>) {
        match self.devices.iter_mut().find(|(h, _)| *h == handle) {
            Some((_, attrs)) => *attrs = attributes,
            None => {
                log::debug!("🔌 [MOCK] device {} plugged", handle);
                self.devices.push((handle, attributes));
            }
        }
    }

    /// Met à jour un attribut; crée l'appareil s'il n'existe pas
    pub fn set(&mut self, handle: &DeviceHandle, attribute: DeviceAttribute, value: f64) {
        if let Some((_, attrs)) = self.devices.iter_mut().find(|(h, _)| h == handle) {
            attrs.insert(attribute, value);
            return;
        }
        let mut attrs = HashMap::new();
        attrs.insert(attribute, value);
        self.insert(handle.clone(), attrs);
    }

    /// Retire un attribut (l'appareil ne le rapporte plus)
    pub fn clear_attribute(&mut self, handle: &DeviceHandle, attribute: DeviceAttribute) {
        if let Some((_, attrs)) = self.devices.iter_mut().find(|(h, _)| h == handle) {
            attrs.remove(&attribute);
        }
    }

    /// Simule le débranchement d'un appareil
    pub fn remove(&mut self, handle: &DeviceHandle) -> bool {
        let before = self.devices.len();
        self.devices.retain(|(h, _)| h != handle);
        let removed = self.devices.len() < before;
        if removed {
            log::debug!("🔌 [MOCK] device {} unplugged", handle);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceRegistry for MockRegistry {
    fn list_devices(&self, class: DeviceClass) -> Vec<String> {
        self.devices
            .iter()
            .filter(|(h, _)| h.class == class)
            .map(|(h, _)| h.name.clone())
            .collect()
    }

    fn read_attribute(&self, device: &DeviceHandle, attribute: DeviceAttribute) -> Option<f64> {
        self.devices
            .iter()
            .find(|(h, _)| h == device)
            .and_then(|(_, attrs)| attrs.get(&attribute).copied())
    }
}

/// Annonce enregistrée par le `RecordingPublisher`
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    pub field: SnapshotField,
    pub initial: f64,
    pub text: Option<String>,
}

/// Publisher qui enregistre tout ce qui passe
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    announcements: Vec<Announcement>,
    writes: Vec<(SnapshotField, f64)>,
    formatters: HashMap<SnapshotField, Formatter>,
    rejected: Option<SnapshotField>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fait échouer toute écriture de `field` (tests de chemins d'erreur)
    pub fn reject_writes_to(&mut self, field: SnapshotField) {
        self.rejected = Some(field);
    }

    pub fn announcements(&self) -> &[Announcement] {
        &self.announcements
    }

    pub fn writes(&self) -> &[(SnapshotField, f64)] {
        &self.writes
    }

    /// Valeurs écrites pour un champ, dans l'ordre
    pub fn writes_for(&self, field: SnapshotField) -> Vec<f64> {
        self.writes
            .iter()
            .filter(|(f, _)| *f == field)
            .map(|(_, v)| *v)
            .collect()
    }

    pub fn last_value(&self, field: SnapshotField) -> Option<f64> {
        self.writes_for(field).last().copied()
    }

    /// Dernière valeur rendue avec le formatter annoncé
    pub fn last_text(&self, field: SnapshotField) -> Option<String> {
        let format = *self.formatters.get(&field)?;
        self.last_value(field).map(format)
    }

    /// Reset des écritures enregistrées (les formatters annoncés restent)
    pub fn clear(&mut self) {
        self.writes.clear();
    }
}

impl Publisher for RecordingPublisher {
    fn announce(
        &mut self,
        field: SnapshotField,
        initial: f64,
        formatter: Option<Formatter>,
    ) -> Result<(), PublishError> {
        if let Some(format) = formatter {
            self.formatters.insert(field, format);
        }
        self.announcements.push(Announcement {
            field,
            initial,
            text: formatter.map(|format| format(initial)),
        });
        log::info!("📣 [MOCK] announced {}", field);
        Ok(())
    }

    fn write(&mut self, field: SnapshotField, value: f64) -> Result<(), PublishError> {
        if self.rejected == Some(field) {
            return Err(PublishError::Rejected {
                field: field.to_string(),
                reason: "rejected by test publisher".into(),
            });
        }
        self.writes.push((field, value));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symbion_dcsystem::formatter_for;

    #[test]
    fn test_registry_set_and_remove() {
        let mut registry = MockRegistry::new();
        let battery = DeviceHandle::source("battery");
        registry.set(&battery, DeviceAttribute::Current, 3.0);
        registry.set(&battery, DeviceAttribute::Voltage, 12.8);

        assert_eq!(registry.list_devices(DeviceClass::Source), vec!["battery"]);
        assert!(registry.list_devices(DeviceClass::Load).is_empty());
        assert_eq!(registry.read_attribute(&battery, DeviceAttribute::Voltage), Some(12.8));

        registry.clear_attribute(&battery, DeviceAttribute::Voltage);
        assert_eq!(registry.read_attribute(&battery, DeviceAttribute::Voltage), None);

        assert!(registry.remove(&battery));
        assert!(!registry.remove(&battery));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_publisher_records() {
        let mut publisher = RecordingPublisher::new();
        publisher
            .announce(SnapshotField::Power, 0.0, formatter_for(SnapshotField::Power))
            .unwrap();
        publisher.write(SnapshotField::Power, 12.5).unwrap();
        publisher.write(SnapshotField::Power, 13.0).unwrap();

        assert_eq!(publisher.announcements()[0].text.as_deref(), Some("0.00W"));
        assert_eq!(publisher.writes_for(SnapshotField::Power), vec![12.5, 13.0]);
        assert_eq!(publisher.last_text(SnapshotField::Power).as_deref(), Some("13.00W"));

        publisher.reject_writes_to(SnapshotField::Power);
        assert!(publisher.write(SnapshotField::Power, 1.0).is_err());

        publisher.clear();
        assert!(publisher.writes().is_empty());
    }
}
