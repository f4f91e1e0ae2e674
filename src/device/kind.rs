use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::record::DeviceRecord;

/// The supported edge device boards.
///
/// The kind selects which handle implementation mediates between stored
/// documents and in-memory records for an application's fleet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceKind {
    Microbit,
    Nrf51Dongle,
}

impl DeviceKind {
    /// Builds a handle of this kind around an existing record.
    pub fn wrap(self, record: DeviceRecord) -> Box<dyn DeviceHandle> {
        match self {
            Self::Microbit => Box::new(Microbit { record }),
            Self::Nrf51Dongle => Box::new(Nrf51Dongle { record }),
        }
    }

    /// Decodes a stored document into a handle of this kind.
    pub fn decode(self, bytes: &[u8]) -> Result<Box<dyn DeviceHandle>, serde_json::Error> {
        let mut handle = self.wrap(DeviceRecord::default());
        handle.deserialize(bytes)?;
        Ok(handle)
    }
}

impl Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Microbit => "microbit".fmt(f),
            Self::Nrf51Dongle => "nrf51-dongle".fmt(f),
        }
    }
}

/// Capability interface over one managed device.
///
/// Variant kinds share the record layout today but own their wire form,
/// so (de)serialization always goes through the kind's handle rather
/// than the record type directly.
pub trait DeviceHandle: Send + Sync + std::fmt::Debug {
    fn serialize(&self) -> Result<Vec<u8>, serde_json::Error>;
    fn deserialize(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error>;
    fn record(&self) -> &DeviceRecord;
    fn record_mut(&mut self) -> &mut DeviceRecord;
}

#[derive(Debug)]
struct Microbit {
    record: DeviceRecord,
}

impl DeviceHandle for Microbit {
    fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.record)
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.record = serde_json::from_slice(bytes)?;
        Ok(())
    }

    fn record(&self) -> &DeviceRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut DeviceRecord {
        &mut self.record
    }
}

#[derive(Debug)]
struct Nrf51Dongle {
    record: DeviceRecord,
}

impl DeviceHandle for Nrf51Dongle {
    fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.record)
    }

    fn deserialize(&mut self, bytes: &[u8]) -> Result<(), serde_json::Error> {
        self.record = serde_json::from_slice(bytes)?;
        Ok(())
    }

    fn record(&self) -> &DeviceRecord {
        &self.record
    }

    fn record_mut(&mut self) -> &mut DeviceRecord {
        &mut self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_uses_slug_wire_form() {
        assert_eq!(
            serde_json::to_value(DeviceKind::Nrf51Dongle).unwrap(),
            serde_json::json!("nrf51-dongle")
        );
        let kind: DeviceKind = serde_json::from_str("\"microbit\"").unwrap();
        assert_eq!(kind, DeviceKind::Microbit);
    }

    #[test]
    fn handle_round_trips_a_record() {
        let record = DeviceRecord::new("AA:BB", "sensor-fleet", "r-1");
        let bytes = DeviceKind::Microbit.wrap(record.clone()).serialize().unwrap();

        let handle = DeviceKind::Microbit.decode(&bytes).unwrap();
        assert_eq!(handle.record(), &record);
    }

    #[test]
    fn decode_rejects_malformed_documents() {
        assert!(DeviceKind::Microbit.decode(b"{\"state\":\"SLEEPING\"}").is_err());
    }
}
