use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::device::{DeviceHandle, DeviceKind, DeviceRecord, APPLICATION_FIELD};
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed device record: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("device record serialization failed: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Mediates between the persistent store and in-memory device handles.
///
/// Store keys are opaque and assigned at insert time; they are the map
/// keys of every loaded fleet and stay valid across passes.
pub struct DeviceRegistry {
    store: Arc<dyn Store>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Loads every record tagged with the given application.
    ///
    /// A record that fails to decode aborts the whole load; a corrupt
    /// record must be visible to the caller, not silently dropped.
    pub async fn load(
        &self,
        kind: DeviceKind,
        application: &str,
    ) -> Result<HashMap<String, Box<dyn DeviceHandle>>, RegistryError> {
        let documents = self.store.query(APPLICATION_FIELD, application).await?;

        let mut devices = HashMap::with_capacity(documents.len());
        for (key, bytes) in documents {
            let handle = kind.decode(&bytes).map_err(RegistryError::Decode)?;
            trace!(key = %key, local_uuid = %handle.record().local_uuid, "loaded device");
            devices.insert(key, handle);
        }

        Ok(devices)
    }

    /// Serializes and upserts one record under its store key.
    pub async fn save(&self, key: &str, device: &dyn DeviceHandle) -> Result<(), RegistryError> {
        let bytes = device.serialize().map_err(RegistryError::Encode)?;
        self.store.update(key, &bytes).await?;
        Ok(())
    }

    /// Creates and inserts a record for a newly provisioned device,
    /// returning the handle and the store-assigned key.
    pub async fn create(
        &self,
        kind: DeviceKind,
        local_uuid: &str,
        application: &str,
        remote_uuid: &str,
    ) -> Result<(Box<dyn DeviceHandle>, String), RegistryError> {
        let record = DeviceRecord::new(local_uuid, application, remote_uuid);
        let handle = kind.wrap(record);
        let bytes = handle.serialize().map_err(RegistryError::Encode)?;
        let key = self.store.insert(&bytes).await?;
        Ok((handle, key))
    }
}
