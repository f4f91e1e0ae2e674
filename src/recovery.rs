/*
Recovery ledger for half-provisioned devices.

The backend mints a fresh identity on every provision call, so an
identity obtained by a pass that then fails to persist its record would
be orphaned when the next pass rediscovers the same device. The ledger
keeps the identity on disk between the backend call and the record
insert; a later pass picks the pending entry up instead of registering
the device a second time.
*/

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::trace;

use crate::remote::Identity;
use crate::store::{safe_write, StoreError};

pub struct ProvisionRecovery {
    root: PathBuf,
}

impl ProvisionRecovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn entry_path(&self, application: &str, local_uuid: &str) -> PathBuf {
        self.root
            .join(application)
            .join(local_uuid)
            .with_extension("json")
    }

    /// Identity stashed by an earlier pass that failed before its
    /// record insert, if any.
    pub async fn pending(
        &self,
        application: &str,
        local_uuid: &str,
    ) -> Result<Option<Identity>, StoreError> {
        match fs::read(self.entry_path(application, local_uuid)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Stashes a freshly assigned identity ahead of the record insert.
    pub async fn stash(
        &self,
        application: &str,
        local_uuid: &str,
        identity: &Identity,
    ) -> Result<(), StoreError> {
        let path = self.entry_path(application, local_uuid);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        safe_write(&path, &serde_json::to_vec(identity)?).await?;
        trace!(local_uuid = %local_uuid, "stashed pending identity");
        Ok(())
    }

    /// Clears the entry once the record insert has succeeded.
    ///
    /// Idempotent; clearing an absent entry succeeds.
    pub async fn clear(&self, application: &str, local_uuid: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(application, local_uuid)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
