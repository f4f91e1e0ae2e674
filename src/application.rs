use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::assets;
use crate::device::{DeviceHandle, DeviceKind, DeviceState};
use crate::radio::{RadioTransport, TransportError};
use crate::recovery::ProvisionRecovery;
use crate::registry::{DeviceRegistry, RegistryError};
use crate::remote::{Provisioner, RemoteError, Reporter};
use crate::store::StoreError;

/// Status reported for reconciled devices. Installs are not driven
/// from here, so devices sit at idle between deployments.
const DEVICE_STATUS_IDLE: &str = "Idle";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("radio scan failed: {0}")]
    Scan(#[source] TransportError),

    #[error("provisioning {local_uuid} failed: {source}")]
    Provision {
        local_uuid: String,
        #[source]
        source: ProvisionError,
    },

    #[error("liveness probe for {local_uuid} failed: {source}")]
    Probe {
        local_uuid: String,
        #[source]
        source: TransportError,
    },

    #[error("persisting device records failed: {0}")]
    Persist(#[from] RegistryError),
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("provision recovery ledger: {0}")]
    Recovery(#[from] StoreError),
}

/// One managed application and its device fleet.
///
/// Constructed once per application and reused across reconciliation
/// passes; the persistent store remains the source of truth between
/// passes. The in-memory fleet is owned exclusively by the running
/// pass, and passes for the same application never overlap.
pub struct Application {
    pub name: String,
    pub kind: DeviceKind,
    pub registry: DeviceRegistry,
    pub recovery: ProvisionRecovery,
    pub radio: Arc<dyn RadioTransport>,
    pub provisioner: Arc<dyn Provisioner>,
    pub reporter: Arc<dyn Reporter>,
    pub assets_dir: PathBuf,
    pub scan_timeout: Duration,
    pub probe_timeout: Duration,
}

impl Application {
    /// Runs one reconciliation pass.
    ///
    /// Stages run in a fixed order and are never retried within a
    /// pass; the first fatal stage error ends the pass so later stages
    /// never act on partial data. The next pass starts over from the
    /// store and the radio, which makes a repeated pass over unchanged
    /// inputs a no-op.
    #[instrument(name = "process", skip_all, fields(application = %self.name))]
    pub async fn process(&self) -> Result<(), ProcessError> {
        info!(kind = %self.kind, "reconciling application");

        match assets::deployed_commit(&self.assets_dir, &self.name).await {
            Ok(Some((commit, path))) => {
                debug!(commit, path = %path.display(), "deployed artifact")
            }
            Ok(None) => debug!("no deployed artifact found"),
            Err(err) => warn!("failed to inspect assets directory: {err}"),
        }

        // Load. A failure here degrades to rediscovery: the known set
        // is recoverable from the radio and the backend, while acting
        // on a half-read set is not.
        let mut devices = match self.registry.load(self.kind, &self.name).await {
            Ok(devices) => devices,
            Err(err) => {
                warn!("failed to load known devices, rediscovering: {err}");
                HashMap::new()
            }
        };
        debug!("{} known devices", devices.len());

        // Scan. Without a visibility snapshot there is nothing to
        // reconcile against, so a scan failure ends the pass.
        let visible = self
            .radio
            .scan(&self.name, self.scan_timeout)
            .await
            .map_err(ProcessError::Scan)?;
        debug!("{} devices visible", visible.len());

        // Diff and provision. Only identifiers no known device carries
        // count as new; a known device is never re-provisioned, no
        // matter what its record holds.
        let mut unseen: Vec<&String> = visible
            .iter()
            .filter(|id| devices.values().all(|d| d.record().local_uuid != **id))
            .collect();
        unseen.sort();

        let mut fresh = HashSet::new();
        for local_uuid in unseen {
            let (device, key) =
                self.provision_device(local_uuid)
                    .await
                    .map_err(|source| ProcessError::Provision {
                        local_uuid: local_uuid.clone(),
                        source,
                    })?;
            info!(
                local_uuid = %local_uuid,
                remote_uuid = %device.record().remote_uuid,
                "provisioned device"
            );
            fresh.insert(device.record().remote_uuid.clone());
            devices.insert(key, device);
        }

        // Probe every known device, old and newly created, in a stable
        // order. Map iteration order must not leak into logs or probe
        // sequence.
        let mut order: Vec<(String, String)> = devices
            .iter()
            .map(|(key, device)| (device.record().local_uuid.clone(), key.clone()))
            .collect();
        order.sort();

        let now = Utc::now();
        let mut changed = Vec::new();
        for (local_uuid, key) in &order {
            let online = self
                .radio
                .online(local_uuid, self.probe_timeout)
                .await
                .map_err(|source| ProcessError::Probe {
                    local_uuid: local_uuid.clone(),
                    source,
                })?;

            if let Some(device) = devices.get_mut(key) {
                let record = device.record_mut();
                let previous = record.state;
                record.probed(online, now);
                debug!(local_uuid = %record.local_uuid, state = ?record.state, "probed");

                if record.state != previous || fresh.contains(&record.remote_uuid) {
                    changed.push((record.remote_uuid.clone(), record.state));
                }
            }
        }

        // Persist every record, changed or not; the first failure
        // aborts the remaining saves and surfaces to the caller.
        for (_, key) in &order {
            if let Some(device) = devices.get(key) {
                self.registry.save(key, device.as_ref()).await?;
            }
        }

        // Liveness made it to the store; let the backend know too.
        // Reporting is advisory and never fails the pass.
        for (remote_uuid, state) in changed {
            let online = state == DeviceState::Online;
            if let Err(err) = self
                .reporter
                .device_status(&remote_uuid, DEVICE_STATUS_IDLE, online)
                .await
            {
                warn!(remote_uuid = %remote_uuid, "failed to report device state: {err}");
            }
        }

        Ok(())
    }

    /// Obtains a backend identity for a first-sighted local identifier
    /// and creates its record.
    ///
    /// The identity goes into the recovery ledger before the record
    /// insert, so an insert failure does not orphan it: the next pass
    /// finds the pending entry and skips the backend call.
    async fn provision_device(
        &self,
        local_uuid: &str,
    ) -> Result<(Box<dyn DeviceHandle>, String), ProvisionError> {
        let identity = match self.recovery.pending(&self.name, local_uuid).await? {
            Some(identity) => {
                info!(local_uuid, "reusing pending identity from an earlier pass");
                identity
            }
            None => {
                let identity = self.provisioner.provision(&self.name).await?;
                self.recovery.stash(&self.name, local_uuid, &identity).await?;
                identity
            }
        };

        let (device, key) = self
            .registry
            .create(self.kind, local_uuid, &self.name, &identity.uuid)
            .await?;

        if let Err(err) = self.recovery.clear(&self.name, local_uuid).await {
            warn!(local_uuid, "failed to clear recovery entry: {err}");
        }

        let audit = format!("Provisioned device {local_uuid} as {}", identity.name);
        if let Err(err) = self.reporter.device_log(&identity.uuid, &audit).await {
            warn!(local_uuid, "failed to push provisioning log: {err}");
        }

        Ok((device, key))
    }
}
