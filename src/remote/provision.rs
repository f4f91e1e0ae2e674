use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Remote, RemoteError};

/// Identity assigned by the backend when a device is registered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub uuid: String,
    pub name: String,
}

/// Registers newly-observed devices against an application on the
/// backend.
///
/// The backend mints a fresh identity on every call; registration is
/// not idempotent, so callers must invoke this at most once per
/// newly-sighted local identifier.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn provision(&self, application: &str) -> Result<Identity, RemoteError>;
}

#[derive(Serialize)]
struct ProvisionRequest<'a> {
    #[serde(rename = "applicationUUID")]
    application: &'a str,
}

#[async_trait]
impl Provisioner for Remote {
    async fn provision(&self, application: &str) -> Result<Identity, RemoteError> {
        let url = self.endpoint(&["devices"])?;
        debug!(url = %url, application, "requesting device provision");

        let response = self
            .client
            .post(url)
            .query(&self.key_query())
            .timeout(self.config.timeout)
            .json(&ProvisionRequest { application })
            .send()
            .await?;
        let response = Self::ok(response).await?;

        Ok(response.json().await?)
    }
}
