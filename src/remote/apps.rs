use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::fs;
use tracing::debug;

use crate::assets;
use crate::device::DeviceKind;

use super::{Remote, RemoteError};

/// One managed application as described by the backend.
#[derive(Clone, Debug, Deserialize)]
pub struct AppTarget {
    pub name: String,

    /// Artifact revision the fleet should be running, if any is
    /// deployed yet.
    #[serde(default)]
    pub commit: Option<String>,

    #[serde(rename = "device_type")]
    pub device_kind: DeviceKind,
}

impl Remote {
    /// All applications assigned to this manager.
    pub async fn applications(&self) -> Result<Vec<AppTarget>, RemoteError> {
        let url = self.endpoint(&["applications"])?;
        debug!(url = %url, "requesting application list");

        let response = self
            .client
            .get(url)
            .query(&self.key_query())
            .timeout(self.config.timeout)
            .send()
            .await?;
        let response = Self::ok(response).await?;

        Ok(response.json().await?)
    }

    /// Downloads the artifact for `(application, commit)` into the
    /// local assets layout and returns the destination path.
    ///
    /// No request timeout is applied; artifacts can be large and the
    /// transfer is bounded by the server instead.
    pub async fn fetch_artifact(
        &self,
        application: &str,
        commit: &str,
        assets_dir: &Path,
    ) -> Result<PathBuf, RemoteError> {
        let url = self.endpoint(&["assets", application, commit])?;
        debug!(url = %url, "requesting application artifact");

        let response = self
            .client
            .get(url)
            .query(&self.key_query())
            .send()
            .await?;
        let response = Self::ok(response).await?;
        let bytes = response.bytes().await?;

        let destination = assets::artifact_path(assets_dir, application, commit);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&destination, &bytes).await?;

        Ok(destination)
    }
}
