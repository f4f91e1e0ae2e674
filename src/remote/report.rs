use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use super::{Remote, RemoteError};

/// Pushes device liveness and log lines to the backend.
///
/// Reporting is advisory; callers treat failures as non-fatal.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn device_status(
        &self,
        remote_uuid: &str,
        status: &str,
        online: bool,
    ) -> Result<(), RemoteError>;

    async fn device_log(&self, remote_uuid: &str, message: &str) -> Result<(), RemoteError>;
}

#[derive(Serialize)]
struct DeviceInfo<'a> {
    status: &'a str,
    is_online: bool,
}

#[derive(Serialize)]
struct DeviceLog<'a> {
    message: &'a str,
    timestamp: i64,
}

#[async_trait]
impl Reporter for Remote {
    async fn device_status(
        &self,
        remote_uuid: &str,
        status: &str,
        online: bool,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&["devices", remote_uuid])?;
        debug!(url = %url, status, online, "transmitting device info");

        let response = self
            .client
            .put(url)
            .query(&self.key_query())
            .timeout(self.config.timeout)
            .json(&DeviceInfo {
                status,
                is_online: online,
            })
            .send()
            .await?;
        Self::ok(response).await?;

        Ok(())
    }

    async fn device_log(&self, remote_uuid: &str, message: &str) -> Result<(), RemoteError> {
        let url = self.endpoint(&["devices", remote_uuid, "logs"])?;
        debug!(url = %url, "transmitting device log");

        let response = self
            .client
            .put(url)
            .query(&self.key_query())
            .timeout(self.config.timeout)
            .json(&DeviceLog {
                message,
                timestamp: Utc::now().timestamp(),
            })
            .send()
            .await?;
        Self::ok(response).await?;

        Ok(())
    }
}
