/*
Client for the fleet backend that owns applications and device
identities. It lists the applications assigned to this manager, hands
out device identities at provisioning time, serves deployment artifacts
and accepts device status and log updates.

Every request carries the static API key as a query parameter.
*/

mod apps;
mod config;
mod provision;
mod report;

pub use apps::AppTarget;
pub use config::RemoteConfig;
pub use provision::{Identity, Provisioner};
pub use report::Reporter;

use reqwest::{Client, Response, StatusCode, Url};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid remote endpoint: {0}")]
    Endpoint(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("remote returned error: ({0}) {1}")]
    Status(StatusCode, String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Backend API client.
pub struct Remote {
    client: Client,
    config: RemoteConfig,
}

impl Remote {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Builds a versioned endpoint URL from path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.config.api_endpoint.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| RemoteError::Endpoint("endpoint cannot be a base URL".into()))?;
            path.pop_if_empty();
            path.push(&self.config.api_version);
            path.extend(segments);
        }
        Ok(url)
    }

    fn key_query(&self) -> [(&'static str, &str); 1] {
        [("apikey", self.config.api_key.as_str())]
    }

    async fn ok(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status(status, message));
        }
        Ok(response)
    }
}
