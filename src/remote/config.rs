use std::time::Duration;

use reqwest::Url;

/// Backend API configuration.
///
/// Passed explicitly into the client constructor; there is no
/// process-wide backend state, so tests and multi-backend setups can
/// hold several clients side by side.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub api_endpoint: Url,
    pub api_version: String,
    pub api_key: String,
    pub timeout: Duration,
}
