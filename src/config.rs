use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Cli;
use crate::remote::RemoteConfig;

/// Resolved process configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub loop_delay: Duration,
    pub scan_timeout: Duration,
    pub probe_timeout: Duration,
    pub assets_dir: PathBuf,
    pub store_dir: PathBuf,
    pub adapter: String,

    /// Absent when no backend endpoint was configured; the manager has
    /// nothing to reconcile in that case.
    pub remote: Option<RemoteConfig>,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        let remote = match (cli.api_endpoint, cli.api_key) {
            (Some(api_endpoint), Some(api_key)) => Some(RemoteConfig {
                api_endpoint,
                api_version: cli.api_version,
                api_key,
                timeout: cli.api_timeout,
            }),
            _ => None,
        };

        Self {
            loop_delay: cli.loop_delay,
            scan_timeout: cli.scan_timeout,
            probe_timeout: cli.probe_timeout,
            assets_dir: cli.assets_dir,
            store_dir: cli.store_dir,
            adapter: cli.adapter,
            remote,
        }
    }
}
