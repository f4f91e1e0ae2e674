use clap::Parser;
use reqwest::Url;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

fn parse_duration(s: &str) -> Result<Duration, ParseIntError> {
    let millis: u64 = s.parse()?;
    Ok(Duration::from_millis(millis))
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)] // read from Cargo.toml
pub struct Cli {
    /// Delay between reconciliation cycles in milliseconds
    #[arg(
        env = "IRIS_LOOP_DELAY_MS",
        long = "loop-delay-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "10000"
    )]
    pub loop_delay: Duration,

    /// Radio scan window in milliseconds
    #[arg(
        env = "IRIS_SCAN_TIMEOUT_MS",
        long = "scan-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "10000"
    )]
    pub scan_timeout: Duration,

    /// Per-device liveness probe timeout in milliseconds
    #[arg(
        env = "IRIS_PROBE_TIMEOUT_MS",
        long = "probe-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "10000"
    )]
    pub probe_timeout: Duration,

    /// Directory holding downloaded application artifacts
    #[arg(
        env = "IRIS_ASSETS_DIRECTORY",
        long = "assets-dir",
        value_name = "path",
        default_value = "/data/assets"
    )]
    pub assets_dir: PathBuf,

    /// Directory holding the device record store
    #[arg(
        env = "IRIS_STORE_DIRECTORY",
        long = "store-dir",
        value_name = "path",
        default_value = "/data/database"
    )]
    pub store_dir: PathBuf,

    /// Backend API endpoint URI
    #[arg(
        env = "IRIS_API_ENDPOINT",
        long = "api-endpoint",
        value_name = "uri",
        requires = "api_key"
    )]
    pub api_endpoint: Option<Url>,

    /// Backend API version
    #[arg(
        env = "IRIS_API_VERSION",
        long = "api-version",
        value_name = "str",
        default_value = "v1"
    )]
    pub api_version: String,

    /// Static key attached to every backend request
    #[arg(
        env = "IRIS_API_KEY",
        long = "api-key",
        value_name = "key",
        requires = "api_endpoint"
    )]
    pub api_key: Option<String>,

    /// Backend request timeout in milliseconds
    #[arg(
        env = "IRIS_API_TIMEOUT_MS",
        long = "api-timeout-ms",
        value_name = "ms",
        value_parser = parse_duration,
        default_value = "30000"
    )]
    pub api_timeout: Duration,

    /// Bluetooth adapter backing the radio transport
    #[arg(
        env = "IRIS_BLUETOOTH_ADAPTER",
        long = "adapter",
        value_name = "name",
        default_value = "hci0"
    )]
    pub adapter: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_managed_deployment() {
        let cli = Cli::parse_from(["iris"]);
        assert_eq!(cli.loop_delay, Duration::from_secs(10));
        assert_eq!(cli.scan_timeout, Duration::from_secs(10));
        assert_eq!(cli.assets_dir, PathBuf::from("/data/assets"));
        assert_eq!(cli.store_dir, PathBuf::from("/data/database"));
        assert_eq!(cli.api_version, "v1");
        assert_eq!(cli.adapter, "hci0");
        assert!(cli.api_endpoint.is_none());
    }

    #[test]
    fn endpoint_requires_a_key() {
        let result = Cli::try_parse_from(["iris", "--api-endpoint", "https://api.example.com"]);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_durations_are_rejected() {
        let result = Cli::try_parse_from(["iris", "--loop-delay-ms", "soon"]);
        assert!(result.is_err());
    }
}
