mod application;
mod assets;
mod cli;
mod config;
mod device;
mod radio;
mod recovery;
mod registry;
mod remote;
mod store;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::time;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use application::Application;
use cli::Cli;
use config::Config;
use radio::BleTransport;
use recovery::ProvisionRecovery;
use registry::DeviceRegistry;
use remote::{AppTarget, Remote};
use store::FsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for human-readable logs
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or(
                EnvFilter::default()
                    .add_directive("info".parse()?)
                    .add_directive("zbus=warn".parse()?)
                    .add_directive("hyper=error".parse()?),
            ),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .event_format(fmt::format().compact().with_target(false).without_time()),
        )
        .init();

    info!("Service started");

    let config = Config::from(Cli::parse());
    info!("Configuration loaded successfully");
    debug!("{:#?}", config);

    let Some(remote_config) = config.remote.clone() else {
        warn!("No backend API endpoint provided, nothing to manage");
        return Ok(());
    };

    let remote = Arc::new(Remote::new(remote_config));
    let store = Arc::new(FsStore::new(config.store_dir.join("devices")));
    let radio = Arc::new(BleTransport::new(&config.adapter));
    let recovery_root = config.store_dir.join("pending-provisions");

    // One long-lived Application per managed application, reused
    // across cycles so a fleet is always reconciled by the same
    // instance.
    let mut applications: HashMap<String, Application> = HashMap::new();

    loop {
        cycle(
            &config,
            &remote,
            &store,
            &radio,
            &recovery_root,
            &mut applications,
        )
        .await;
        time::sleep(config.loop_delay).await;
    }
}

/// One reconciliation cycle over every assigned application.
///
/// A failing application never takes the cycle down with it; the error
/// is logged and the remaining applications still get their pass.
async fn cycle(
    config: &Config,
    remote: &Arc<Remote>,
    store: &Arc<FsStore>,
    radio: &Arc<BleTransport>,
    recovery_root: &Path,
    applications: &mut HashMap<String, Application>,
) {
    let mut targets = match remote.applications().await {
        Ok(targets) => targets,
        Err(err) => {
            warn!("failed to list applications: {err}");
            return;
        }
    };
    info!("{} applications assigned", targets.len());
    targets.sort_by(|a, b| a.name.cmp(&b.name));

    for target in targets {
        ensure_artifact(config, remote, &target).await;

        let app = applications
            .entry(target.name.clone())
            .or_insert_with(|| Application {
                name: target.name.clone(),
                kind: target.device_kind,
                registry: DeviceRegistry::new(store.clone()),
                recovery: ProvisionRecovery::new(recovery_root),
                radio: radio.clone(),
                provisioner: remote.clone(),
                reporter: remote.clone(),
                assets_dir: config.assets_dir.clone(),
                scan_timeout: config.scan_timeout,
                probe_timeout: config.probe_timeout,
            });

        if let Err(err) = app.process().await {
            error!(application = %target.name, "reconciliation pass failed: {err}");
        }
    }
}

/// Makes sure the artifact for an application's target commit is
/// available locally, downloading it if needed. Best-effort: a failed
/// download must not block reconciliation.
async fn ensure_artifact(config: &Config, remote: &Remote, target: &AppTarget) {
    let Some(commit) = target.commit.as_deref() else {
        debug!(application = %target.name, "no target commit set");
        return;
    };

    if assets::artifact_present(&config.assets_dir, &target.name, commit).await {
        return;
    }

    info!(application = %target.name, commit, "fetching application artifact");
    match remote
        .fetch_artifact(&target.name, commit, &config.assets_dir)
        .await
    {
        Ok(path) => debug!(path = %path.display(), "artifact downloaded"),
        Err(err) => warn!(application = %target.name, "artifact download failed: {err}"),
    }
}
