use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time;
use tracing::{debug, trace};
use zbus::zvariant::{OwnedObjectPath, OwnedValue};
use zbus::Connection;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("radio transport unavailable: {0}")]
    Unavailable(String),

    #[error("D-Bus error: {0}")]
    DBus(#[from] zbus::Error),
}

/// Scan-and-probe access to locally reachable devices.
///
/// Both operations block for at most the given timeout. Identifiers are
/// transport-level addresses, stable per device.
#[async_trait]
pub trait RadioTransport: Send + Sync {
    /// Identifiers of devices currently visible for the given scope.
    async fn scan(&self, scope: &str, timeout: Duration)
        -> Result<HashSet<String>, TransportError>;

    /// Whether a single identifier currently answers on the air.
    async fn online(&self, local_uuid: &str, timeout: Duration)
        -> Result<bool, TransportError>;
}

const DEVICE_INTERFACE: &str = "org.bluez.Device1";

// BlueZ adapter D-Bus interface
#[zbus::proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
trait Adapter {
    /// StartDiscovery method
    fn start_discovery(&self) -> zbus::Result<()>;

    /// StopDiscovery method
    fn stop_discovery(&self) -> zbus::Result<()>;
}

type ManagedObjects = HashMap<OwnedObjectPath, HashMap<String, HashMap<String, OwnedValue>>>;

// Standard ObjectManager interface exposed by bluezd at the bus root
#[zbus::proxy(
    interface = "org.freedesktop.DBus.ObjectManager",
    default_service = "org.bluez",
    default_path = "/"
)]
trait ObjectManager {
    /// GetManagedObjects method
    fn get_managed_objects(&self) -> zbus::Result<ManagedObjects>;
}

/// BLE transport backed by BlueZ over the system bus.
///
/// Devices advertise the name of the application they belong to; a scan
/// opens a discovery window and reports the addresses of every device
/// whose alias matches the scan scope.
pub struct BleTransport {
    adapter: String,
}

impl BleTransport {
    pub fn new(adapter: &str) -> Self {
        Self {
            adapter: adapter.to_owned(),
        }
    }

    /// Runs a discovery window and returns the bus's object tree.
    async fn discover(&self, window: Duration) -> Result<ManagedObjects, TransportError> {
        let connection = Connection::system()
            .await
            .map_err(|err| TransportError::Unavailable(err.to_string()))?;
        let adapter = AdapterProxy::builder(&connection)
            .path(format!("/org/bluez/{}", self.adapter))?
            .build()
            .await?;

        // BlueZ replies InProgress when a discovery session is already
        // open; the window below still observes its results
        if let Err(err) = adapter.start_discovery().await {
            trace!("start_discovery: {err}");
        }

        time::sleep(window).await;

        let objects = ObjectManagerProxy::new(&connection)
            .await?
            .get_managed_objects()
            .await?;

        let _ = adapter.stop_discovery().await;

        Ok(objects)
    }
}

#[async_trait]
impl RadioTransport for BleTransport {
    async fn scan(
        &self,
        scope: &str,
        timeout: Duration,
    ) -> Result<HashSet<String>, TransportError> {
        let objects = self.discover(timeout).await?;

        let mut visible = HashSet::new();
        for interfaces in objects.values() {
            let Some(props) = interfaces.get(DEVICE_INTERFACE) else {
                continue;
            };
            let alias = string_prop(props, "Alias").or_else(|| string_prop(props, "Name"));
            if alias.as_deref() != Some(scope) {
                continue;
            }
            if let Some(address) = string_prop(props, "Address") {
                visible.insert(address);
            }
        }

        debug!(scope, "{} devices visible", visible.len());
        Ok(visible)
    }

    async fn online(
        &self,
        local_uuid: &str,
        timeout: Duration,
    ) -> Result<bool, TransportError> {
        let objects = self.discover(timeout).await?;

        let online = objects.values().any(|interfaces| {
            interfaces.get(DEVICE_INTERFACE).is_some_and(|props| {
                string_prop(props, "Address").as_deref() == Some(local_uuid)
                    // in range right now, or holding an open connection
                    && (props.contains_key("RSSI")
                        || bool_prop(props, "Connected").unwrap_or(false))
            })
        });

        trace!(local_uuid, online, "probed");
        Ok(online)
    }
}

fn string_prop(props: &HashMap<String, OwnedValue>, name: &str) -> Option<String> {
    props
        .get(name)
        .and_then(|value| value.downcast_ref::<&str>().ok())
        .map(str::to_owned)
}

fn bool_prop(props: &HashMap<String, OwnedValue>, name: &str) -> Option<bool> {
    props
        .get(name)
        .and_then(|value| value.downcast_ref::<bool>().ok())
}
