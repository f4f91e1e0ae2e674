use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored document field carrying the owning application, used as the
/// query index when loading a fleet.
pub const APPLICATION_FIELD: &str = "applicationUUID";

/// Liveness classification from the most recent radio probe.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    #[serde(rename = "ONLINE")]
    Online,
    #[serde(rename = "OFFLINE")]
    Offline,
}

/// The persisted state of one managed device.
///
/// `local_uuid` is the radio-level identifier and is unique within an
/// application's fleet; it joins radio observations to stored records.
/// `remote_uuid` is assigned by the backend exactly once and never
/// changes afterwards.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    #[serde(rename = "localUUID")]
    pub local_uuid: String,

    #[serde(rename = "remoteUUID")]
    pub remote_uuid: String,

    #[serde(rename = "applicationUUID")]
    pub application_uuid: String,

    pub commit: String,

    pub state: DeviceState,

    pub progress: f64,

    #[serde(rename = "lastSeen")]
    pub last_seen: DateTime<Utc>,
}

impl DeviceRecord {
    /// A record for a device sighted for the first time.
    pub fn new(local_uuid: &str, application_uuid: &str, remote_uuid: &str) -> Self {
        Self {
            local_uuid: local_uuid.to_owned(),
            remote_uuid: remote_uuid.to_owned(),
            application_uuid: application_uuid.to_owned(),
            commit: String::new(),
            state: DeviceState::Online,
            progress: 0.0,
            last_seen: Utc::now(),
        }
    }

    /// Applies the outcome of a liveness probe.
    ///
    /// `last_seen` only advances on a positive probe; a device that has
    /// dropped off the air keeps the timestamp of its last sighting.
    pub fn probed(&mut self, online: bool, at: DateTime<Utc>) {
        if online {
            self.state = DeviceState::Online;
            self.last_seen = at;
        } else {
            self.state = DeviceState::Offline;
        }
    }
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self {
            local_uuid: String::new(),
            remote_uuid: String::new(),
            application_uuid: String::new(),
            commit: String::new(),
            state: DeviceState::Offline,
            progress: 0.0,
            last_seen: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn stored_documents_use_the_original_field_names() {
        let record = DeviceRecord::new("AA:BB", "sensor-fleet", "r-1");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["localUUID"], json!("AA:BB"));
        assert_eq!(value["remoteUUID"], json!("r-1"));
        assert_eq!(value[APPLICATION_FIELD], json!("sensor-fleet"));
        assert_eq!(value["state"], json!("ONLINE"));
        // zero values must be written out, not elided
        assert_eq!(value["commit"], json!(""));
        assert_eq!(value["progress"], json!(0.0));
        assert!(value.get("lastSeen").is_some());
    }

    #[test]
    fn record_round_trips_through_its_wire_form() {
        let stored = json!({
            "localUUID": "C4:7C:8D:6A",
            "remoteUUID": "r-42",
            "applicationUUID": "sensor-fleet",
            "commit": "d4c3b2a1",
            "state": "OFFLINE",
            "progress": 0.0,
            "lastSeen": "2024-05-01T12:30:00Z",
        });

        let record: DeviceRecord = serde_json::from_value(stored).unwrap();
        assert_eq!(record.local_uuid, "C4:7C:8D:6A");
        assert_eq!(record.state, DeviceState::Offline);

        let cycled: DeviceRecord =
            serde_json::from_value(serde_json::to_value(&record).unwrap()).unwrap();
        assert_eq!(cycled, record);
    }

    #[test]
    fn positive_probe_sets_online_and_advances_last_seen() {
        let mut record = DeviceRecord::new("AA:BB", "app", "r-1");
        record.state = DeviceState::Offline;
        let before = record.last_seen;

        let now = Utc::now();
        record.probed(true, now);

        assert_eq!(record.state, DeviceState::Online);
        assert_eq!(record.last_seen, now);
        assert!(record.last_seen >= before);
    }

    #[test]
    fn negative_probe_sets_offline_and_keeps_last_seen() {
        let mut record = DeviceRecord::new("AA:BB", "app", "r-1");
        let seen = record.last_seen;

        record.probed(false, Utc::now());

        assert_eq!(record.state, DeviceState::Offline);
        assert_eq!(record.last_seen, seen);
    }
}
