// Wire types for the Tempest REST endpoints and the push channel.
//
// Observation payloads are kept as raw `serde_json::Value`s: their shape
// differs between the REST snapshot (named fields) and the push channel
// (positional arrays), and discriminating between them is the core crate's
// job.

use serde::{Deserialize, Serialize};

/// Device type of the primary all-in-one sensor unit.
pub const PRIMARY_DEVICE_TYPE: &str = "ST";

// ── REST: observations ───────────────────────────────────────────────

/// Response of `GET /observations/station/{station_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationObservationResponse {
    #[serde(default)]
    pub station_id: Option<u64>,

    #[serde(default)]
    pub station_name: Option<String>,

    /// Most recent observation first. Each entry is a named-field object.
    #[serde(default)]
    pub obs: Vec<serde_json::Value>,
}

impl StationObservationResponse {
    /// The newest observation entry, if the station reported any.
    pub fn latest(&self) -> Option<&serde_json::Value> {
        self.obs.first()
    }
}

// ── REST: station metadata ───────────────────────────────────────────

/// Response of `GET /stations/{station_id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StationsResponse {
    #[serde(default)]
    pub stations: Vec<StationMeta>,
}

impl StationsResponse {
    /// All devices across every station in the response, in order.
    pub fn devices(&self) -> impl Iterator<Item = &DeviceMeta> {
        self.stations.iter().flat_map(|s| s.devices.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationMeta {
    pub station_id: u64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub devices: Vec<DeviceMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceMeta {
    pub device_id: u64,

    /// `"ST"` (Tempest), `"HB"` (hub), `"SK"`/`"AR"` (legacy sensors).
    #[serde(default)]
    pub device_type: String,

    #[serde(default)]
    pub serial_number: Option<String>,
}

impl DeviceMeta {
    pub fn is_primary_sensor(&self) -> bool {
        self.device_type == PRIMARY_DEVICE_TYPE
    }
}

// ── Push channel: outbound ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenKind {
    ListenStart,
    ListenStop,
}

/// Subscribe/unsubscribe control frame.
#[derive(Debug, Clone, Serialize)]
pub struct ListenRequest {
    #[serde(rename = "type")]
    pub kind: ListenKind,
    pub device_id: u64,
    /// Unique request token echoed back in the `ack` frame.
    pub id: String,
}

impl ListenRequest {
    pub fn start(device_id: u64) -> Self {
        Self::new(ListenKind::ListenStart, device_id)
    }

    pub fn stop(device_id: u64) -> Self {
        Self::new(ListenKind::ListenStop, device_id)
    }

    fn new(kind: ListenKind, device_id: u64) -> Self {
        Self {
            kind,
            device_id,
            id: chrono::Utc::now().timestamp_millis().to_string(),
        }
    }

    /// Serialize to the JSON text sent over the socket.
    pub fn to_text(&self) -> String {
        // A struct of a unit enum, an integer and a string always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

// ── Push channel: inbound ────────────────────────────────────────────

/// Any frame received from the push channel.
///
/// Only the fields the ingestion core looks at are typed; `obs` stays raw
/// because its presence and shape are checked after the frame type.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub device_id: Option<u64>,

    #[serde(default)]
    pub obs: Option<serde_json::Value>,

    #[serde(default)]
    pub id: Option<String>,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// `obs_st` records, plus the legacy `obs_sky` type.
    pub fn is_observation(&self) -> bool {
        matches!(self.kind.as_str(), "obs_st" | "obs_sky")
    }

    pub fn is_ack(&self) -> bool {
        self.kind == "ack"
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn listen_start_serializes_with_type_tag() {
        let req = ListenRequest::start(4242);
        let json: serde_json::Value = serde_json::from_str(&req.to_text()).unwrap();
        assert_eq!(json["type"], "listen_start");
        assert_eq!(json["device_id"], 4242);
        assert!(json["id"].as_str().is_some_and(|id| !id.is_empty()));
    }

    #[test]
    fn listen_stop_uses_snake_case_kind() {
        let req = ListenRequest::stop(7);
        assert_eq!(req.kind, ListenKind::ListenStop);
        assert!(req.to_text().contains("\"listen_stop\""));
    }

    #[test]
    fn inbound_observation_frame() {
        let frame = InboundFrame::parse(
            r#"{"type":"obs_st","device_id":99,"obs":[[1700000000,0,1.2]],"serial_number":"ST-1"}"#,
        )
        .unwrap();
        assert!(frame.is_observation());
        assert_eq!(frame.device_id, Some(99));
        assert!(frame.obs.as_ref().is_some_and(serde_json::Value::is_array));
    }

    #[test]
    fn inbound_ack_frame() {
        let frame = InboundFrame::parse(r#"{"type":"ack","id":"123"}"#).unwrap();
        assert!(frame.is_ack());
        assert!(!frame.is_observation());
        assert_eq!(frame.id.as_deref(), Some("123"));
    }

    #[test]
    fn legacy_sky_frame_counts_as_observation() {
        let frame = InboundFrame::parse(r#"{"type":"obs_sky","device_id":1,"obs":[]}"#).unwrap();
        assert!(frame.is_observation());
    }

    #[test]
    fn station_devices_flatten_in_order() {
        let resp: StationsResponse = serde_json::from_value(serde_json::json!({
            "stations": [{
                "station_id": 10,
                "name": "Backyard",
                "devices": [
                    { "device_id": 1, "device_type": "HB", "serial_number": "HB-1" },
                    { "device_id": 2, "device_type": "ST", "serial_number": "ST-2" }
                ]
            }]
        }))
        .unwrap();

        let ids: Vec<u64> = resp.devices().map(|d| d.device_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(resp.devices().nth(1).unwrap().is_primary_sensor());
    }
}
