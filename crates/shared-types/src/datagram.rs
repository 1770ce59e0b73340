//! # Telemetry Datagram Wire Types
//!
//! One inbound UDP datagram carries one JSON object, discriminated by its
//! `type` field. Ten wire types are known: node up/down/status, link
//! up/down/status, circuit up/down/status, and a link-layer trace.
//!
//! The wire field names in this module are part of the external contract and
//! must not change: heterogeneous senders (node firmware from several
//! authors) already emit them. Internal names may differ from wire names
//! (e.g. `control` is abbreviated `ctl` on the wire).
//!
//! Payload structs keep numeric fields as signed integers and the `type`
//! field as a raw string so the validation pipeline can enforce semantic
//! rules (counters `>= 0`, exact-case discriminator) with proper wire-level
//! error reporting rather than opaque deserialization failures.

use serde::{Deserialize, Serialize};

use crate::timestamp::WireTimestamp;

/// The closed set of known datagram kinds.
///
/// Classification from the wire `type` field is case-insensitive; the
/// canonical names below are the exact-case forms required *inside* the
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatagramKind {
    NodeUp,
    NodeDown,
    NodeStatus,
    LinkUp,
    LinkDown,
    LinkStatus,
    CircuitUp,
    CircuitDown,
    CircuitStatus,
    L2Trace,
}

impl DatagramKind {
    /// Every known kind, in wire-documentation order.
    pub const ALL: [DatagramKind; 10] = [
        DatagramKind::NodeUp,
        DatagramKind::NodeDown,
        DatagramKind::NodeStatus,
        DatagramKind::LinkUp,
        DatagramKind::LinkDown,
        DatagramKind::LinkStatus,
        DatagramKind::CircuitUp,
        DatagramKind::CircuitDown,
        DatagramKind::CircuitStatus,
        DatagramKind::L2Trace,
    ];

    /// Canonical (exact-case) wire name.
    #[must_use]
    pub const fn canonical_name(self) -> &'static str {
        match self {
            DatagramKind::NodeUp => "NodeUp",
            DatagramKind::NodeDown => "NodeDown",
            DatagramKind::NodeStatus => "NodeStatus",
            DatagramKind::LinkUp => "LinkUp",
            DatagramKind::LinkDown => "LinkDown",
            DatagramKind::LinkStatus => "LinkStatus",
            DatagramKind::CircuitUp => "CircuitUp",
            DatagramKind::CircuitDown => "CircuitDown",
            DatagramKind::CircuitStatus => "CircuitStatus",
            DatagramKind::L2Trace => "L2Trace",
        }
    }

    /// Classify a wire `type` value, case-insensitively.
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.canonical_name().eq_ignore_ascii_case(name))
    }

    /// The full supported-type list, for classification error messages.
    #[must_use]
    pub fn supported_names() -> Vec<&'static str> {
        Self::ALL.into_iter().map(Self::canonical_name).collect()
    }
}

impl std::fmt::Display for DatagramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Payload of `NodeUp` / `NodeDown` / `NodeStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvent {
    /// In-payload discriminator; must match the canonical name exactly.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Reporting node's address. Optional in shape so that its absence is
    /// reported as a field rule violation, not a deserialization failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Maidenhead locator, e.g. `IO82vj`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub software: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<WireTimestamp>,
}

/// Payload of `LinkUp` / `LinkDown` / `LinkStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkEvent {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Reporting (local) node's address. Required by field rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Far end of the link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    /// `incoming` or `outgoing`, from the reporting node's point of view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Routing quality, 0-255.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<i64>,
    #[serde(rename = "framesSent", default, skip_serializing_if = "Option::is_none")]
    pub frames_sent: Option<i64>,
    #[serde(rename = "framesRcvd", default, skip_serializing_if = "Option::is_none")]
    pub frames_rcvd: Option<i64>,
    #[serde(rename = "framesResent", default, skip_serializing_if = "Option::is_none")]
    pub frames_resent: Option<i64>,
    #[serde(rename = "framesQueued", default, skip_serializing_if = "Option::is_none")]
    pub frames_queued: Option<i64>,
    #[serde(rename = "bytesSent", default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<i64>,
    #[serde(rename = "bytesRcvd", default, skip_serializing_if = "Option::is_none")]
    pub bytes_rcvd: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<WireTimestamp>,
}

/// Payload of `CircuitUp` / `CircuitDown` / `CircuitStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitEvent {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Reporting node's address. Required by field rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Circuit identifier at the reporting node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    /// Far endpoint, `USER@STATION:PORT` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// Near endpoint, `STATION:ID` form.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(rename = "segsSent", default, skip_serializing_if = "Option::is_none")]
    pub segs_sent: Option<i64>,
    #[serde(rename = "segsRcvd", default, skip_serializing_if = "Option::is_none")]
    pub segs_rcvd: Option<i64>,
    #[serde(rename = "segsResent", default, skip_serializing_if = "Option::is_none")]
    pub segs_resent: Option<i64>,
    #[serde(rename = "segsQueued", default, skip_serializing_if = "Option::is_none")]
    pub segs_queued: Option<i64>,
    #[serde(rename = "bytesSent", default, skip_serializing_if = "Option::is_none")]
    pub bytes_sent: Option<i64>,
    #[serde(rename = "bytesRcvd", default, skip_serializing_if = "Option::is_none")]
    pub bytes_rcvd: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<WireTimestamp>,
}

/// Payload of `L2Trace`: one observed link-layer frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    #[serde(rename = "type")]
    pub type_name: String,
    /// Reporting node's address. Required by field rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,
    /// Frame control byte. Abbreviated `ctl` on the wire.
    #[serde(rename = "ctl", default, skip_serializing_if = "Option::is_none")]
    pub control: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<WireTimestamp>,
}

/// A fully classified telemetry datagram.
///
/// Serialization is untagged: each payload already carries its own wire
/// `type` field, so the JSON written out matches the JSON received.
/// Deliberately not `Deserialize`: inbound classification is staged (see
/// the validation pipeline), never a blind untagged guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Datagram {
    NodeUp(NodeEvent),
    NodeDown(NodeEvent),
    NodeStatus(NodeEvent),
    LinkUp(LinkEvent),
    LinkDown(LinkEvent),
    LinkStatus(LinkEvent),
    CircuitUp(CircuitEvent),
    CircuitDown(CircuitEvent),
    CircuitStatus(CircuitEvent),
    L2Trace(TraceEvent),
}

impl Datagram {
    /// The kind this datagram was classified as.
    #[must_use]
    pub const fn kind(&self) -> DatagramKind {
        match self {
            Datagram::NodeUp(_) => DatagramKind::NodeUp,
            Datagram::NodeDown(_) => DatagramKind::NodeDown,
            Datagram::NodeStatus(_) => DatagramKind::NodeStatus,
            Datagram::LinkUp(_) => DatagramKind::LinkUp,
            Datagram::LinkDown(_) => DatagramKind::LinkDown,
            Datagram::LinkStatus(_) => DatagramKind::LinkStatus,
            Datagram::CircuitUp(_) => DatagramKind::CircuitUp,
            Datagram::CircuitDown(_) => DatagramKind::CircuitDown,
            Datagram::CircuitStatus(_) => DatagramKind::CircuitStatus,
            Datagram::L2Trace(_) => DatagramKind::L2Trace,
        }
    }

    /// The primary (reporting-node) address. Always present on a datagram
    /// that passed validation.
    #[must_use]
    pub fn node(&self) -> Option<&str> {
        match self {
            Datagram::NodeUp(e) | Datagram::NodeDown(e) | Datagram::NodeStatus(e) => {
                e.node.as_deref()
            }
            Datagram::LinkUp(e) | Datagram::LinkDown(e) | Datagram::LinkStatus(e) => {
                e.node.as_deref()
            }
            Datagram::CircuitUp(e) | Datagram::CircuitDown(e) | Datagram::CircuitStatus(e) => {
                e.node.as_deref()
            }
            Datagram::L2Trace(e) => e.node.as_deref(),
        }
    }

    /// The raw wire timestamp, if the sender included one.
    #[must_use]
    pub fn time(&self) -> Option<&WireTimestamp> {
        match self {
            Datagram::NodeUp(e) | Datagram::NodeDown(e) | Datagram::NodeStatus(e) => {
                e.time.as_ref()
            }
            Datagram::LinkUp(e) | Datagram::LinkDown(e) | Datagram::LinkStatus(e) => {
                e.time.as_ref()
            }
            Datagram::CircuitUp(e) | Datagram::CircuitDown(e) | Datagram::CircuitStatus(e) => {
                e.time.as_ref()
            }
            Datagram::L2Trace(e) => e.time.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(
            DatagramKind::from_wire_name("circuitstatus"),
            Some(DatagramKind::CircuitStatus)
        );
        assert_eq!(
            DatagramKind::from_wire_name("NODEUP"),
            Some(DatagramKind::NodeUp)
        );
        assert_eq!(DatagramKind::from_wire_name("Telegram"), None);
    }

    #[test]
    fn test_supported_names_covers_all_kinds() {
        let names = DatagramKind::supported_names();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"CircuitStatus"));
        assert!(names.contains(&"L2Trace"));
    }

    #[test]
    fn test_circuit_event_wire_field_names() {
        let json = r#"{
            "type": "CircuitStatus",
            "node": "G8PZT-1",
            "id": 1,
            "direction": "incoming",
            "remote": "G8PZT@G8PZT:14c0",
            "local": "G8PZT-4:0001",
            "segsSent": 6,
            "segsRcvd": 20,
            "segsResent": 0,
            "segsQueued": 0
        }"#;
        let event: CircuitEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.type_name, "CircuitStatus");
        assert_eq!(event.node.as_deref(), Some("G8PZT-1"));
        assert_eq!(event.segs_sent, Some(6));
        assert_eq!(event.segs_rcvd, Some(20));
        assert_eq!(event.time, None);
    }

    #[test]
    fn test_trace_event_control_abbreviated_on_wire() {
        let json = r#"{"type":"L2Trace","node":"G8PZT","ctl":63,"pid":240}"#;
        let event: TraceEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.control, Some(63));

        let out = serde_json::to_value(&event).unwrap();
        assert_eq!(out["ctl"], 63);
        assert!(out.get("control").is_none());
    }

    #[test]
    fn test_datagram_serializes_as_received_shape() {
        let event = NodeEvent {
            type_name: "NodeUp".to_string(),
            node: Some("G8PZT".to_string()),
            alias: Some("KIDDER".to_string()),
            locator: None,
            software: None,
            version: None,
            latitude: None,
            longitude: None,
            time: Some(WireTimestamp::Seconds(1_700_000_000)),
        };
        let value = serde_json::to_value(Datagram::NodeUp(event)).unwrap();
        assert_eq!(value["type"], "NodeUp");
        assert_eq!(value["node"], "G8PZT");
        assert_eq!(value["time"], 1_700_000_000i64);
    }

    #[test]
    fn test_negative_counter_survives_deserialization() {
        // Range enforcement belongs to the validation pipeline, which needs
        // the value intact to report it.
        let json = r#"{"type":"LinkStatus","node":"G8PZT","framesSent":-4}"#;
        let event: LinkEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.frames_sent, Some(-4));
    }
}
