//! Per-variant field rules, applied after deserialization.
//!
//! Every violation is reported with the wire property name the sender used.
//! Numeric bounds are inclusive.

use serde_json::Value;
use shared_types::{
    CircuitEvent, Datagram, LinkEvent, NodeEvent, TimestampError, TraceEvent, WireTimestamp,
};

use crate::outcome::FieldError;
use crate::pipeline::TYPE_FIELD;

pub(crate) fn check(datagram: &Datagram) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let canonical = datagram.kind().canonical_name();

    match datagram {
        Datagram::NodeUp(e) | Datagram::NodeDown(e) | Datagram::NodeStatus(e) => {
            check_node_event(canonical, e, &mut errors);
        }
        Datagram::LinkUp(e) | Datagram::LinkDown(e) | Datagram::LinkStatus(e) => {
            check_link_event(canonical, e, &mut errors);
        }
        Datagram::CircuitUp(e) | Datagram::CircuitDown(e) | Datagram::CircuitStatus(e) => {
            check_circuit_event(canonical, e, &mut errors);
        }
        Datagram::L2Trace(e) => check_trace_event(canonical, e, &mut errors),
    }

    errors
}

fn check_node_event(canonical: &str, e: &NodeEvent, errors: &mut Vec<FieldError>) {
    exact_type(canonical, &e.type_name, errors);
    required_address("node", e.node.as_deref(), errors);
    in_range("latitude", e.latitude, -90.0, 90.0, errors);
    in_range("longitude", e.longitude, -180.0, 180.0, errors);
    timestamp("time", e.time.as_ref(), errors);
}

fn check_link_event(canonical: &str, e: &LinkEvent, errors: &mut Vec<FieldError>) {
    exact_type(canonical, &e.type_name, errors);
    required_address("node", e.node.as_deref(), errors);
    positive_id("port", e.port, errors);
    direction("direction", e.direction.as_deref(), errors);
    byte_bounded("quality", e.quality, errors);
    counter("framesSent", e.frames_sent, errors);
    counter("framesRcvd", e.frames_rcvd, errors);
    counter("framesResent", e.frames_resent, errors);
    counter("framesQueued", e.frames_queued, errors);
    counter("bytesSent", e.bytes_sent, errors);
    counter("bytesRcvd", e.bytes_rcvd, errors);
    timestamp("time", e.time.as_ref(), errors);
}

fn check_circuit_event(canonical: &str, e: &CircuitEvent, errors: &mut Vec<FieldError>) {
    exact_type(canonical, &e.type_name, errors);
    required_address("node", e.node.as_deref(), errors);
    positive_id("id", e.id, errors);
    direction("direction", e.direction.as_deref(), errors);
    counter("segsSent", e.segs_sent, errors);
    counter("segsRcvd", e.segs_rcvd, errors);
    counter("segsResent", e.segs_resent, errors);
    counter("segsQueued", e.segs_queued, errors);
    counter("bytesSent", e.bytes_sent, errors);
    counter("bytesRcvd", e.bytes_rcvd, errors);
    timestamp("time", e.time.as_ref(), errors);
}

fn check_trace_event(canonical: &str, e: &TraceEvent, errors: &mut Vec<FieldError>) {
    exact_type(canonical, &e.type_name, errors);
    required_address("node", e.node.as_deref(), errors);
    positive_id("port", e.port, errors);
    counter("len", e.len, errors);
    timestamp("time", e.time.as_ref(), errors);
}

/// The in-payload discriminator must equal the canonical name exactly.
/// Classification was case-insensitive; this rule is not.
fn exact_type(canonical: &str, actual: &str, errors: &mut Vec<FieldError>) {
    if actual != canonical {
        errors.push(FieldError::with_value(
            TYPE_FIELD,
            format!("must equal \"{canonical}\" exactly"),
            Value::from(actual),
        ));
    }
}

fn required_address(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    match value {
        None => errors.push(FieldError::new(field, "is required")),
        Some(v) if v.trim().is_empty() => errors.push(FieldError::with_value(
            field,
            "is required and must not be blank",
            Value::from(v),
        )),
        Some(_) => {}
    }
}

fn positive_id(field: &str, value: Option<i64>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if v <= 0 {
            errors.push(FieldError::with_value(
                field,
                "must be greater than zero",
                Value::from(v),
            ));
        }
    }
}

fn direction(field: &str, value: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if v != "incoming" && v != "outgoing" {
            errors.push(FieldError::with_value(
                field,
                "must be exactly \"incoming\" or \"outgoing\"",
                Value::from(v),
            ));
        }
    }
}

fn counter(field: &str, value: Option<i64>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if v < 0 {
            errors.push(FieldError::with_value(
                field,
                "must not be negative",
                Value::from(v),
            ));
        }
    }
}

fn byte_bounded(field: &str, value: Option<i64>, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if !(0..=255).contains(&v) {
            errors.push(FieldError::with_value(
                field,
                "must be between 0 and 255",
                Value::from(v),
            ));
        }
    }
}

fn in_range(field: &str, value: Option<f64>, min: f64, max: f64, errors: &mut Vec<FieldError>) {
    if let Some(v) = value {
        if !(min..=max).contains(&v) {
            errors.push(FieldError::with_value(
                field,
                format!("must be between {min} and {max}"),
                Value::from(v),
            ));
        }
    }
}

fn timestamp(field: &str, value: Option<&WireTimestamp>, errors: &mut Vec<FieldError>) {
    let Some(ts) = value else { return };
    if let Err(e) = ts.normalize() {
        let message = match e {
            TimestampError::Negative(_) => "must not be negative".to_string(),
            TimestampError::BeyondMax(_) => {
                "exceeds the maximum representable epoch value".to_string()
            }
            TimestampError::Unparsable(_) => "is not a recognizable timestamp".to_string(),
        };
        let value = match ts {
            WireTimestamp::Seconds(s) => Value::from(*s),
            WireTimestamp::Text(t) => Value::from(t.clone()),
        };
        errors.push(FieldError::with_value(field, message, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Stage;
    use crate::pipeline::validate;

    fn errors_of(raw: &[u8]) -> Vec<FieldError> {
        let outcome = validate(raw);
        assert_eq!(outcome.stage, Stage::Validation);
        outcome.errors
    }

    #[test]
    fn test_exact_case_discriminator() {
        let errors = errors_of(br#"{"type":"NODEUP","node":"G8PZT"}"#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "type");
        assert!(errors[0].message.contains("NodeUp"));
    }

    #[test]
    fn test_blank_node_rejected() {
        let errors = errors_of(br#"{"type":"NodeUp","node":"   "}"#);
        assert_eq!(errors[0].field, "node");
    }

    #[test]
    fn test_missing_node_is_a_field_rule_not_a_parse_failure() {
        // errors_of already asserts the validation stage was reached.
        let errors = errors_of(br#"{"type":"NodeUp"}"#);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "node");
        assert!(errors[0].message.contains("required"));

        let errors = errors_of(br#"{"type":"LinkStatus","framesSent":4}"#);
        assert_eq!(errors[0].field, "node");
    }

    #[test]
    fn test_direction_exact_values_only() {
        let errors = errors_of(
            br#"{"type":"CircuitUp","node":"G8PZT-1","direction":"sideways"}"#,
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "direction");

        // Casing is not forgiven here.
        let errors = errors_of(
            br#"{"type":"CircuitUp","node":"G8PZT-1","direction":"Incoming"}"#,
        );
        assert_eq!(errors[0].field, "direction");
    }

    #[test]
    fn test_nonpositive_id_rejected() {
        let errors = errors_of(br#"{"type":"CircuitUp","node":"G8PZT-1","id":0}"#);
        assert_eq!(errors[0].field, "id");
        assert_eq!(errors[0].value, Some(0.into()));
    }

    #[test]
    fn test_negative_counter_uses_wire_field_name() {
        let errors = errors_of(br#"{"type":"LinkStatus","node":"G8PZT","framesSent":-1}"#);
        assert_eq!(errors[0].field, "framesSent");
    }

    #[test]
    fn test_quality_byte_bounds() {
        let errors = errors_of(br#"{"type":"LinkUp","node":"G8PZT","peer":"G7XXX","quality":256}"#);
        assert_eq!(errors[0].field, "quality");

        let ok = validate(br#"{"type":"LinkUp","node":"G8PZT","peer":"G7XXX","quality":255}"#);
        assert!(ok.valid);
    }

    #[test]
    fn test_coordinate_bounds() {
        let errors = errors_of(br#"{"type":"NodeStatus","node":"G8PZT","latitude":90.5}"#);
        assert_eq!(errors[0].field, "latitude");

        let errors = errors_of(br#"{"type":"NodeStatus","node":"G8PZT","longitude":-180.5}"#);
        assert_eq!(errors[0].field, "longitude");

        let ok = validate(
            br#"{"type":"NodeStatus","node":"G8PZT","latitude":-90.0,"longitude":180.0}"#,
        );
        assert!(ok.valid);
    }

    #[test]
    fn test_timestamp_negative_and_beyond_max_are_distinct() {
        let errors = errors_of(br#"{"type":"NodeUp","node":"G8PZT","time":-5}"#);
        assert_eq!(errors[0].field, "time");
        assert!(errors[0].message.contains("negative"));

        let errors = errors_of(br#"{"type":"NodeUp","node":"G8PZT","time":253402300800}"#);
        assert_eq!(errors[0].field, "time");
        assert!(errors[0].message.contains("maximum"));
    }

    #[test]
    fn test_multiple_violations_all_collected() {
        let errors = errors_of(
            br#"{"type":"CircuitStatus","node":"","id":-2,"direction":"both","segsRcvd":-1}"#,
        );
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["node", "id", "direction", "segsRcvd"]);
    }
}
