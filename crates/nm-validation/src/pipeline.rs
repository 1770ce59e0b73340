//! The staged pipeline itself.

use serde_json::Value;
use shared_types::{Datagram, DatagramKind};
use tracing::trace;

use crate::outcome::{FieldError, Outcome};
use crate::rules;

/// Wire name of the type discriminator field.
pub const TYPE_FIELD: &str = "type";

/// Run one payload through every stage. Never fails; the worst malformed
/// input still yields a structured [`Outcome`].
#[must_use]
pub fn validate(raw: &[u8]) -> Outcome {
    // Stage: json_parsing
    let value: Value = match serde_json::from_slice(raw) {
        Ok(v) => v,
        Err(e) => {
            return Outcome::parse_failure(FieldError::new(
                "payload",
                format!("invalid JSON at line {}, column {}: {e}", e.line(), e.column()),
            ));
        }
    };
    if !value.is_object() {
        return Outcome::parse_failure(FieldError::new(
            "payload",
            "top-level JSON value must be an object",
        ));
    }

    // Stage: type_recognition
    let kind = match classify(&value) {
        Ok(kind) => kind,
        Err(outcome) => return *outcome,
    };
    trace!(kind = %kind, "Datagram classified");

    // Stage: deserialize-and-validate
    let datagram = match deserialize(kind, value) {
        Ok(datagram) => datagram,
        Err(e) => {
            // Field shapes structurally incompatible with the variant
            // (string where a number was required, etc).
            return Outcome::shape_failure(
                kind,
                FieldError::new("payload", format!("does not fit {kind}: {e}")),
            );
        }
    };

    let errors = rules::check(&datagram);
    if errors.is_empty() {
        Outcome::complete(datagram)
    } else {
        Outcome::validation_failure(kind, errors)
    }
}

fn classify(value: &Value) -> Result<DatagramKind, Box<Outcome>> {
    let supported = DatagramKind::supported_names().join(", ");

    let Some(discriminator) = value.get(TYPE_FIELD) else {
        return Err(Box::new(Outcome::type_failure(FieldError::new(
            TYPE_FIELD,
            format!("missing \"{TYPE_FIELD}\" field; supported types: {supported}"),
        ))));
    };

    let name = discriminator.as_str().unwrap_or_default();
    match DatagramKind::from_wire_name(name) {
        Some(kind) => Ok(kind),
        None => Err(Box::new(Outcome::type_failure(FieldError::with_value(
            TYPE_FIELD,
            format!("unknown type; supported types: {supported}"),
            discriminator.clone(),
        )))),
    }
}

fn deserialize(kind: DatagramKind, value: Value) -> Result<Datagram, serde_json::Error> {
    Ok(match kind {
        DatagramKind::NodeUp => Datagram::NodeUp(serde_json::from_value(value)?),
        DatagramKind::NodeDown => Datagram::NodeDown(serde_json::from_value(value)?),
        DatagramKind::NodeStatus => Datagram::NodeStatus(serde_json::from_value(value)?),
        DatagramKind::LinkUp => Datagram::LinkUp(serde_json::from_value(value)?),
        DatagramKind::LinkDown => Datagram::LinkDown(serde_json::from_value(value)?),
        DatagramKind::LinkStatus => Datagram::LinkStatus(serde_json::from_value(value)?),
        DatagramKind::CircuitUp => Datagram::CircuitUp(serde_json::from_value(value)?),
        DatagramKind::CircuitDown => Datagram::CircuitDown(serde_json::from_value(value)?),
        DatagramKind::CircuitStatus => Datagram::CircuitStatus(serde_json::from_value(value)?),
        DatagramKind::L2Trace => Datagram::L2Trace(serde_json::from_value(value)?),
    })
}
