//! Outcome record produced for every processed payload.

use serde::Serialize;
use serde_json::Value;
use shared_types::{Datagram, DatagramKind};

/// Pipeline stage names. These are wire-visible in diagnostics responses
/// and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    JsonParsing,
    TypeRecognition,
    Validation,
    Complete,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::JsonParsing => "json_parsing",
            Stage::TypeRecognition => "type_recognition",
            Stage::Validation => "validation",
            Stage::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// One rule violation, named by the *wire* field as the sender spelled it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    /// Wire property name (`segsSent`, `ctl`, ...), never an internal name.
    pub field: String,
    pub message: String,
    /// The offending value, where one exists to echo back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: None,
        }
    }

    pub fn with_value(field: impl Into<String>, message: impl Into<String>, value: Value) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            value: Some(value),
        }
    }
}

/// Exactly one outcome per processed payload: validity, the stage reached,
/// the recognized type (if classification got that far), and either the
/// typed datagram or the error details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub valid: bool,
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recognized: Option<DatagramKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datagram: Option<Datagram>,
}

impl Outcome {
    pub(crate) fn parse_failure(error: FieldError) -> Self {
        Self {
            valid: false,
            stage: Stage::JsonParsing,
            recognized: None,
            errors: vec![error],
            datagram: None,
        }
    }

    /// A structural failure found while deserializing an already-classified
    /// payload; reported under `json_parsing` but keeps the recognized kind.
    pub(crate) fn shape_failure(kind: DatagramKind, error: FieldError) -> Self {
        Self {
            valid: false,
            stage: Stage::JsonParsing,
            recognized: Some(kind),
            errors: vec![error],
            datagram: None,
        }
    }

    pub(crate) fn type_failure(error: FieldError) -> Self {
        Self {
            valid: false,
            stage: Stage::TypeRecognition,
            recognized: None,
            errors: vec![error],
            datagram: None,
        }
    }

    pub(crate) fn validation_failure(kind: DatagramKind, errors: Vec<FieldError>) -> Self {
        Self {
            valid: false,
            stage: Stage::Validation,
            recognized: Some(kind),
            errors,
            datagram: None,
        }
    }

    pub(crate) fn complete(datagram: Datagram) -> Self {
        Self {
            valid: true,
            stage: Stage::Complete,
            recognized: Some(datagram.kind()),
            errors: Vec::new(),
            datagram: Some(datagram),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wire_names() {
        assert_eq!(Stage::JsonParsing.to_string(), "json_parsing");
        assert_eq!(Stage::TypeRecognition.to_string(), "type_recognition");
        assert_eq!(Stage::Validation.to_string(), "validation");
        assert_eq!(Stage::Complete.to_string(), "complete");

        let json = serde_json::to_string(&Stage::TypeRecognition).unwrap();
        assert_eq!(json, "\"type_recognition\"");
    }

    #[test]
    fn test_error_value_omitted_when_absent() {
        let err = FieldError::new("node", "is required");
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("value").is_none());

        let err = FieldError::with_value("id", "must be greater than zero", 0.into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["value"], 0);
    }
}
