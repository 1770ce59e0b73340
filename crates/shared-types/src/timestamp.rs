//! # Wire Timestamp Normalization
//!
//! Senders report event times either as integer Unix epoch seconds or as an
//! ISO-8601 string; some omit the field entirely. All three are accepted on
//! the wire and normalized to epoch seconds at a single point, so downstream
//! code only ever sees a canonical `i64`.
//!
//! Normalization failures are typed: an unparsable string, a negative value,
//! and a value beyond the maximum representable epoch are three distinct
//! errors, because the validation pipeline reports them differently.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum representable epoch value: 9999-12-31T23:59:59Z, the ceiling of
/// the four-digit-year calendar the ISO-8601 wire form can express.
pub const MAX_EPOCH_SECONDS: i64 = 253_402_300_799;

/// Timestamp normalization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("unparsable timestamp: {0:?}")]
    Unparsable(String),

    #[error("timestamp is negative: {0}")]
    Negative(i64),

    #[error("timestamp exceeds maximum representable epoch value: {0}")]
    BeyondMax(i64),
}

/// A timestamp exactly as received, prior to normalization.
///
/// Kept verbatim so validation errors can echo the offending wire value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireTimestamp {
    /// Integer Unix epoch seconds.
    Seconds(i64),
    /// ISO-8601 text, e.g. `2024-05-01T12:00:00Z`.
    Text(String),
}

impl WireTimestamp {
    /// Normalize to canonical epoch seconds.
    ///
    /// Accepts RFC 3339 (`2024-05-01T12:00:00Z`, offsets allowed) and the
    /// bare `YYYY-MM-DDTHH:MM:SS` form, which is taken as UTC.
    pub fn normalize(&self) -> Result<i64, TimestampError> {
        let secs = match self {
            Self::Seconds(s) => *s,
            Self::Text(t) => parse_iso8601(t)?,
        };

        if secs < 0 {
            return Err(TimestampError::Negative(secs));
        }
        if secs > MAX_EPOCH_SECONDS {
            return Err(TimestampError::BeyondMax(secs));
        }
        Ok(secs)
    }
}

fn parse_iso8601(text: &str) -> Result<i64, TimestampError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(naive.and_utc().timestamp());
    }
    Err(TimestampError::Unparsable(text.to_string()))
}
