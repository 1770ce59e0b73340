//! # Shared Types Crate
//!
//! This crate contains the wire and domain types shared across the node-map
//! subsystems: station addresses, telemetry datagram payloads, and the
//! timestamp normalization applied to every inbound payload.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every wire field name is pinned here with
//!   `#[serde(rename)]`; no other crate spells an external field name.
//! - **Lenient shapes, strict rules**: numeric wire fields deserialize as
//!   signed integers so that out-of-range values (negative counters, huge
//!   timestamps) survive deserialization and are rejected by the validation
//!   pipeline with the wire field name, instead of failing as opaque parse
//!   errors.

pub mod address;
pub mod datagram;
pub mod timestamp;

pub use address::{base, eq_ignore_case, ssid};
pub use datagram::{
    CircuitEvent, Datagram, DatagramKind, LinkEvent, NodeEvent, TraceEvent,
};
pub use timestamp::{TimestampError, WireTimestamp, MAX_EPOCH_SECONDS};
