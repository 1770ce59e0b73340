//! # Network State Engine
//!
//! In-memory model of the observed packet network: nodes, links, and
//! circuits built up from telemetry reports. The registry hands out shared
//! entity handles with atomic get-or-create semantics, links and circuits
//! are undirected via canonical keys, and every mutation raises a dirty
//! flag so the persistence layer knows exactly what to flush.
//!
//! This crate is deliberately free of I/O and clocks: callers inject epoch
//! timestamps and decide when to persist.

pub mod entities;
pub mod registry;

pub use entities::{
    ConnectionState, ConnectionStatus, Direction, NodeState, NodeStatus, NodeUpdate,
    TrafficCounters,
};
pub use registry::{canonical_key, ConnectionHandle, NetworkState, NodeHandle, TopologyConfig};
