//! # nm-ingress
//!
//! Ingress admission control for the node-map UDP intake.
//!
//! ## Role in System
//!
//! Every received datagram passes through here before any byte of its
//! payload is inspected. Three gates, evaluated in order, first failure
//! wins:
//!
//! 1. **Blacklist**: source matches a configured address/CIDR entry;
//!    rejected permanently with reason `blacklist`.
//! 2. **Packet guard** (optional): a cheap fixed-capacity token bucket,
//!    per source and global; reason `packet_rate_limit`.
//! 3. **Rolling window**: the dual-threshold check over a 10-second
//!    sliding history; reasons `burst_limit` and `sustained_rate_limit`.
//!
//! The dual window exists because amateur packet-radio traffic is bursty
//! and low-volume: a store-and-forward node flushing its queue is
//! legitimate, a steady low-grade flood is not. A short burst slice catches
//! floods immediately while the 10-second average catches sustained abuse,
//! and admission state self-heals as old timestamps age out.
//!
//! All operations are synchronous bookkeeping over concurrent maps; nothing
//! here performs I/O or blocks.

pub mod cidr;
pub mod guard;
pub mod limiter;

pub use cidr::{Prefix, PrefixList};
pub use guard::{PacketGuard, PacketGuardConfig};
pub use limiter::{
    AdmissionConfig, AdmissionControl, AdmissionError, Decision, RejectReason, Snapshot,
    sweep_task,
};
