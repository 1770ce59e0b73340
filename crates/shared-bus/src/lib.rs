//! # Shared Bus - Event Fan-Out for Ingestion Outcomes
//!
//! Every datagram that reaches the service produces exactly one event on
//! this bus: accepted, rejected, or throttled. Consumers subscribe with a
//! topic filter and react independently of the intake path.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  UDP Intake  │                    │  Consumers   │
//! │              │    publish()       │ (persistence,│
//! │              │ ──────┐            │  dashboards) │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │          │
//!                  │              │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! The in-memory bus is lossy under sustained backpressure: a lagged
//! subscriber skips overwritten events rather than stalling the intake.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventTopic, TelemetryEvent};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before older ones are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
