//! # Telemetry Events
//!
//! Defines the events that flow through the shared bus: one per ingestion
//! outcome. Downstream consumers (persistence, dashboards, alerting) react
//! to these instead of calling into the intake path directly.

use std::net::SocketAddr;

use nm_ingress::{Decision, RejectReason};
use nm_validation::Outcome;
use serde::Serialize;
use shared_types::{Datagram, DatagramKind};

/// All events that can be published to the bus.
///
/// Events are serializable so bridge consumers can forward them verbatim
/// to external transports.
#[derive(Debug, Clone, Serialize)]
pub enum TelemetryEvent {
    /// A datagram passed admission and every pipeline stage, and was
    /// applied to the network state.
    DatagramAccepted {
        source: SocketAddr,
        kind: DatagramKind,
        datagram: Datagram,
    },

    /// A datagram passed admission but failed the pipeline. Carries the
    /// full staged outcome for diagnostics.
    DatagramRejected {
        source: SocketAddr,
        outcome: Outcome,
    },

    /// A source was refused at admission. The payload was never parsed.
    SourceThrottled {
        source: SocketAddr,
        reason: RejectReason,
        burst_rate: u32,
        average_rate: f64,
        burst_limit: u32,
        sustained_limit: u32,
    },
}

impl TelemetryEvent {
    /// Build a `SourceThrottled` event from a rejecting admission decision.
    /// Returns `None` for an allowing decision.
    #[must_use]
    pub fn throttled(source: SocketAddr, decision: &Decision) -> Option<Self> {
        let reason = decision.reason?;
        Some(Self::SourceThrottled {
            source,
            reason,
            burst_rate: decision.burst_rate,
            average_rate: decision.average_rate,
            burst_limit: decision.burst_limit,
            sustained_limit: decision.sustained_limit,
        })
    }

    /// The topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::DatagramAccepted { .. } => EventTopic::Accepted,
            Self::DatagramRejected { .. } => EventTopic::Rejected,
            Self::SourceThrottled { .. } => EventTopic::Throttled,
        }
    }

    /// The source address the event concerns.
    #[must_use]
    pub fn source(&self) -> SocketAddr {
        match self {
            Self::DatagramAccepted { source, .. }
            | Self::DatagramRejected { source, .. }
            | Self::SourceThrottled { source, .. } => *source,
        }
    }
}

/// Coarse event categories for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventTopic {
    Accepted,
    Rejected,
    Throttled,
}

/// Filter describing which events a subscriber wants.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Topics to receive. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl EventFilter {
    /// A filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self { topics: Vec::new() }
    }

    /// A filter restricted to the given topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self { topics }
    }

    /// Whether `event` passes this filter.
    #[must_use]
    pub fn matches(&self, event: &TelemetryEvent) -> bool {
        self.topics.is_empty() || self.topics.contains(&event.topic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nm_validation::validate;

    fn source() -> SocketAddr {
        "203.0.113.7:8765".parse().unwrap()
    }

    #[test]
    fn test_topic_mapping() {
        let outcome = validate(b"not json");
        let event = TelemetryEvent::DatagramRejected {
            source: source(),
            outcome,
        };
        assert_eq!(event.topic(), EventTopic::Rejected);
        assert_eq!(event.source(), source());
    }

    #[test]
    fn test_throttled_from_allowing_decision_is_none() {
        let decision = Decision {
            allowed: true,
            reason: None,
            burst_rate: 1,
            average_rate: 0.1,
            burst_limit: 30,
            sustained_limit: 10,
        };
        assert!(TelemetryEvent::throttled(source(), &decision).is_none());
    }

    #[test]
    fn test_throttled_carries_decision_rates() {
        let decision = Decision {
            allowed: false,
            reason: Some(RejectReason::BurstLimit),
            burst_rate: 31,
            average_rate: 3.1,
            burst_limit: 30,
            sustained_limit: 10,
        };
        let event = TelemetryEvent::throttled(source(), &decision).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["SourceThrottled"]["reason"], "burst_limit");
        assert_eq!(json["SourceThrottled"]["burst_rate"], 31);
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let outcome = validate(b"{}");
        let event = TelemetryEvent::DatagramRejected {
            source: source(),
            outcome,
        };
        assert!(EventFilter::all().matches(&event));
        assert!(EventFilter::topics(vec![EventTopic::Rejected]).matches(&event));
        assert!(!EventFilter::topics(vec![EventTopic::Accepted]).matches(&event));
    }
}
