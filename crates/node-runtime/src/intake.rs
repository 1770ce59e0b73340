//! # UDP Intake
//!
//! The receive loop: one datagram in, one admission decision, one pipeline
//! pass, one event out. The loop never terminates on its own; the runtime
//! races it against the shutdown signal.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use nm_ingress::AdmissionControl;
use nm_netstate::NetworkState;
use nm_validation::validate;
use shared_bus::{EventPublisher, TelemetryEvent};
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::apply;

/// Upper bound on one telemetry datagram. Real payloads are a few hundred
/// bytes; anything beyond this is truncated by the kernel and will fail
/// JSON parsing.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// The bound telemetry listener.
pub struct Intake {
    socket: UdpSocket,
    admission: Arc<AdmissionControl>,
    state: Arc<NetworkState>,
    bus: Arc<dyn EventPublisher>,
}

impl Intake {
    /// Bind the listener socket.
    pub async fn bind(
        bind: &str,
        admission: Arc<AdmissionControl>,
        state: Arc<NetworkState>,
        bus: Arc<dyn EventPublisher>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(bind)
            .await
            .with_context(|| format!("Failed to bind UDP listener on {bind}"))?;
        info!(addr = %socket.local_addr()?, "Telemetry listener bound");
        Ok(Self {
            socket,
            admission,
            state,
            bus,
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and process datagrams forever.
    pub async fn run(self) {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, source)) => self.handle(&buf[..len], source).await,
                Err(e) => warn!(error = %e, "UDP receive failed"),
            }
        }
    }

    async fn handle(&self, raw: &[u8], source: SocketAddr) {
        let decision = self.admission.check(source.ip());
        if !decision.allowed {
            debug!(source = %source, reason = ?decision.reason, "Datagram refused at admission");
            if let Some(event) = TelemetryEvent::throttled(source, &decision) {
                self.bus.publish(event).await;
            }
            return;
        }

        let mut outcome = validate(raw);
        if outcome.valid {
            if let Some(datagram) = outcome.datagram.take() {
                apply::apply(&self.state, &datagram, Utc::now().timestamp());
                let kind = datagram.kind();
                self.bus
                    .publish(TelemetryEvent::DatagramAccepted {
                        source,
                        kind,
                        datagram,
                    })
                    .await;
                return;
            }
        }

        debug!(source = %source, stage = %outcome.stage, "Datagram rejected by pipeline");
        self.bus
            .publish(TelemetryEvent::DatagramRejected { source, outcome })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nm_ingress::{AdmissionConfig, RejectReason};
    use nm_validation::Stage;
    use shared_bus::{EventFilter, InMemoryEventBus};
    use shared_types::DatagramKind;

    async fn intake_with_bus(
        admission: AdmissionConfig,
    ) -> (Intake, Arc<InMemoryEventBus>, Arc<NetworkState>) {
        let bus = Arc::new(InMemoryEventBus::new());
        let state = Arc::new(NetworkState::default());
        let intake = Intake::bind(
            "127.0.0.1:0",
            Arc::new(AdmissionControl::new(admission).unwrap()),
            Arc::clone(&state),
            bus.clone() as Arc<dyn EventPublisher>,
        )
        .await
        .unwrap();
        (intake, bus, state)
    }

    fn source() -> SocketAddr {
        "203.0.113.9:4444".parse().unwrap()
    }

    #[tokio::test]
    async fn test_valid_datagram_applies_and_publishes_accepted() {
        let (intake, bus, state) = intake_with_bus(AdmissionConfig::default()).await;
        let mut sub = bus.subscribe(EventFilter::all());

        intake
            .handle(br#"{"type":"NodeUp","node":"G8PZT"}"#, source())
            .await;

        assert_eq!(state.node_count(), 1);
        let event = sub.try_recv().unwrap().unwrap();
        let TelemetryEvent::DatagramAccepted { kind, .. } = event else {
            panic!("expected DatagramAccepted");
        };
        assert_eq!(kind, DatagramKind::NodeUp);
    }

    #[tokio::test]
    async fn test_invalid_datagram_publishes_rejected() {
        let (intake, bus, state) = intake_with_bus(AdmissionConfig::default()).await;
        let mut sub = bus.subscribe(EventFilter::all());

        intake.handle(b"{\"type\": \"NodeUp\"", source()).await;

        assert_eq!(state.node_count(), 0);
        let event = sub.try_recv().unwrap().unwrap();
        let TelemetryEvent::DatagramRejected { outcome, .. } = event else {
            panic!("expected DatagramRejected");
        };
        assert_eq!(outcome.stage, Stage::JsonParsing);
    }

    #[tokio::test]
    async fn test_blacklisted_source_publishes_throttled() {
        let config = AdmissionConfig {
            blacklist: vec!["203.0.113.0/24".to_string()],
            ..Default::default()
        };
        let (intake, bus, state) = intake_with_bus(config).await;
        let mut sub = bus.subscribe(EventFilter::all());

        intake
            .handle(br#"{"type":"NodeUp","node":"G8PZT"}"#, source())
            .await;

        // Refused before parsing; no state change.
        assert_eq!(state.node_count(), 0);
        let event = sub.try_recv().unwrap().unwrap();
        let TelemetryEvent::SourceThrottled { reason, .. } = event else {
            panic!("expected SourceThrottled");
        };
        assert_eq!(reason, RejectReason::Blacklist);
    }
}
