//! End-to-end ingestion over a real UDP socket: send datagrams, watch the
//! bus, inspect the resulting topology.

use std::sync::Arc;
use std::time::Duration;

use nm_ingress::{AdmissionConfig, AdmissionControl};
use nm_netstate::{ConnectionStatus, NetworkState};
use node_runtime::intake::Intake;
use shared_bus::{EventFilter, EventPublisher, InMemoryEventBus, TelemetryEvent};
use shared_types::DatagramKind;
use tokio::net::UdpSocket;
use tokio::time::timeout;

async fn start_intake() -> (std::net::SocketAddr, Arc<InMemoryEventBus>, Arc<NetworkState>) {
    let bus = Arc::new(InMemoryEventBus::new());
    let state = Arc::new(NetworkState::default());
    let admission = Arc::new(AdmissionControl::new(AdmissionConfig::default()).unwrap());

    let intake = Intake::bind(
        "127.0.0.1:0",
        admission,
        Arc::clone(&state),
        Arc::clone(&bus) as Arc<dyn EventPublisher>,
    )
    .await
    .unwrap();
    let addr = intake.local_addr().unwrap();
    tokio::spawn(intake.run());

    (addr, bus, state)
}

#[tokio::test]
async fn link_status_over_the_wire_builds_topology() {
    let (addr, bus, state) = start_intake().await;
    let mut sub = bus.subscribe(EventFilter::all());

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(
            br#"{"type":"LinkUp","node":"G8PZT-1","peer":"GB7BBS-2","direction":"outgoing"}"#,
            addr,
        )
        .await
        .unwrap();

    let event = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timeout")
        .expect("event");
    let TelemetryEvent::DatagramAccepted { kind, .. } = event else {
        panic!("expected DatagramAccepted");
    };
    assert_eq!(kind, DatagramKind::LinkUp);

    assert_eq!(state.node_count(), 1);
    assert_eq!(state.link_count(), 1);
    let links = state.links_for("GB7BBS-2");
    let link = links[0].read();
    assert_eq!(link.key(), "G8PZT-1<->GB7BBS-2");
    assert_eq!(link.status(), ConnectionStatus::Active);
}

#[tokio::test]
async fn malformed_payload_is_rejected_not_dropped() {
    let (addr, bus, state) = start_intake().await;
    let mut sub = bus.subscribe(EventFilter::all());

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.send_to(b"\x00\x01binary junk", addr).await.unwrap();

    let event = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("timeout")
        .expect("event");
    assert!(matches!(event, TelemetryEvent::DatagramRejected { .. }));
    assert_eq!(state.node_count(), 0);
}

#[tokio::test]
async fn both_sides_of_a_link_converge() {
    let (addr, bus, state) = start_intake().await;
    let mut sub = bus.subscribe(EventFilter::all());

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender
        .send_to(
            br#"{"type":"LinkUp","node":"G8PZT-1","peer":"GB7BBS-2"}"#,
            addr,
        )
        .await
        .unwrap();
    sender
        .send_to(
            br#"{"type":"LinkUp","node":"gb7bbs-2","peer":"g8pzt-1"}"#,
            addr,
        )
        .await
        .unwrap();

    for _ in 0..2 {
        timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
    }
    assert_eq!(state.link_count(), 1);
}
