//! # Datagram Application
//!
//! Translates a validated datagram into network state mutations. This is
//! the only place ingestion writes to the topology model.
//!
//! Entity resolution is lazy: the first report mentioning a node, link, or
//! circuit creates it. Re-applying an identical datagram updates the same
//! entities and creates nothing new.

use chrono::Utc;
use nm_netstate::{
    ConnectionStatus, Direction, NetworkState, NodeStatus, NodeUpdate, TrafficCounters,
};
use shared_types::{CircuitEvent, Datagram, DatagramKind, LinkEvent, NodeEvent, TraceEvent};
use tracing::debug;

/// Apply one accepted datagram to the network state.
///
/// `now` is the fallback event time (epoch seconds) for payloads without a
/// usable `time` field.
pub fn apply(state: &NetworkState, datagram: &Datagram, now: i64) {
    // Validation already vetted the wire timestamp, so a failure here only
    // happens for kinds whose rules chose not to require one.
    let at = datagram
        .time()
        .and_then(|t| t.normalize().ok())
        .unwrap_or(now);

    match datagram {
        Datagram::NodeUp(e) => apply_node(state, e, Some(NodeStatus::Up), at),
        Datagram::NodeDown(e) => apply_node(state, e, Some(NodeStatus::Down), at),
        Datagram::NodeStatus(e) => apply_node(state, e, None, at),
        Datagram::LinkUp(e) => apply_link(state, DatagramKind::LinkUp, e, at),
        Datagram::LinkDown(e) => apply_link(state, DatagramKind::LinkDown, e, at),
        Datagram::LinkStatus(e) => apply_link(state, DatagramKind::LinkStatus, e, at),
        Datagram::CircuitUp(e) => apply_circuit(state, DatagramKind::CircuitUp, e, at),
        Datagram::CircuitDown(e) => apply_circuit(state, DatagramKind::CircuitDown, e, at),
        Datagram::CircuitStatus(e) => apply_circuit(state, DatagramKind::CircuitStatus, e, at),
        Datagram::L2Trace(e) => apply_trace(state, e, at),
    }
}

/// Convenience wrapper using the wall clock as fallback event time.
pub fn apply_now(state: &NetworkState, datagram: &Datagram) {
    apply(state, datagram, Utc::now().timestamp());
}

fn apply_node(state: &NetworkState, e: &NodeEvent, status: Option<NodeStatus>, at: i64) {
    // Validation requires `node`, so an absent one never reaches here.
    let Some(addr) = e.node.as_deref() else { return };
    let node = state.get_or_create_node(addr, at);
    node.write().apply(
        NodeUpdate {
            status,
            alias: e.alias.clone(),
            locator: e.locator.clone(),
            software: e.software.clone(),
            version: e.version.clone(),
            latitude: e.latitude,
            longitude: e.longitude,
        },
        at,
    );
}

fn apply_link(state: &NetworkState, kind: DatagramKind, e: &LinkEvent, at: i64) {
    let Some(reporter) = e.node.as_deref() else { return };
    touch_reporter(state, reporter, at);

    // Without a far end there is no link identity to resolve.
    let Some(peer) = e.peer.as_deref() else {
        debug!(node = %reporter, kind = %kind, "Link event without peer, node refresh only");
        return;
    };

    let link = state.get_or_create_link(reporter, peer, at);
    match kind {
        DatagramKind::LinkUp => link.write().set_status(ConnectionStatus::Active, at),
        DatagramKind::LinkDown => link.write().set_status(ConnectionStatus::Disconnected, at),
        _ => {
            let counters = TrafficCounters {
                sent: e.frames_sent.unwrap_or(0),
                rcvd: e.frames_rcvd.unwrap_or(0),
                resent: e.frames_resent.unwrap_or(0),
                queued: e.frames_queued.unwrap_or(0),
                bytes_sent: e.bytes_sent,
                bytes_rcvd: e.bytes_rcvd,
            };
            link.write().record_traffic(direction_of(e.direction.as_deref()), counters, at);
        }
    }
}

fn apply_circuit(state: &NetworkState, kind: DatagramKind, e: &CircuitEvent, at: i64) {
    let Some(reporter) = e.node.as_deref() else { return };
    touch_reporter(state, reporter, at);

    // The circuit is anchored on its own endpoint pair; the near end falls
    // back to the reporting node when `local` is absent.
    let Some(remote) = e.remote.as_deref() else {
        debug!(node = %reporter, kind = %kind, "Circuit event without remote, node refresh only");
        return;
    };
    let local = e.local.as_deref().unwrap_or(reporter);

    let circuit = state.get_or_create_circuit(local, remote, at);
    match kind {
        DatagramKind::CircuitUp => circuit.write().set_status(ConnectionStatus::Active, at),
        DatagramKind::CircuitDown => {
            circuit.write().set_status(ConnectionStatus::Disconnected, at);
        }
        _ => {
            let counters = TrafficCounters {
                sent: e.segs_sent.unwrap_or(0),
                rcvd: e.segs_rcvd.unwrap_or(0),
                resent: e.segs_resent.unwrap_or(0),
                queued: e.segs_queued.unwrap_or(0),
                bytes_sent: e.bytes_sent,
                bytes_rcvd: e.bytes_rcvd,
            };
            circuit
                .write()
                .record_traffic(direction_of(e.direction.as_deref()), counters, at);
        }
    }
}

fn apply_trace(state: &NetworkState, e: &TraceEvent, at: i64) {
    // A trace only proves the reporting node is alive and listening.
    if let Some(reporter) = e.node.as_deref() {
        touch_reporter(state, reporter, at);
    }
}

fn touch_reporter(state: &NetworkState, addr: &str, at: i64) {
    let node = state.get_or_create_node(addr, at);
    node.write().apply(NodeUpdate::default(), at);
}

/// Senders that omit the direction report their own transmit side.
fn direction_of(wire: Option<&str>) -> Direction {
    wire.and_then(Direction::from_wire)
        .unwrap_or(Direction::Outgoing)
}
