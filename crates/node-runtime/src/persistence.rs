//! # Dirty-Set Flushing
//!
//! Periodically drains the network state's dirty sets into the persistence
//! port. An entity is marked clean only after its upsert succeeds and its
//! revision still matches the written snapshot, so a failed write, or a
//! mutation that raced the write, stays dirty and is retried on the next
//! flush.

use std::sync::Arc;
use std::time::Duration;

use nm_netstate::NetworkState;
use tracing::{debug, warn};

use crate::ports::TopologyStore;

/// Counts from one flush pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub nodes: usize,
    pub links: usize,
    pub circuits: usize,
}

impl FlushStats {
    #[must_use]
    pub fn total(&self) -> usize {
        self.nodes + self.links + self.circuits
    }
}

/// Flush every dirty entity once. A pass with nothing dirty writes nothing.
pub async fn flush_once(state: &NetworkState, store: &dyn TopologyStore) -> FlushStats {
    let mut stats = FlushStats::default();

    for handle in state.dirty_nodes() {
        let snapshot = handle.read().clone();
        match store.upsert_node(&snapshot).await {
            Ok(()) => {
                // A mutation that landed while the write was in flight is
                // not covered by the snapshot; leave the entity dirty so
                // the next pass persists it.
                let mut node = handle.write();
                if node.revision() == snapshot.revision() {
                    node.mark_clean();
                }
                stats.nodes += 1;
            }
            Err(e) => warn!(address = snapshot.address(), error = %e, "Node flush failed"),
        }
    }

    for handle in state.dirty_links() {
        let snapshot = handle.read().clone();
        match store.upsert_link(&snapshot).await {
            Ok(()) => {
                let mut link = handle.write();
                if link.revision() == snapshot.revision() {
                    link.mark_clean();
                }
                stats.links += 1;
            }
            Err(e) => warn!(key = snapshot.key(), error = %e, "Link flush failed"),
        }
    }

    for handle in state.dirty_circuits() {
        let snapshot = handle.read().clone();
        match store.upsert_circuit(&snapshot).await {
            Ok(()) => {
                let mut circuit = handle.write();
                if circuit.revision() == snapshot.revision() {
                    circuit.mark_clean();
                }
                stats.circuits += 1;
            }
            Err(e) => warn!(key = snapshot.key(), error = %e, "Circuit flush failed"),
        }
    }

    if stats.total() > 0 {
        debug!(
            nodes = stats.nodes,
            links = stats.links,
            circuits = stats.circuits,
            "Flushed dirty entities"
        );
    }
    stats
}

/// Run [`flush_once`] forever on a fixed interval. Cancel by dropping the
/// future (the runtime wraps it in a shutdown select).
pub async fn flush_task(
    state: Arc<NetworkState>,
    store: Arc<dyn TopologyStore>,
    interval: Duration,
) {
    let mut flush_interval = tokio::time::interval(interval);
    flush_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The immediate first tick would flush creation noise; skip it.
    flush_interval.tick().await;

    loop {
        flush_interval.tick().await;
        flush_once(&state, store.as_ref()).await;
    }
}
