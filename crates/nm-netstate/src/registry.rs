//! # Network State Registry
//!
//! `NetworkState` owns the three entity registries and every topology
//! query. All operations are concurrent-safe; `get_or_create_*` is atomic
//! per key, so two tasks racing on the same address receive the identical
//! `Arc` handle.
//!
//! Identity rules:
//! - Nodes are keyed by their uppercased address.
//! - Links and circuits are keyed by [`canonical_key`], which makes the
//!   connection undirected: `(a, b)` and `(b, a)` resolve to one entity.
//!
//! Timestamps are injected by the caller (epoch seconds) so the registry
//! stays deterministic under test.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use shared_types::address;
use tracing::debug;

use crate::entities::{ConnectionState, ConnectionStatus, NodeState};

/// Shared handle to a node entity.
pub type NodeHandle = Arc<RwLock<NodeState>>;
/// Shared handle to a link or circuit entity.
pub type ConnectionHandle = Arc<RwLock<ConnectionState>>;

/// Canonical undirected identity for a connection between two endpoints:
/// uppercase both, sort, join with `<->`.
#[must_use]
pub fn canonical_key(a: &str, b: &str) -> String {
    let a = a.to_uppercase();
    let b = b.to_uppercase();
    if a <= b {
        format!("{a}<->{b}")
    } else {
        format!("{b}<->{a}")
    }
}

/// Visibility and test-traffic policy for topology queries.
#[derive(Debug, Clone)]
pub struct TopologyConfig {
    /// Base identifiers whose nodes are excluded from base queries.
    pub hidden_addresses: Vec<String>,
    /// Base identifier reserved for test stations.
    pub test_marker: String,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            hidden_addresses: Vec::new(),
            test_marker: "TEST".to_string(),
        }
    }
}

/// The live topology model.
pub struct NetworkState {
    nodes: DashMap<String, NodeHandle>,
    links: DashMap<String, ConnectionHandle>,
    circuits: DashMap<String, ConnectionHandle>,
    config: TopologyConfig,
}

impl NetworkState {
    #[must_use]
    pub fn new(config: TopologyConfig) -> Self {
        Self {
            nodes: DashMap::new(),
            links: DashMap::new(),
            circuits: DashMap::new(),
            config,
        }
    }

    // =========================================================================
    // Get-or-create
    // =========================================================================

    /// Resolve the node for `addr`, creating it on first observation.
    pub fn get_or_create_node(&self, addr: &str, now: i64) -> NodeHandle {
        let key = addr.to_uppercase();
        self.nodes
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(address = %key, "New node observed");
                Arc::new(RwLock::new(NodeState::new(key.clone(), now)))
            })
            .clone()
    }

    /// Resolve the link between `a` and `b` regardless of endpoint order.
    pub fn get_or_create_link(&self, a: &str, b: &str, now: i64) -> ConnectionHandle {
        Self::get_or_create_connection(&self.links, "link", a, b, now)
    }

    /// Resolve the circuit between `a` and `b` regardless of endpoint order.
    pub fn get_or_create_circuit(&self, a: &str, b: &str, now: i64) -> ConnectionHandle {
        Self::get_or_create_connection(&self.circuits, "circuit", a, b, now)
    }

    fn get_or_create_connection(
        registry: &DashMap<String, ConnectionHandle>,
        kind: &str,
        a: &str,
        b: &str,
        now: i64,
    ) -> ConnectionHandle {
        let key = canonical_key(a, b);
        registry
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, "New {kind} observed");
                let mut e1 = a.to_uppercase();
                let mut e2 = b.to_uppercase();
                if e1 > e2 {
                    std::mem::swap(&mut e1, &mut e2);
                }
                Arc::new(RwLock::new(ConnectionState::new(key.clone(), e1, e2, now)))
            })
            .clone()
    }

    // =========================================================================
    // Listings
    // =========================================================================

    #[must_use]
    pub fn nodes(&self) -> Vec<NodeHandle> {
        self.nodes.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn links(&self) -> Vec<ConnectionHandle> {
        self.links.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn circuits(&self) -> Vec<ConnectionHandle> {
        self.circuits.iter().map(|e| e.value().clone()).collect()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }

    // =========================================================================
    // Per-address queries
    // =========================================================================

    /// Links whose either endpoint contains `addr` (case-insensitive).
    #[must_use]
    pub fn links_for(&self, addr: &str) -> Vec<ConnectionHandle> {
        Self::connections_matching(&self.links, addr)
    }

    /// Circuits whose either endpoint contains `addr` (case-insensitive).
    #[must_use]
    pub fn circuits_for(&self, addr: &str) -> Vec<ConnectionHandle> {
        Self::connections_matching(&self.circuits, addr)
    }

    fn connections_matching(
        registry: &DashMap<String, ConnectionHandle>,
        addr: &str,
    ) -> Vec<ConnectionHandle> {
        // Endpoints are stored uppercased, so one uppercase of the needle
        // makes the substring match case-insensitive.
        let needle = addr.to_uppercase();
        registry
            .iter()
            .filter(|e| {
                let conn = e.value().read();
                conn.endpoint1().contains(&needle) || conn.endpoint2().contains(&needle)
            })
            .map(|e| e.value().clone())
            .collect()
    }

    /// Nodes whose base identifier equals `base` (case-insensitive), the
    /// hidden list applied.
    #[must_use]
    pub fn nodes_with_base(&self, base: &str) -> Vec<NodeHandle> {
        if self.is_hidden_base(base) {
            return Vec::new();
        }
        self.nodes
            .iter()
            .filter(|e| address::eq_ignore_case(address::base(e.key()), base))
            .map(|e| e.value().clone())
            .collect()
    }

    // =========================================================================
    // Base-level derived queries
    // =========================================================================

    /// Union of the per-address link query across `base` itself and every
    /// known node sharing that base, deduplicated by canonical key.
    /// Test-station endpoints are excluded unless `base` is itself the
    /// test marker; results are ordered active-first then most recently
    /// updated.
    #[must_use]
    pub fn links_for_base(&self, base: &str) -> Vec<ConnectionHandle> {
        self.connections_for_base(&self.links, base)
    }

    /// Circuit counterpart of [`links_for_base`](Self::links_for_base).
    #[must_use]
    pub fn circuits_for_base(&self, base: &str) -> Vec<ConnectionHandle> {
        self.connections_for_base(&self.circuits, base)
    }

    fn connections_for_base(
        &self,
        registry: &DashMap<String, ConnectionHandle>,
        base: &str,
    ) -> Vec<ConnectionHandle> {
        if self.is_hidden_base(base) {
            return Vec::new();
        }
        let include_test = address::eq_ignore_case(base, &self.config.test_marker);

        // The bare base is a valid address of the station in its own right,
        // so it joins the known SSID variants as a query needle. Connection
        // endpoints may be compound (`STATION:ID`, `USER@STATION:PORT`), so
        // the substring match is what reaches them.
        let mut needles: Vec<String> = vec![base.to_uppercase()];
        for node in self.nodes_with_base(base) {
            needles.push(node.read().address().to_string());
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut matched: Vec<(ConnectionStatus, i64, ConnectionHandle)> = Vec::new();

        for needle in &needles {
            for handle in Self::connections_matching(registry, needle) {
                let conn = handle.read();
                if !seen.insert(conn.key().to_string()) {
                    continue;
                }
                if !include_test
                    && (self.is_test_address(conn.endpoint1())
                        || self.is_test_address(conn.endpoint2()))
                {
                    continue;
                }
                matched.push((conn.status(), conn.last_update(), handle.clone()));
            }
        }

        matched.sort_by(|a, b| {
            let rank = |s: ConnectionStatus| match s {
                ConnectionStatus::Active => 0,
                ConnectionStatus::Disconnected => 1,
            };
            rank(a.0).cmp(&rank(b.0)).then(b.1.cmp(&a.1))
        });
        matched.into_iter().map(|(_, _, handle)| handle).collect()
    }

    // =========================================================================
    // Address policy
    // =========================================================================

    /// An address is a test address when its base equals the configured
    /// test marker and its SSID, if present, is in 0..=15.
    #[must_use]
    pub fn is_test_address(&self, addr: &str) -> bool {
        if !address::eq_ignore_case(address::base(addr), &self.config.test_marker) {
            return false;
        }
        match address::ssid(addr) {
            Some(ssid) => ssid <= 15,
            None => true,
        }
    }

    /// Hidden matching is base-only: `M2` hides `M2` and `M2-5`, never
    /// `M20` or `M2ABC`.
    #[must_use]
    pub fn is_hidden_address(&self, addr: &str) -> bool {
        self.is_hidden_base(address::base(addr))
    }

    fn is_hidden_base(&self, base: &str) -> bool {
        self.config
            .hidden_addresses
            .iter()
            .any(|hidden| address::eq_ignore_case(hidden, base))
    }

    // =========================================================================
    // Dirty tracking
    // =========================================================================

    #[must_use]
    pub fn dirty_nodes(&self) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .filter(|e| e.value().read().is_dirty())
            .map(|e| e.value().clone())
            .collect()
    }

    #[must_use]
    pub fn dirty_links(&self) -> Vec<ConnectionHandle> {
        Self::dirty_connections(&self.links)
    }

    #[must_use]
    pub fn dirty_circuits(&self) -> Vec<ConnectionHandle> {
        Self::dirty_connections(&self.circuits)
    }

    fn dirty_connections(registry: &DashMap<String, ConnectionHandle>) -> Vec<ConnectionHandle> {
        registry
            .iter()
            .filter(|e| e.value().read().is_dirty())
            .map(|e| e.value().clone())
            .collect()
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(TopologyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Direction, TrafficCounters};
    use proptest::prelude::*;

    fn state() -> NetworkState {
        NetworkState::default()
    }

    #[test]
    fn test_canonical_key_uppercases_and_sorts() {
        assert_eq!(canonical_key("g8pzt-1", "GB7BBS"), "G8PZT-1<->GB7BBS");
        assert_eq!(canonical_key("GB7BBS", "g8pzt-1"), "G8PZT-1<->GB7BBS");
        assert_eq!(canonical_key("A", "A"), "A<->A");
    }

    #[test]
    fn test_order_swapped_endpoints_share_one_entity() {
        let state = state();
        let first = state.get_or_create_link("g8pzt-1", "GB7BBS-2", 100);
        let second = state.get_or_create_link("gb7bbs-2", "G8PZT-1", 200);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(state.link_count(), 1);
        // First observation wins the creation timestamp.
        assert_eq!(first.read().connected_at(), 100);
    }

    #[test]
    fn test_links_and_circuits_are_separate_registries() {
        let state = state();
        let link = state.get_or_create_link("A", "B", 100);
        let circuit = state.get_or_create_circuit("A", "B", 100);
        assert!(!Arc::ptr_eq(&link, &circuit));
        assert_eq!(link.read().key(), circuit.read().key());
    }

    #[test]
    fn test_node_keyed_case_insensitively() {
        let state = state();
        let a = state.get_or_create_node("g8pzt", 100);
        let b = state.get_or_create_node("G8PZT", 200);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.read().address(), "G8PZT");
        assert_eq!(state.node_count(), 1);
    }

    #[test]
    fn test_dirty_lifecycle() {
        let state = state();
        let node = state.get_or_create_node("G8PZT", 100);
        assert_eq!(state.dirty_nodes().len(), 1);

        node.write().mark_clean();
        assert!(state.dirty_nodes().is_empty());

        node.write().apply(crate::entities::NodeUpdate::default(), 200);
        assert_eq!(state.dirty_nodes().len(), 1);
    }

    #[test]
    fn test_substring_query_matches_either_endpoint() {
        let state = state();
        state.get_or_create_link("G8PZT-1", "GB7BBS-2", 100);
        state.get_or_create_link("M0AAA", "M1BBB", 100);

        assert_eq!(state.links_for("gb7bbs").len(), 1);
        assert_eq!(state.links_for("G8PZT-1").len(), 1);
        assert_eq!(state.links_for("bbb").len(), 1);
        assert!(state.links_for("W1AW").is_empty());
    }

    #[test]
    fn test_test_address_marker_and_ssid_window() {
        let state = state();
        assert!(state.is_test_address("TEST"));
        assert!(state.is_test_address("test-0"));
        assert!(state.is_test_address("TEST-15"));
        assert!(!state.is_test_address("TEST-16"));
        assert!(!state.is_test_address("TESTER"));
        assert!(!state.is_test_address("G8PZT"));
    }

    #[test]
    fn test_hidden_matching_is_base_only() {
        let state = NetworkState::new(TopologyConfig {
            hidden_addresses: vec!["M2".to_string()],
            ..Default::default()
        });
        assert!(state.is_hidden_address("M2"));
        assert!(state.is_hidden_address("m2-5"));
        assert!(!state.is_hidden_address("M20"));
        assert!(!state.is_hidden_address("M2ABC"));
    }

    #[test]
    fn test_hidden_base_empties_base_queries() {
        let state = NetworkState::new(TopologyConfig {
            hidden_addresses: vec!["M2".to_string()],
            ..Default::default()
        });
        state.get_or_create_node("M2-5", 100);
        state.get_or_create_link("M2-5", "G8PZT", 100);

        assert!(state.nodes_with_base("m2").is_empty());
        assert!(state.links_for_base("M2").is_empty());
        // The other end still sees the link.
        assert_eq!(state.links_for_base("G8PZT").len(), 1);
    }

    #[test]
    fn test_base_query_unions_ssids_and_orders() {
        let state = state();
        let active = state.get_or_create_link("G8PZT-1", "GB7BBS", 100);
        active.write().touch(300);

        let stale = state.get_or_create_link("G8PZT-4", "M0AAA", 100);
        stale.write().touch(500);
        stale
            .write()
            .set_status(ConnectionStatus::Disconnected, 600);

        let recent = state.get_or_create_link("G8PZT", "M1BBB", 100);
        recent.write().record_traffic(
            Direction::Outgoing,
            TrafficCounters::default(),
            400,
        );

        let results = state.links_for_base("g8pzt");
        assert_eq!(results.len(), 3);
        // Active first, most recently updated leading.
        assert_eq!(results[0].read().key(), "G8PZT<->M1BBB");
        assert_eq!(results[1].read().key(), "G8PZT-1<->GB7BBS");
        assert_eq!(results[2].read().key(), "G8PZT-4<->M0AAA");
    }

    #[test]
    fn test_base_query_reaches_compound_circuit_endpoints() {
        let state = state();
        // A circuit as reported on the wire: the reporting node is an SSID
        // variant, the endpoints are compound forms.
        state.get_or_create_node("G8PZT-1", 100);
        state.get_or_create_circuit("G8PZT-4:0001", "G8PZT@G8PZT:14c0", 100);

        assert_eq!(state.circuits_for("G8PZT").len(), 1);
        let results = state.circuits_for_base("g8pzt");
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].read().key(),
            "G8PZT-4:0001<->G8PZT@G8PZT:14C0"
        );
        assert!(state.circuits_for_base("GB7BBS").is_empty());
    }

    #[test]
    fn test_base_query_excludes_test_endpoints() {
        let state = state();
        state.get_or_create_link("G8PZT-1", "TEST-2", 100);
        state.get_or_create_link("G8PZT-1", "GB7BBS", 100);

        assert_eq!(state.links_for_base("G8PZT").len(), 1);
        // The test base itself sees its own connections.
        assert_eq!(state.links_for_base("TEST").len(), 1);
        // SSID 16 is outside the test window, so the endpoint is ordinary.
        state.get_or_create_link("M0AAA", "TEST-16", 100);
        assert_eq!(state.links_for_base("M0AAA").len(), 1);
    }

    proptest! {
        #[test]
        fn prop_canonical_key_is_commutative(
            a in "[A-Za-z0-9-]{1,12}",
            b in "[A-Za-z0-9-]{1,12}",
        ) {
            prop_assert_eq!(canonical_key(&a, &b), canonical_key(&b, &a));
        }

        #[test]
        fn prop_canonical_key_ignores_case(
            a in "[a-z0-9-]{1,12}",
            b in "[a-z0-9-]{1,12}",
        ) {
            prop_assert_eq!(
                canonical_key(&a, &b),
                canonical_key(&a.to_uppercase(), &b.to_uppercase())
            );
        }
    }
}
