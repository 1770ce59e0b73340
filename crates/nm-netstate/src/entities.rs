//! # Topology Entities
//!
//! `NodeState` models one observed station; `ConnectionState` models one
//! undirected link or circuit between two endpoints. Links and circuits
//! carry the same attributes and differ only in which registry owns them,
//! so they share the struct.
//!
//! Fields are private on purpose: every mutation goes through a method
//! that also raises the dirty flag, which keeps the invariant "any
//! mutation implies dirty" enforceable by review and tests instead of
//! relying on callers to remember. `mark_clean` is reserved for the
//! persistence collaborator after a confirmed write.

use serde::Serialize;

/// Observed reachability of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Unknown,
    Up,
    Down,
}

/// Observed state of a link or circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Active,
    Disconnected,
}

/// Traffic direction from the reporting node's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

impl Direction {
    /// Map the wire `direction` value. Validation has already enforced the
    /// exact-case contract, so anything else is treated as absent.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "incoming" => Some(Direction::Incoming),
            "outgoing" => Some(Direction::Outgoing),
            _ => None,
        }
    }
}

/// One station, keyed case-insensitively by its address. Created on first
/// observation and never deleted; absence of further events simply stops
/// refreshing `last_seen`.
#[derive(Debug, Clone, Serialize)]
pub struct NodeState {
    address: String,
    status: NodeStatus,
    alias: Option<String>,
    locator: Option<String>,
    software: Option<String>,
    version: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    first_seen: i64,
    last_seen: i64,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    revision: u64,
}

/// Caller-driven field refresh for a node. Only `Some` fields are applied.
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub status: Option<NodeStatus>,
    pub alias: Option<String>,
    pub locator: Option<String>,
    pub software: Option<String>,
    pub version: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NodeState {
    pub(crate) fn new(address: String, now: i64) -> Self {
        Self {
            address,
            status: NodeStatus::Unknown,
            alias: None,
            locator: None,
            software: None,
            version: None,
            latitude: None,
            longitude: None,
            first_seen: now,
            last_seen: now,
            dirty: true,
            revision: 0,
        }
    }

    /// Apply an update and refresh `last_seen`. Always dirties the entity,
    /// even for a pure observation with no field changes: the refreshed
    /// `last_seen` itself is unpersisted state.
    pub fn apply(&mut self, update: NodeUpdate, now: i64) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.alias.is_some() {
            self.alias = update.alias;
        }
        if update.locator.is_some() {
            self.locator = update.locator;
        }
        if update.software.is_some() {
            self.software = update.software;
        }
        if update.version.is_some() {
            self.version = update.version;
        }
        if update.latitude.is_some() {
            self.latitude = update.latitude;
        }
        if update.longitude.is_some() {
            self.longitude = update.longitude;
        }
        self.last_seen = now;
        self.dirty = true;
        self.revision += 1;
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    #[must_use]
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    #[must_use]
    pub fn first_seen(&self) -> i64 {
        self.first_seen
    }

    #[must_use]
    pub fn last_seen(&self) -> i64 {
        self.last_seen
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every mutation. Persistence compares it against its
    /// snapshot before marking clean, so a mutation that lands mid-write
    /// keeps the entity dirty.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Persistence acknowledgement only.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}

/// Frame/segment counters for one traffic direction. Byte counters are
/// optional on the wire and stay optional here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrafficCounters {
    pub sent: i64,
    pub rcvd: i64,
    pub resent: i64,
    pub queued: i64,
    pub bytes_sent: Option<i64>,
    pub bytes_rcvd: Option<i64>,
}

/// One undirected link or circuit. Endpoints are stored sorted
/// (`endpoint1 <= endpoint2`, case-insensitively), matching the canonical
/// key, so the two observers of the same physical connection converge on
/// one entity no matter which order they report the ends in.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionState {
    key: String,
    endpoint1: String,
    endpoint2: String,
    status: ConnectionStatus,
    connected_at: i64,
    last_update: i64,
    incoming: TrafficCounters,
    outgoing: TrafficCounters,
    #[serde(skip)]
    dirty: bool,
    #[serde(skip)]
    revision: u64,
}

impl ConnectionState {
    pub(crate) fn new(key: String, endpoint1: String, endpoint2: String, now: i64) -> Self {
        Self {
            key,
            endpoint1,
            endpoint2,
            status: ConnectionStatus::Active,
            connected_at: now,
            last_update: now,
            incoming: TrafficCounters::default(),
            outgoing: TrafficCounters::default(),
            dirty: true,
            revision: 0,
        }
    }

    /// Transition status and refresh `last_update`.
    pub fn set_status(&mut self, status: ConnectionStatus, now: i64) {
        self.status = status;
        self.last_update = now;
        self.dirty = true;
        self.revision += 1;
    }

    /// Record the latest reported counters for one direction.
    pub fn record_traffic(&mut self, direction: Direction, counters: TrafficCounters, now: i64) {
        match direction {
            Direction::Incoming => self.incoming = counters,
            Direction::Outgoing => self.outgoing = counters,
        }
        self.last_update = now;
        self.dirty = true;
        self.revision += 1;
    }

    /// Refresh `last_update` without other changes (e.g. a status report
    /// carrying nothing new).
    pub fn touch(&mut self, now: i64) {
        self.last_update = now;
        self.dirty = true;
        self.revision += 1;
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn endpoint1(&self) -> &str {
        &self.endpoint1
    }

    #[must_use]
    pub fn endpoint2(&self) -> &str {
        &self.endpoint2
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    #[must_use]
    pub fn connected_at(&self) -> i64 {
        self.connected_at
    }

    #[must_use]
    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    #[must_use]
    pub fn counters(&self, direction: Direction) -> TrafficCounters {
        match direction {
            Direction::Incoming => self.incoming,
            Direction::Outgoing => self.outgoing,
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bumped on every mutation; see [`NodeState::revision`].
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Persistence acknowledgement only.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
