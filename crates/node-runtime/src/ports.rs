//! # Persistence Port
//!
//! The runtime persists topology entities through this trait. The default
//! adapter only logs the writes; a database-backed adapter implements the
//! same three idempotent upserts.

use async_trait::async_trait;
use nm_netstate::{ConnectionState, NodeState};
use thiserror::Error;
use tracing::info;

/// Errors from the persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Idempotent upsert interface for topology entities.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn upsert_node(&self, node: &NodeState) -> Result<(), StoreError>;
    async fn upsert_link(&self, link: &ConnectionState) -> Result<(), StoreError>;
    async fn upsert_circuit(&self, circuit: &ConnectionState) -> Result<(), StoreError>;
}

/// Adapter that records every write to the log and nothing else. Stands in
/// for a real backend in single-process deployments.
#[derive(Debug, Default)]
pub struct LoggingStore;

#[async_trait]
impl TopologyStore for LoggingStore {
    async fn upsert_node(&self, node: &NodeState) -> Result<(), StoreError> {
        info!(
            address = node.address(),
            status = ?node.status(),
            last_seen = node.last_seen(),
            "Upsert node"
        );
        Ok(())
    }

    async fn upsert_link(&self, link: &ConnectionState) -> Result<(), StoreError> {
        info!(
            key = link.key(),
            status = ?link.status(),
            last_update = link.last_update(),
            "Upsert link"
        );
        Ok(())
    }

    async fn upsert_circuit(&self, circuit: &ConnectionState) -> Result<(), StoreError> {
        info!(
            key = circuit.key(),
            status = ?circuit.status(),
            last_update = circuit.last_update(),
            "Upsert circuit"
        );
        Ok(())
    }
}
