//! # Node-Map Runtime
//!
//! Wires the service together: the UDP intake, admission control, the
//! validation pipeline, the network state engine, the event bus, and the
//! background maintenance tasks.
//!
//! ## Data flow
//!
//! ```text
//! UDP socket ──→ admission ──→ pipeline ──→ network state
//!                   │              │             │
//!                   ↓              ↓             ↓
//!             SourceThrottled  DatagramRejected  DatagramAccepted
//!                   └──────────────┴─────────────┘
//!                                  │
//!                              Event Bus ──→ subscribers
//! ```
//!
//! ## Background tasks
//!
//! - Limiter sweep: purges idle admission buckets once a minute.
//! - Persistence flush: drains dirty topology entities into the store.
//!
//! Both are raced against a watch-channel shutdown signal.

pub mod apply;
pub mod config;
pub mod intake;
pub mod persistence;
pub mod ports;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use nm_ingress::limiter::DEFAULT_SWEEP_INTERVAL;
use nm_ingress::AdmissionControl;
use nm_netstate::NetworkState;
use shared_bus::{EventPublisher, InMemoryEventBus};
use tracing::{error, info};

pub use config::{ConfigError, NodeConfig};

use crate::intake::Intake;
use crate::ports::{LoggingStore, TopologyStore};

/// The assembled service.
pub struct NodeRuntime {
    config: NodeConfig,
    admission: Arc<AdmissionControl>,
    state: Arc<NetworkState>,
    bus: Arc<InMemoryEventBus>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

impl NodeRuntime {
    /// Build the runtime from configuration. Fails only when no admission
    /// policy can be established.
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        let admission = Arc::new(config.admission()?);
        let state = Arc::new(NetworkState::new(config.topology()));
        let bus = Arc::new(InMemoryEventBus::new());
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Ok(Self {
            config,
            admission,
            state,
            bus,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Bind the socket and spawn the intake and maintenance tasks.
    pub async fn start(&self) -> Result<()> {
        info!("===========================================");
        info!("  Node-Map Runtime v0.1.0");
        info!("===========================================");

        let intake = Intake::bind(
            &self.config.udp.bind,
            Arc::clone(&self.admission),
            Arc::clone(&self.state),
            Arc::clone(&self.bus) as Arc<dyn EventPublisher>,
        )
        .await?;

        let mut intake_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = intake.run() => {}
                _ = intake_shutdown.changed() => {
                    info!("[intake] Shutdown signal received");
                }
            }
        });

        let sweep_control = Arc::clone(&self.admission);
        let mut sweep_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = nm_ingress::sweep_task(sweep_control, DEFAULT_SWEEP_INTERVAL) => {}
                _ = sweep_shutdown.changed() => {
                    info!("[sweep] Shutdown signal received");
                }
            }
        });

        let store: Arc<dyn TopologyStore> = Arc::new(LoggingStore);
        let flush_state = Arc::clone(&self.state);
        let flush_store = Arc::clone(&store);
        let flush_interval = Duration::from_secs(self.config.persistence.flush_secs);
        let mut flush_shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = persistence::flush_task(
                    Arc::clone(&flush_state),
                    Arc::clone(&flush_store),
                    flush_interval,
                ) => {}
                _ = flush_shutdown.changed() => {
                    info!("[flush] Shutdown signal received, final flush");
                    persistence::flush_once(&flush_state, flush_store.as_ref()).await;
                }
            }
        });

        info!(bind = %self.config.udp.bind, "Service started");
        Ok(())
    }

    /// Signal every task to stop and give them a moment to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("Shutdown complete");
    }

    /// The live network state, for query surfaces and tests.
    #[must_use]
    pub fn state(&self) -> Arc<NetworkState> {
        Arc::clone(&self.state)
    }

    /// The event bus, for attaching subscribers.
    #[must_use]
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    /// The admission controller, for observability surfaces.
    #[must_use]
    pub fn admission(&self) -> Arc<AdmissionControl> {
        Arc::clone(&self.admission)
    }
}
