//! # Node-Map Service Entry Point
//!
//! Startup sequence:
//!
//! 1. Initialize logging (`RUST_LOG` controls verbosity, default `info`)
//! 2. Load configuration (first CLI argument, `NODEMAP_CONFIG`, or
//!    `nodemap.toml`; a missing file means defaults)
//! 3. Build and start the runtime
//! 4. Wait for Ctrl+C, then shut down gracefully

use std::path::Path;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use node_runtime::{NodeConfig, NodeRuntime};

fn config_path() -> String {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("NODEMAP_CONFIG").ok())
        .unwrap_or_else(|| "nodemap.toml".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = config_path();
    let config = NodeConfig::load(Path::new(&path))?;

    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Service is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
