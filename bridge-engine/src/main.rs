//! Bridge Engine Service
//!
//! Starts one engine per configured bridge and serves the REST API until
//! Ctrl-C, then stops every bridge.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin bridge-engine -- --config config/bridge.toml
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! BRIDGE_CONFIG_PATH=config/bridge.toml cargo run --bin bridge-engine
//! ```

use std::sync::Arc;

use anyhow::Result;
use bridge_engine::api::ApiServer;
use bridge_engine::config::{Config, CONFIG_PATH_ENV};
use bridge_engine::registry::{AdapterTable, BridgeRegistry};
use bridge_engine::storage::InMemoryTransferStore;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bridge-engine")]
#[command(about = "Cross-chain bridge engine - locks, attests and releases transfers")]
struct Args {
    /// Path to the configuration file (default: config/bridge.toml or BRIDGE_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Bridge Engine");

    // Priority: CLI arg > env var > default
    let config = match args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Config::load_from_path(&path)?
        }
        None => {
            if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
                info!("Loading configuration from {}: {}", CONFIG_PATH_ENV, path);
            } else {
                info!("Loading configuration from default location");
            }
            Config::load()?
        }
    };
    info!(
        "Configuration loaded: {} networks, {} bridges",
        config.networks.len(),
        config.bridges.len()
    );

    let store = Arc::new(InMemoryTransferStore::new());
    let registry = Arc::new(BridgeRegistry::new(
        &config,
        store,
        AdapterTable::with_default_networks(),
    ));

    if let Err(e) = registry.create_bridges(&config.bridges).await {
        error!("Startup aborted: {}", e);
        registry.shutdown_all().await;
        return Err(e.into());
    }

    let server = ApiServer::new(config.api.clone(), registry.clone());
    let result = server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            info!("Shutdown signal received");
        })
        .await;

    registry.shutdown_all().await;
    result
}
