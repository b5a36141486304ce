//! # Cross-Chain Relay Node
//!
//! Runs one relay endpoint.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (`QC_RELAY_CONFIG` file, then env overrides)
//! 2. Initialize logging (`RUST_LOG` wins over `log_level`)
//! 3. Open the store (file-backed when `data_file` is set)
//! 4. Bind `listen_host:(available_port + 1)` and start serving
//! 5. Ping and sync headers with `peer_addr`, if configured
//! 6. Serve until Ctrl+C

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use qc_15_cross_chain_relay::{
    FileBackedKVStore, InMemoryKVStore, Initiator, KeyValueStore, ProtocolHandlers, RelayConfig,
    RelayContext, RelayServer,
};

/// Load configuration from file and environment.
fn load_config() -> Result<RelayConfig> {
    let mut config = match std::env::var("QC_RELAY_CONFIG") {
        Ok(path) => RelayConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path))?,
        Err(_) => RelayConfig::default(),
    };

    if let Ok(chain_id) = std::env::var("QC_RELAY_CHAIN_ID") {
        config.local_chain_id = chain_id;
    }
    if let Ok(port) = std::env::var("QC_RELAY_PORT") {
        config.available_port = port
            .parse()
            .with_context(|| format!("QC_RELAY_PORT is not a port: {}", port))?;
    }
    if let Ok(peer) = std::env::var("QC_RELAY_PEER") {
        config.peer_addr = Some(peer);
    }

    config.validate()?;
    Ok(config)
}

fn open_store(config: &RelayConfig) -> Result<Arc<dyn KeyValueStore>> {
    match &config.data_file {
        Some(path) => {
            let store = FileBackedKVStore::open(path)
                .with_context(|| format!("Failed to open store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No data_file configured, state is kept in memory only");
            Ok(Arc::new(InMemoryKVStore::new()))
        }
    }
}

/// Ping the peer and exchange headers with it.
async fn greet_peer(peer: &str, handlers: ProtocolHandlers) {
    let mut initiator = match Initiator::connect(peer, handlers).await {
        Ok(initiator) => initiator,
        Err(_) => return,
    };
    if let Err(e) = initiator.ping().await {
        warn!(peer, "Ping failed: {}", e);
        return;
    }
    match initiator.sync_headers().await {
        Ok(event) => info!(peer, "Startup sync: {:?}", event),
        Err(e) => warn!(peer, "Header sync failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log filter")?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  Cross-Chain Relay v{}", qc_15_cross_chain_relay::VERSION);
    info!("  Chain: {}", config.local_chain_id);
    info!("===========================================");

    let store = open_store(&config)?;
    let peer = config.peer_addr.clone();
    let ctx = Arc::new(RelayContext::with_store(config, store)?);

    let server = RelayServer::bind(Arc::clone(&ctx)).await?;
    let handlers = server.handlers().clone();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let serving = tokio::spawn(server.serve_with_shutdown(shutdown_rx));

    if let Some(peer) = peer {
        greet_peer(&peer, handlers).await;
    }

    info!("Relay is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutting down");
    shutdown_tx.send(true).ok();
    serving.await.context("Listener task panicked")??;

    Ok(())
}
