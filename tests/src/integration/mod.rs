//! # Integration Tests
//!
//! Every test binds real listeners on `127.0.0.1:0` and drives them with
//! [`Initiator`](qc_15_cross_chain_relay::Initiator) connections.

pub mod relay_flows;
pub mod settlement;

use qc_15_cross_chain_relay::{
    InMemoryKVStore, KvRemoteHeaderStore, Ledger, ProtocolHandlers, RelayConfig, RelayContext,
    RelayServer, SettlementCoordinator, Sha256MerkleVerifier,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;

/// A listener running in the background.
pub struct RunningNode {
    pub addr: SocketAddr,
    pub ctx: Arc<RelayContext>,
    stop: watch::Sender<bool>,
}

impl RunningNode {
    /// Fresh initiator handlers bound to this node's state.
    pub fn handlers(&self) -> ProtocolHandlers {
        ProtocolHandlers::new(Arc::clone(&self.ctx))
    }

    pub fn chain_len(&self) -> usize {
        self.ctx.coordinator.chain_len().unwrap()
    }
}

impl Drop for RunningNode {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}

pub fn test_config(chain_id: &str) -> RelayConfig {
    RelayConfig {
        local_chain_id: chain_id.to_string(),
        ..RelayConfig::for_testing()
    }
}

/// Context over `ledger` with an in-memory header store.
pub fn context_with_ledger(config: RelayConfig, ledger: Box<dyn Ledger>) -> Arc<RelayContext> {
    let coordinator = SettlementCoordinator::new(config.local_chain_id.clone(), ledger);
    Arc::new(RelayContext::new(
        config,
        Arc::new(KvRemoteHeaderStore::new(Arc::new(InMemoryKVStore::new()))),
        Arc::new(Sha256MerkleVerifier),
        Arc::new(coordinator),
    ))
}

pub async fn spawn_node(ctx: Arc<RelayContext>) -> RunningNode {
    let server = RelayServer::bind_addr("127.0.0.1:0", Arc::clone(&ctx))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(server.serve_with_shutdown(shutdown));
    RunningNode { addr, ctx, stop }
}

pub async fn spawn_fresh_node(config: RelayConfig) -> RunningNode {
    spawn_node(Arc::new(RelayContext::in_memory(config).unwrap())).await
}
