//! Shared state handed to every handler and session.

use crate::adapters::{InMemoryKVStore, KvLedger, KvRemoteHeaderStore, Sha256MerkleVerifier};
use crate::application::coordinator::SettlementCoordinator;
use crate::config::RelayConfig;
use crate::domain::RelayError;
use crate::ports::{KeyValueStore, MerkleVerifier, RemoteHeaderStore};
use std::sync::Arc;

/// Process-wide relay state, built once at startup.
pub struct RelayContext {
    /// Node configuration.
    pub config: RelayConfig,
    /// Headers received from peer chains.
    pub remote_headers: Arc<dyn RemoteHeaderStore>,
    /// Merkle inclusion predicate.
    pub verifier: Arc<dyn MerkleVerifier>,
    /// Owner of the local ledger.
    pub coordinator: Arc<SettlementCoordinator>,
}

impl RelayContext {
    /// Assemble a context from explicit collaborators.
    pub fn new(
        config: RelayConfig,
        remote_headers: Arc<dyn RemoteHeaderStore>,
        verifier: Arc<dyn MerkleVerifier>,
        coordinator: Arc<SettlementCoordinator>,
    ) -> Self {
        Self {
            config,
            remote_headers,
            verifier,
            coordinator,
        }
    }

    /// Header store and ledger sharing one key-value store.
    pub fn with_store(
        config: RelayConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, RelayError> {
        let remote_headers = Arc::new(KvRemoteHeaderStore::with_prefix(
            Arc::clone(&store),
            config.remote_headers_key_prefix.clone(),
        ));
        let ledger = KvLedger::open(config.local_chain_id.clone(), store)?;
        let coordinator = Arc::new(SettlementCoordinator::new(
            config.local_chain_id.clone(),
            Box::new(ledger),
        ));

        Ok(Self::new(
            config,
            remote_headers,
            Arc::new(Sha256MerkleVerifier),
            coordinator,
        ))
    }

    /// Context over a fresh in-memory store.
    pub fn in_memory(config: RelayConfig) -> Result<Self, RelayError> {
        Self::with_store(config, Arc::new(InMemoryKVStore::new()))
    }
}
