//! Remote header store over a key-value store.

use crate::domain::{AbstractBlockHeader, RelayError, REMOTE_HEADERS_KEY_PREFIX};
use crate::ports::{KeyValueStore, RemoteHeaderStore};
use std::sync::Arc;

/// Stores each peer chain's header sequence as JSON under
/// `<prefix><chainId>`.
pub struct KvRemoteHeaderStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl KvRemoteHeaderStore {
    /// Create with the default key prefix.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, REMOTE_HEADERS_KEY_PREFIX)
    }

    /// Create with a custom key prefix.
    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// Storage key for a chain.
    pub fn key_for(&self, chain_id: &str) -> String {
        format!("{}{}", self.prefix, chain_id)
    }
}

impl RemoteHeaderStore for KvRemoteHeaderStore {
    fn get(&self, chain_id: &str) -> Result<Option<Vec<AbstractBlockHeader>>, RelayError> {
        let Some(bytes) = self.store.get(self.key_for(chain_id).as_bytes())? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RelayError::Store(format!("headers for {}: {}", chain_id, e)))
    }

    fn set(&self, chain_id: &str, headers: &[AbstractBlockHeader]) -> Result<(), RelayError> {
        let bytes = serde_json::to_vec(headers)
            .map_err(|e| RelayError::Store(format!("encode headers for {}: {}", chain_id, e)))?;
        self.store.put(self.key_for(chain_id).as_bytes(), &bytes)?;
        Ok(())
    }
}
