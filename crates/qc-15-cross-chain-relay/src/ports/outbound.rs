//! # Outbound Ports
//!
//! Collaborators the relay core drives: key-value persistence, the remote
//! header store, the Merkle predicate and the local ledger.

use crate::domain::{
    AbstractBlockHeader, Block, CrossTransfer, CrossTransferReceipt, Hash, KVStoreError,
    LocalTransaction, RelayError,
};

/// Abstract interface for key-value persistence.
///
/// Production: `FileBackedKVStore`
/// Testing: `InMemoryKVStore`
///
/// Implementations serialize writes internally, so a single `put` is
/// linearizable per key.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Latest header sequence received from each peer chain.
///
/// `set` overwrites the whole record; there is no merge or versioning.
pub trait RemoteHeaderStore: Send + Sync {
    /// Stored headers for `chain_id`, `None` if never synced.
    fn get(&self, chain_id: &str) -> Result<Option<Vec<AbstractBlockHeader>>, RelayError>;

    /// Replace the record for `chain_id`.
    fn set(&self, chain_id: &str, headers: &[AbstractBlockHeader]) -> Result<(), RelayError>;
}

/// Merkle inclusion predicate. Pure and deterministic.
pub trait MerkleVerifier: Send + Sync {
    /// Whether `trans_hash` sits at `merkle_index` under `root`.
    fn verify(
        &self,
        trans_hash: &Hash,
        merkle_path: &[Hash],
        merkle_index: u64,
        root: &Hash,
    ) -> bool;
}

/// Append-only local ledger.
///
/// Callers must hold the settlement lock around
/// `current_chain` + `append_and_persist` + `clear_pending`; the ledger
/// itself does no locking.
pub trait Ledger: Send {
    /// Add a transaction to the pending pool.
    fn enqueue(&mut self, tx: LocalTransaction) -> Result<(), RelayError>;

    /// Pending pool in arrival order.
    fn pending_txs(&self) -> Result<Vec<LocalTransaction>, RelayError>;

    /// Build the next block from `txs` on top of the current tip.
    fn build_block(&self, txs: &[LocalTransaction]) -> Result<Block, RelayError>;

    /// Snapshot of the chain.
    fn current_chain(&self) -> Result<Vec<Block>, RelayError>;

    /// Replace the chain with `chain` and persist it.
    ///
    /// Once the chain is durable, transactions contained in the new blocks
    /// are no longer pending, even if a later `clear_pending` fails.
    fn append_and_persist(&mut self, chain: Vec<Block>) -> Result<(), RelayError>;

    /// Empty the pending pool.
    fn clear_pending(&mut self) -> Result<(), RelayError>;

    /// Drop one transaction from the pending pool.
    fn discard_pending(&mut self, tx_id: &Hash) -> Result<(), RelayError>;

    /// Whether a credit for `source_key` is on the chain or pending.
    fn has_credit(&self, source_key: &[u8]) -> Result<bool, RelayError>;

    /// `(block_height, sequence)` of a transaction on the chain.
    fn locate(&self, tx_id: &Hash) -> Result<Option<(u64, u64)>, RelayError>;

    /// Abstract headers of the whole chain, labelled with `chain_id`.
    fn local_abstract_headers(
        &self,
        chain_id: &str,
    ) -> Result<Vec<AbstractBlockHeader>, RelayError>;

    /// Receipt proving the transaction at `(height, sequence)`.
    fn pack_receipt(
        &self,
        transfer: &CrossTransfer,
        height: u64,
        sequence: u64,
    ) -> Result<CrossTransferReceipt, RelayError>;
}
