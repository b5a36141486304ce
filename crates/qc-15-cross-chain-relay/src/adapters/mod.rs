//! # Adapters Module
//!
//! Implementations of the outbound ports.

pub mod header_store;
pub mod kv_store;
pub mod ledger;
pub mod merkle_verifier;

pub use header_store::KvRemoteHeaderStore;
pub use kv_store::{FileBackedKVStore, InMemoryKVStore};
pub use ledger::KvLedger;
pub use merkle_verifier::Sha256MerkleVerifier;
