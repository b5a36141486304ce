//! # Ports Module
//!
//! Port definitions for hexagonal architecture.

pub mod inbound;
pub mod outbound;

pub use inbound::{RelayApi, ResponseEvent};
pub use outbound::{KeyValueStore, Ledger, MerkleVerifier, RemoteHeaderStore};
