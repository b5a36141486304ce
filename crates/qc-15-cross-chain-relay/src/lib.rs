//! # QC-15 Cross-Chain Relay
//!
//! Header sync, Merkle-proven transfers and settlement receipts between two
//! chains over a framed TCP envelope protocol.
//!
//! **Subsystem ID:** 15  
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Protocol
//!
//! | Code | Kind          | Direction            | Content                  |
//! |------|---------------|----------------------|--------------------------|
//! | 0    | `PING`        | initiator → responder | empty                   |
//! | 1    | `PONG`        | responder → initiator | empty                   |
//! | 2    | `HEADER_SYNC` | both                  | abstract header list    |
//! | 3    | `TRANSFER`    | initiator → responder | cross transfer + proof  |
//! | 4    | `RECEIPT`     | responder → initiator | receipt + proof         |
//! | 5    | `REJECT`      | responder → initiator | reason (opt-in)         |
//!
//! A verified transfer is settled under a single ledger lock and answered
//! with fresh headers followed by the receipt, so the initiator can verify
//! the receipt against headers that already contain the settling block.
//!
//! ## Module Structure
//!
//! ```text
//! qc-15-cross-chain-relay/
//! ├── domain/          # Headers, transactions, blocks, proofs, errors
//! ├── algorithms/      # Merkle path build/verify
//! ├── codec/           # Envelope JSON + length-prefixed frames
//! ├── ports/           # RelayApi, KeyValueStore, RemoteHeaderStore, Ledger
//! ├── adapters/        # KV stores, header store, ledger, verifier
//! ├── application/     # Handlers, settlement coordinator, context
//! └── session/         # Responder loop, initiator driver, listener
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod codec;
pub mod config;
pub mod domain;
pub mod ports;
pub mod session;

/// Failure injectors and fixtures.
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{
    FileBackedKVStore, InMemoryKVStore, KvLedger, KvRemoteHeaderStore, Sha256MerkleVerifier,
};
pub use algorithms::{build_merkle_path, compute_merkle_root, verify_merkle_path};
pub use application::{ProtocolHandlers, RelayContext, Settlement, SettlementCoordinator};
pub use codec::{decode_envelope, encode_envelope, Envelope};
pub use config::RelayConfig;
pub use domain::{
    AbstractBlockHeader, Block, CrossTransfer, CrossTransferKind, CrossTransferReceipt,
    ExchangeState, Hash, KVStoreError, LocalTransaction, MerkleProof, MessageKind, Rejection,
    RelayError,
};
pub use ports::{KeyValueStore, Ledger, MerkleVerifier, RelayApi, RemoteHeaderStore, ResponseEvent};
pub use session::{Initiator, RelayServer, ResponderSession, SessionStats};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
