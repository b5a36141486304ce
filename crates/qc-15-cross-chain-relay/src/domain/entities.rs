//! # Domain Entities
//!
//! Blocks, local transactions and the abstract headers published to peers.

use super::errors::{Hash, RelayError};
use super::serde_hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Compact per-block summary published to the other chain.
///
/// In any published sequence `headers[i].height == i`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractBlockHeader {
    /// Chain that produced the block.
    pub chain_id: String,
    /// Block height (position in the sequence).
    pub height: u64,
    /// Hash of the block.
    #[serde(with = "serde_hex::hash")]
    pub block_hash: Hash,
    /// Hash of the parent block.
    #[serde(with = "serde_hex::hash")]
    pub prev_hash: Hash,
    /// Merkle root over the block's transaction ids.
    #[serde(with = "serde_hex::hash")]
    pub merkle_root: Hash,
    /// Unix timestamp.
    pub timestamp: u64,
}

/// Transaction on the local ledger.
///
/// `id` is content-addressed: SHA-256 of the JSON encoding with `id` unset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTransaction {
    /// Sender; empty for relay credits.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Opaque data.
    #[serde(default)]
    pub data: Vec<u8>,
    /// Amount.
    pub value: u64,
    /// Content address, assigned by [`LocalTransaction::seal`].
    #[serde(with = "serde_hex::hash_opt", default)]
    pub id: Option<Hash>,
}

impl LocalTransaction {
    /// Credit produced by settling a verified cross-chain transfer.
    ///
    /// `source_leaf` is the proven transaction on `source_chain_id`; both are
    /// recorded in `data` as the credit's [`source key`](Self::source_key).
    pub fn credit(
        to: impl Into<String>,
        value: u64,
        source_chain_id: &str,
        source_leaf: &Hash,
    ) -> Result<Self, RelayError> {
        Self {
            from: String::new(),
            to: to.into(),
            data: Self::source_key(source_chain_id, source_leaf),
            value,
            id: None,
        }
        .seal()
    }

    /// Identity of a source transaction: the 32-byte leaf then the chain id.
    ///
    /// Recipient and amount are not part of it, so at most one credit per key
    /// can ever be settled.
    pub fn source_key(source_chain_id: &str, source_leaf: &Hash) -> Vec<u8> {
        let mut key = Vec::with_capacity(source_leaf.len() + source_chain_id.len());
        key.extend_from_slice(source_leaf);
        key.extend_from_slice(source_chain_id.as_bytes());
        key
    }

    /// Whether this is a relay credit for the given source key.
    pub fn credits_source(&self, source_key: &[u8]) -> bool {
        self.from.is_empty() && self.data == source_key
    }

    /// Hash of the encoding without `id`.
    pub fn compute_id(&self) -> Result<Hash, RelayError> {
        let unsealed = Self {
            id: None,
            ..self.clone()
        };
        let bytes = serde_json::to_vec(&unsealed)
            .map_err(|e| RelayError::MalformedPayload(format!("transaction encode: {}", e)))?;
        Ok(Sha256::digest(&bytes).into())
    }

    /// Assign the content-addressed id.
    pub fn seal(mut self) -> Result<Self, RelayError> {
        self.id = Some(self.compute_id()?);
        Ok(self)
    }

    /// Id, or the zero hash for an unsealed transaction.
    pub fn id_or_zero(&self) -> Hash {
        self.id.unwrap_or([0u8; 32])
    }
}

/// Block on the local ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height (index in the chain).
    pub height: u64,
    /// Unix timestamp.
    pub timestamp: u64,
    /// Parent hash; zero for genesis.
    #[serde(with = "serde_hex::hash")]
    pub prev_hash: Hash,
    /// Block hash.
    #[serde(with = "serde_hex::hash")]
    pub hash: Hash,
    /// Merkle root over transaction ids.
    #[serde(with = "serde_hex::hash")]
    pub merkle_root: Hash,
    /// Included transactions, in leaf order.
    pub transactions: Vec<LocalTransaction>,
}

impl Block {
    /// Hash over height, parent, merkle root and timestamp.
    pub fn compute_hash(height: u64, prev_hash: &Hash, merkle_root: &Hash, timestamp: u64) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(height.to_be_bytes());
        hasher.update(prev_hash);
        hasher.update(merkle_root);
        hasher.update(timestamp.to_be_bytes());
        hasher.finalize().into()
    }

    /// Transaction ids in leaf order.
    pub fn transaction_ids(&self) -> Vec<Hash> {
        self.transactions.iter().map(LocalTransaction::id_or_zero).collect()
    }

    /// Summary published to peers.
    pub fn abstract_header(&self, chain_id: &str) -> AbstractBlockHeader {
        AbstractBlockHeader {
            chain_id: chain_id.to_string(),
            height: self.height,
            block_hash: self.hash,
            prev_hash: self.prev_hash,
            merkle_root: self.merkle_root,
            timestamp: self.timestamp,
        }
    }
}
