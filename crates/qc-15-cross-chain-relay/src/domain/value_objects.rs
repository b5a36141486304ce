//! # Value Objects
//!
//! Wire payloads and protocol enums for the relay.

use super::errors::Hash;
use super::serde_hex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope type tag. Append-only: codes are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    /// Liveness check.
    Ping = 0,
    /// Liveness reply.
    Pong = 1,
    /// Abstract header sequence, used for both request and reply.
    HeaderSync = 2,
    /// Cross-chain transfer request.
    Transfer = 3,
    /// Settlement receipt (responder to initiator only).
    Receipt = 4,
    /// Explicit transfer rejection.
    Reject = 5,
}

impl MessageKind {
    /// All known kinds in code order.
    pub const ALL: [MessageKind; 6] = [
        Self::Ping,
        Self::Pong,
        Self::HeaderSync,
        Self::Transfer,
        Self::Receipt,
        Self::Reject,
    ];

    /// Numeric wire code.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Look up a kind by wire code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ping => "PING",
            Self::Pong => "PONG",
            Self::HeaderSync => "HEADER_SYNC",
            Self::Transfer => "TRANSFER",
            Self::Receipt => "RECEIPT",
            Self::Reject => "REJECT",
        };
        f.write_str(name)
    }
}

/// Merkle inclusion proof anchored at a header height.
///
/// `height` indexes the verifier's stored header sequence for the claimed
/// chain, so it must be checked against that sequence before use.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleProof {
    /// Leaf being proven.
    #[serde(with = "serde_hex::hash")]
    pub trans_hash: Hash,
    /// Sibling hashes from leaf level upwards.
    #[serde(with = "serde_hex::hash_list")]
    pub merkle_path: Vec<Hash>,
    /// Leaf position within the block.
    pub merkle_index: u64,
    /// Header height the proof is anchored to.
    pub height: u64,
}

/// Cross transaction type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossTransferKind {
    /// Value transfer settled on the receiving chain.
    #[default]
    Transfer,
    /// Any kind this relay does not settle.
    #[serde(other)]
    Unsupported,
}

/// Transfer request proven against the source chain's synced headers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTransfer {
    /// Transaction type.
    #[serde(default)]
    pub kind: CrossTransferKind,
    /// Chain the transfer originates from.
    pub source_chain_id: String,
    /// Recipient on the settling chain.
    pub to: String,
    /// Amount credited.
    pub value: u64,
    /// Inclusion proof on the source chain.
    pub proof: MerkleProof,
}

impl CrossTransfer {
    /// Create a value transfer.
    pub fn new(
        source_chain_id: impl Into<String>,
        to: impl Into<String>,
        value: u64,
        proof: MerkleProof,
    ) -> Self {
        Self {
            kind: CrossTransferKind::Transfer,
            source_chain_id: source_chain_id.into(),
            to: to.into(),
            value,
            proof,
        }
    }
}

/// Proof that the settlement transaction landed on the responder's chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossTransferReceipt {
    /// The settling chain (whose headers the initiator verifies against).
    pub source_chain_id: String,
    /// Inclusion proof on the settling chain.
    pub proof: MerkleProof,
}

/// Payload of a `REJECT` envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Human-readable reason.
    pub reason: String,
    /// Leaf of the rejected proof, when known.
    #[serde(with = "serde_hex::hash_opt", default)]
    pub trans_hash: Option<Hash>,
}

/// State of one logical exchange on an initiator connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Header sync request sent.
    HeaderSyncPending,
    /// Remote headers stored.
    Synced,
    /// Transfer sent, awaiting receipt.
    TransferPending,
    /// Receipt received and verified.
    Settled,
    /// Transfer rejected or receipt failed verification.
    Rejected,
}

impl ExchangeState {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        match (self, next) {
            (Idle | Synced | Settled | Rejected, HeaderSyncPending) => true,
            (HeaderSyncPending, Synced) => true,
            // The responder answers every transfer with fresh headers first,
            // so a transfer may start without a prior sync on this connection.
            (Idle | Synced | Settled | Rejected, TransferPending) => true,
            (TransferPending, Settled | Rejected) => true,
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Settled | Self::Rejected)
    }
}
