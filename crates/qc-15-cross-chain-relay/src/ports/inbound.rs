//! # Inbound Ports
//!
//! The six protocol handlers a session dispatches to.

use crate::codec::Envelope;
use crate::domain::{CrossTransferReceipt, Rejection, RelayError};

/// What an initiator learned from one response envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Peer answered a ping.
    Pong,
    /// Peer headers stored.
    HeadersSynced {
        /// Peer chain
        chain_id: String,
        /// Number of headers stored
        count: usize,
    },
    /// Receipt received; `verified` is the Merkle check result.
    Receipt {
        /// Decoded receipt
        receipt: CrossTransferReceipt,
        /// Whether it verified against stored headers
        verified: bool,
    },
    /// Peer rejected the transfer.
    Rejected(Rejection),
    /// Diagnostic echo for an unknown type code.
    Echo(String),
    /// Envelope that needs no action on this side.
    Ignored(u32),
}

/// Relay protocol handlers.
///
/// Responder handlers return the envelopes to send back, in order.
/// Decode failures and store failures return `Err` without mutating shared
/// state.
pub trait RelayApi: Send + Sync {
    /// `PING` → `PONG`.
    fn handle_ping(&self) -> Result<Vec<Envelope>, RelayError>;

    /// Store peer headers and reply with local headers.
    fn handle_header_sync_request(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RelayError>;

    /// Verify, settle and reply with `HEADER_SYNC` then `RECEIPT`.
    ///
    /// An unverifiable transfer yields no envelopes unless rejections are
    /// enabled.
    fn handle_transfer(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RelayError>;

    /// Initiator side: log liveness.
    fn handle_pong(&self) -> ResponseEvent;

    /// Initiator side: store the responder's headers.
    fn handle_header_sync_response(&self, envelope: &Envelope) -> Result<ResponseEvent, RelayError>;

    /// Initiator side: verify a receipt against stored responder headers.
    fn handle_receipt(&self, envelope: &Envelope) -> Result<ResponseEvent, RelayError>;
}
