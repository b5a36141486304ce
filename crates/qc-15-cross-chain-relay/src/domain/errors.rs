//! # Domain Errors
//!
//! Error types for the cross-chain relay.
//!
//! Transport errors end a session, decode errors abort one handler,
//! verification failures follow the transfer/receipt policy and store errors
//! abort the step that triggered them without partial mutation.

use thiserror::Error;

/// Hash type (32-byte SHA-256).
pub type Hash = [u8; 32];

/// Relay error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Read, write or dial failure on the underlying connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A read or write deadline elapsed.
    #[error("Timed out after {secs}s waiting for {waiting_for}")]
    Timeout {
        /// What the session was waiting for
        waiting_for: &'static str,
        /// Deadline in seconds
        secs: u64,
    },

    /// Frame length prefix exceeds the configured bound.
    #[error("Frame too large: {len} > {max} bytes")]
    FrameTooLarge {
        /// Announced frame length
        len: usize,
        /// Configured maximum
        max: usize,
    },

    /// The envelope itself could not be decoded.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The envelope decoded but its content did not match its kind.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Merkle proof does not match the stored header root.
    ///
    /// Out-of-range proof heights are reported through this variant too.
    #[error("Verification failed: {0}")]
    VerificationFailure(String),

    /// Remote header store or ledger persistence failed.
    #[error("Store error: {0}")]
    Store(String),

    /// The settlement sequence could not complete.
    #[error("Settlement failed: {0}")]
    SettlementFailed(String),

    /// Illegal exchange state transition.
    #[error("Invalid exchange transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: String,
        /// Attempted state
        to: String,
    },

    /// Configuration could not be loaded.
    #[error("Config error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the error ends the session it occurred on.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Timeout { .. } | Self::FrameTooLarge { .. }
        )
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    #[error("KV store I/O error: {message}")]
    IOError {
        /// Underlying error message
        message: String,
    },
    /// Stored bytes could not be decoded.
    #[error("KV store corruption: {message}")]
    CorruptionError {
        /// Decoder message
        message: String,
    },
}

impl From<KVStoreError> for RelayError {
    fn from(err: KVStoreError) -> Self {
        Self::Store(err.to_string())
    }
}
