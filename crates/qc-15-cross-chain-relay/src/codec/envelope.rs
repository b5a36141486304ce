//! # Envelope Codec
//!
//! `{"type": <code>, "content": <string>}` where `content` is the JSON
//! encoding of the kind-specific payload (empty for ping/pong).

use crate::domain::{
    AbstractBlockHeader, CrossTransfer, CrossTransferReceipt, MessageKind, Rejection, RelayError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Wire envelope.
///
/// The type code is kept raw so unknown kinds survive decoding and can be
/// echoed back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message type code.
    #[serde(rename = "type")]
    pub code: u32,
    /// Encoded payload.
    #[serde(default)]
    pub content: String,
}

impl Envelope {
    /// Envelope with a raw type code.
    pub fn new(code: u32, content: impl Into<String>) -> Self {
        Self {
            code,
            content: content.into(),
        }
    }

    /// Known kind, if the code is one.
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::from_code(self.code)
    }

    /// Empty-content `PING`.
    pub fn ping() -> Self {
        Self::new(MessageKind::Ping.code(), "")
    }

    /// Empty-content `PONG`.
    pub fn pong() -> Self {
        Self::new(MessageKind::Pong.code(), "")
    }

    /// `HEADER_SYNC` carrying a header sequence.
    pub fn header_sync(headers: &[AbstractBlockHeader]) -> Result<Self, RelayError> {
        Self::with_payload(MessageKind::HeaderSync, &headers)
    }

    /// `TRANSFER` carrying a cross transfer.
    pub fn transfer(transfer: &CrossTransfer) -> Result<Self, RelayError> {
        Self::with_payload(MessageKind::Transfer, transfer)
    }

    /// `RECEIPT` carrying a settlement receipt.
    pub fn receipt(receipt: &CrossTransferReceipt) -> Result<Self, RelayError> {
        Self::with_payload(MessageKind::Receipt, receipt)
    }

    /// `REJECT` carrying the reason.
    pub fn reject(rejection: &Rejection) -> Result<Self, RelayError> {
        Self::with_payload(MessageKind::Reject, rejection)
    }

    /// Diagnostic reply for an unknown type code.
    pub fn echo(received: &Envelope) -> Self {
        Self::new(received.code, format!("server reply: {}", received.content))
    }

    fn with_payload<T: Serialize + ?Sized>(
        kind: MessageKind,
        payload: &T,
    ) -> Result<Self, RelayError> {
        let content = serde_json::to_string(payload)
            .map_err(|e| RelayError::MalformedPayload(format!("{} encode: {}", kind, e)))?;
        Ok(Self::new(kind.code(), content))
    }

    /// Decode the content as `T`.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, RelayError> {
        serde_json::from_str(self.content.trim()).map_err(|e| {
            RelayError::MalformedPayload(format!("type {} content: {}", self.code, e))
        })
    }
}

/// Encode an envelope to frame bytes.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, RelayError> {
    serde_json::to_vec(envelope).map_err(|e| RelayError::MalformedEnvelope(e.to_string()))
}

/// Decode frame bytes to an envelope; surrounding whitespace is ignored.
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, RelayError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| RelayError::MalformedEnvelope(format!("invalid UTF-8: {}", e)))?;
    serde_json::from_str(text.trim()).map_err(|e| RelayError::MalformedEnvelope(e.to_string()))
}
