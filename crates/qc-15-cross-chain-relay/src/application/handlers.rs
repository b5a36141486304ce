//! # Protocol Handlers
//!
//! Responder and initiator handling of each envelope kind.
//!
//! Responder side:
//! - `PING` → `PONG`
//! - `HEADER_SYNC` → store peer headers, reply with local headers
//! - `TRANSFER` → verify, settle, reply `HEADER_SYNC` then `RECEIPT`
//! - unknown type code → diagnostic echo
//!
//! Initiator side:
//! - `PONG` → liveness
//! - `HEADER_SYNC` → store peer headers
//! - `RECEIPT` → verify against stored peer headers, log the result

use crate::application::context::RelayContext;
use crate::codec::Envelope;
use crate::domain::{
    invariant_header_sequence, invariant_proof_height, AbstractBlockHeader, CrossTransfer,
    CrossTransferKind, CrossTransferReceipt, LocalTransaction, MerkleProof, MessageKind,
    Rejection, RelayError,
};
use crate::ports::{RelayApi, ResponseEvent};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Handler set bound to one relay context.
#[derive(Clone)]
pub struct ProtocolHandlers {
    ctx: Arc<RelayContext>,
}

impl ProtocolHandlers {
    /// Bind handlers to `ctx`.
    pub fn new(ctx: Arc<RelayContext>) -> Self {
        Self { ctx }
    }

    /// Shared relay state.
    pub fn context(&self) -> &RelayContext {
        &self.ctx
    }

    /// Responder dispatch. Returns the envelopes to send back, in order.
    ///
    /// Handler errors are logged here and yield no reply.
    pub fn handle_inbound(&self, envelope: &Envelope) -> Vec<Envelope> {
        let kind = match envelope.kind() {
            Some(kind) => kind,
            None => {
                debug!(code = envelope.code, "Echoing unknown message type");
                return vec![Envelope::echo(envelope)];
            }
        };

        let result = match kind {
            MessageKind::Ping => self.handle_ping(),
            MessageKind::HeaderSync => self.handle_header_sync_request(envelope),
            MessageKind::Transfer => self.handle_transfer(envelope),
            MessageKind::Pong | MessageKind::Receipt | MessageKind::Reject => {
                warn!("Responder received initiator-bound {} message, ignoring", kind);
                Ok(Vec::new())
            }
        };

        result.unwrap_or_else(|e| {
            match e {
                RelayError::Store(_) | RelayError::SettlementFailed(_) => {
                    error!("{} handler failed: {}", kind, e)
                }
                _ => warn!("{} handler failed: {}", kind, e),
            }
            Vec::new()
        })
    }

    /// Initiator dispatch of one response envelope.
    pub fn handle_response(&self, envelope: &Envelope) -> Result<ResponseEvent, RelayError> {
        match envelope.kind() {
            Some(MessageKind::Pong) => Ok(self.handle_pong()),
            Some(MessageKind::HeaderSync) => self.handle_header_sync_response(envelope),
            Some(MessageKind::Receipt) => self.handle_receipt(envelope),
            Some(MessageKind::Reject) => {
                let rejection: Rejection = envelope.decode_payload()?;
                warn!("Peer rejected transfer: {}", rejection.reason);
                Ok(ResponseEvent::Rejected(rejection))
            }
            Some(MessageKind::Ping | MessageKind::Transfer) => {
                Ok(ResponseEvent::Ignored(envelope.code))
            }
            None => {
                info!(code = envelope.code, "Peer replied: {}", envelope.content);
                Ok(ResponseEvent::Echo(envelope.content.clone()))
            }
        }
    }

    /// Decode, validate and store a peer header sequence.
    fn store_headers(&self, envelope: &Envelope) -> Result<(String, usize), RelayError> {
        let headers: Vec<AbstractBlockHeader> = envelope.decode_payload()?;
        let chain_id = invariant_header_sequence(&headers)?.to_string();
        self.ctx.remote_headers.set(&chain_id, &headers)?;
        debug!(chain = %chain_id, count = headers.len(), "Stored remote headers");
        Ok((chain_id, headers.len()))
    }

    /// Check `proof` against the stored headers of `chain_id`.
    ///
    /// Missing headers and out-of-range heights are verification failures.
    fn verify_proof(&self, chain_id: &str, proof: &MerkleProof) -> Result<(), RelayError> {
        let stored = self.ctx.remote_headers.get(chain_id)?.ok_or_else(|| {
            RelayError::VerificationFailure(format!("no headers stored for chain {}", chain_id))
        })?;
        let header = invariant_proof_height(proof, &stored)?;

        if self.ctx.verifier.verify(
            &proof.trans_hash,
            &proof.merkle_path,
            proof.merkle_index,
            &header.merkle_root,
        ) {
            Ok(())
        } else {
            Err(RelayError::VerificationFailure(format!(
                "proof for {} does not match root at height {}",
                hex::encode(proof.trans_hash),
                proof.height
            )))
        }
    }

    /// Drop silently or answer with `REJECT`, per configuration.
    fn refuse(
        &self,
        reason: &RelayError,
        proof: &MerkleProof,
    ) -> Result<Vec<Envelope>, RelayError> {
        warn!("Dropping cross transfer: {}", reason);
        if !self.ctx.config.reject_on_verification_failure {
            return Ok(Vec::new());
        }
        let rejection = Rejection {
            reason: reason.to_string(),
            trans_hash: Some(proof.trans_hash),
        };
        Ok(vec![Envelope::reject(&rejection)?])
    }
}

impl RelayApi for ProtocolHandlers {
    fn handle_ping(&self) -> Result<Vec<Envelope>, RelayError> {
        Ok(vec![Envelope::pong()])
    }

    fn handle_header_sync_request(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RelayError> {
        let (chain_id, count) = self.store_headers(envelope)?;
        let local = self.ctx.coordinator.local_headers()?;
        info!(
            peer = %chain_id,
            received = count,
            sent = local.len(),
            "Header sync"
        );
        Ok(vec![Envelope::header_sync(&local)?])
    }

    fn handle_transfer(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RelayError> {
        let transfer: CrossTransfer = envelope.decode_payload()?;

        if transfer.kind == CrossTransferKind::Unsupported {
            let reason = RelayError::VerificationFailure("unsupported transfer kind".to_string());
            return self.refuse(&reason, &transfer.proof);
        }

        match self.verify_proof(&transfer.source_chain_id, &transfer.proof) {
            Ok(()) => {}
            Err(e @ RelayError::VerificationFailure(_)) => return self.refuse(&e, &transfer.proof),
            Err(e) => return Err(e),
        }

        let credit = LocalTransaction::credit(
            &transfer.to,
            transfer.value,
            &transfer.source_chain_id,
            &transfer.proof.trans_hash,
        )?;
        let settlement = match self.ctx.coordinator.settle(credit, &transfer) {
            Ok(settlement) => settlement,
            Err(e @ RelayError::VerificationFailure(_)) => return self.refuse(&e, &transfer.proof),
            Err(e) => return Err(e),
        };

        Ok(vec![
            Envelope::header_sync(&settlement.headers)?,
            Envelope::receipt(&settlement.receipt)?,
        ])
    }

    fn handle_pong(&self) -> ResponseEvent {
        info!("Peer is alive");
        ResponseEvent::Pong
    }

    fn handle_header_sync_response(
        &self,
        envelope: &Envelope,
    ) -> Result<ResponseEvent, RelayError> {
        let (chain_id, count) = self.store_headers(envelope)?;
        Ok(ResponseEvent::HeadersSynced { chain_id, count })
    }

    fn handle_receipt(&self, envelope: &Envelope) -> Result<ResponseEvent, RelayError> {
        let receipt: CrossTransferReceipt = envelope.decode_payload()?;

        let verified = match self.verify_proof(&receipt.source_chain_id, &receipt.proof) {
            Ok(()) => true,
            Err(RelayError::VerificationFailure(reason)) => {
                warn!(chain = %receipt.source_chain_id, "Receipt verification failed: {}", reason);
                false
            }
            Err(e) => return Err(e),
        };

        if verified {
            info!(
                chain = %receipt.source_chain_id,
                height = receipt.proof.height,
                index = receipt.proof.merkle_index,
                "Receipt verified"
            );
        }

        Ok(ResponseEvent::Receipt { receipt, verified })
    }
}
