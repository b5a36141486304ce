//! # Settlement Coordinator
//!
//! Serializes crediting a verified transfer onto the local ledger.
//!
//! One critical section covers the replay check, enqueue, block
//! construction, chain append, persistence, pool reset and receipt packing,
//! so concurrent settlements never interleave their chain updates.

use crate::domain::{
    AbstractBlockHeader, Block, CrossTransfer, CrossTransferReceipt, Hash, LocalTransaction,
    RelayError,
};
use crate::ports::Ledger;
use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Outcome of one settlement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Height of the block holding the credit.
    pub block_height: u64,
    /// Position of the credit within that block.
    pub sequence: u64,
    /// Local abstract headers after the append.
    pub headers: Vec<AbstractBlockHeader>,
    /// Receipt proving the credit.
    pub receipt: CrossTransferReceipt,
}

/// Owns the ledger and settles credits one at a time.
pub struct SettlementCoordinator {
    local_chain_id: String,
    ledger: Mutex<Box<dyn Ledger>>,
}

impl SettlementCoordinator {
    /// Wrap a ledger.
    pub fn new(local_chain_id: impl Into<String>, ledger: Box<dyn Ledger>) -> Self {
        Self {
            local_chain_id: local_chain_id.into(),
            ledger: Mutex::new(ledger),
        }
    }

    /// Chain id used for local headers.
    pub fn local_chain_id(&self) -> &str {
        &self.local_chain_id
    }

    /// Credit `tx` for `transfer` and pack its receipt.
    ///
    /// `tx` must be the credit for `transfer`'s source key. A source
    /// transaction already credited is refused with `VerificationFailure`,
    /// whatever recipient or amount the replay names.
    ///
    /// Before the chain write succeeds, any failure leaves chain and pending
    /// pool as they were. After it, the settlement stands: a failed pool
    /// reset is logged and the receipt is still returned.
    pub fn settle(
        &self,
        tx: LocalTransaction,
        transfer: &CrossTransfer,
    ) -> Result<Settlement, RelayError> {
        let tx_id = tx
            .id
            .ok_or_else(|| RelayError::SettlementFailed("transaction is not sealed".to_string()))?;
        let source_key =
            LocalTransaction::source_key(&transfer.source_chain_id, &transfer.proof.trans_hash);
        if !tx.credits_source(&source_key) {
            return Err(RelayError::SettlementFailed(
                "credit does not match the proven transfer".to_string(),
            ));
        }

        let mut ledger = self.ledger.lock();

        if ledger.has_credit(&source_key)? {
            return Err(RelayError::VerificationFailure(format!(
                "transfer {} from {} already settled",
                hex::encode(transfer.proof.trans_hash),
                transfer.source_chain_id
            )));
        }

        ledger.enqueue(tx)?;

        let block_height = match append_pending(&mut **ledger) {
            Ok(height) => height,
            Err(e) => {
                if let Err(rollback) = ledger.discard_pending(&tx_id) {
                    warn!("Failed to discard pending credit: {}", rollback);
                }
                return Err(e);
            }
        };

        if let Err(e) = ledger.clear_pending() {
            warn!(height = block_height, "Block committed, pool reset failed: {}", e);
        }

        let settlement = self.receipt_for(&**ledger, &tx_id, transfer).map_err(|e| {
            error!(height = block_height, "Credit committed without receipt: {}", e);
            e
        })?;

        info!(
            source = %transfer.source_chain_id,
            to = %transfer.to,
            value = transfer.value,
            height = settlement.block_height,
            sequence = settlement.sequence,
            "Settled cross transfer"
        );
        Ok(settlement)
    }

    fn receipt_for(
        &self,
        ledger: &dyn Ledger,
        tx_id: &Hash,
        transfer: &CrossTransfer,
    ) -> Result<Settlement, RelayError> {
        let (block_height, sequence) = ledger.locate(tx_id)?.ok_or_else(|| {
            RelayError::SettlementFailed("credit missing from appended block".to_string())
        })?;
        let headers = ledger.local_abstract_headers(&self.local_chain_id)?;
        let receipt = ledger.pack_receipt(transfer, block_height, sequence)?;

        Ok(Settlement {
            block_height,
            sequence,
            headers,
            receipt,
        })
    }

    /// Snapshot of the local chain.
    pub fn chain(&self) -> Result<Vec<Block>, RelayError> {
        self.ledger.lock().current_chain()
    }

    /// Current local abstract headers.
    pub fn local_headers(&self) -> Result<Vec<AbstractBlockHeader>, RelayError> {
        self.ledger.lock().local_abstract_headers(&self.local_chain_id)
    }

    /// Number of blocks, genesis included.
    pub fn chain_len(&self) -> Result<usize, RelayError> {
        Ok(self.ledger.lock().current_chain()?.len())
    }

    /// Number of pending transactions.
    pub fn pending_len(&self) -> Result<usize, RelayError> {
        Ok(self.ledger.lock().pending_txs()?.len())
    }
}

/// Build a block from the whole pending pool and append it.
fn append_pending(ledger: &mut dyn Ledger) -> Result<u64, RelayError> {
    let pending = ledger.pending_txs()?;
    let block = ledger.build_block(&pending)?;
    let height = block.height;
    let mut chain = ledger.current_chain()?;
    chain.push(block);
    ledger.append_and_persist(chain)?;
    Ok(height)
}
