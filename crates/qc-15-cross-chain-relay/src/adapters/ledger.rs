//! Key-value backed ledger adapter.

use crate::algorithms::{build_merkle_path, compute_merkle_root};
use crate::domain::{
    AbstractBlockHeader, Block, CrossTransfer, CrossTransferReceipt, Hash, LocalTransaction,
    MerkleProof, RelayError,
};
use crate::ports::{KeyValueStore, Ledger};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key of the chain.
pub const CHAIN_KEY: &[u8] = b"ledger:chain";

/// Storage key of the pending pool.
pub const PENDING_KEY: &[u8] = b"ledger:pending";

/// Ledger persisted as JSON in a key-value store.
///
/// The in-memory copy is only updated after the store write succeeds. The
/// chain is authoritative: a pending entry already contained in a block is
/// dropped, both after an append and when the ledger is reopened.
pub struct KvLedger {
    chain_id: String,
    store: Arc<dyn KeyValueStore>,
    chain: Vec<Block>,
    pending: Vec<LocalTransaction>,
    credited: HashSet<Vec<u8>>,
}

impl KvLedger {
    /// Open the ledger, writing a genesis block if the store has no chain.
    pub fn open(
        chain_id: impl Into<String>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, RelayError> {
        let chain_id = chain_id.into();
        let chain = match load::<Vec<Block>>(store.as_ref(), CHAIN_KEY)? {
            Some(chain) if !chain.is_empty() => chain,
            _ => {
                let genesis = vec![genesis_block()];
                save(store.as_ref(), CHAIN_KEY, &genesis)?;
                genesis
            }
        };
        let stored_pending: Vec<LocalTransaction> =
            load(store.as_ref(), PENDING_KEY)?.unwrap_or_default();

        let mut ledger = Self {
            chain_id,
            store,
            chain,
            pending: Vec::new(),
            credited: HashSet::new(),
        };
        ledger.index_credits(0);

        let stored = stored_pending.len();
        let committed = ledger.committed_ids(0);
        ledger.pending = stored_pending
            .into_iter()
            .filter(|tx| !tx.id.is_some_and(|id| committed.contains(&id)))
            .collect();
        if ledger.pending.len() != stored {
            warn!(
                dropped = stored - ledger.pending.len(),
                "Pending pool held transactions already on the chain"
            );
        }

        Ok(ledger)
    }

    /// Chain this ledger belongs to.
    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn tip(&self) -> Result<&Block, RelayError> {
        self.chain
            .last()
            .ok_or_else(|| RelayError::Store("ledger has no genesis block".to_string()))
    }

    fn index_credits(&mut self, from_height: usize) {
        for block in self.chain.iter().skip(from_height) {
            for tx in &block.transactions {
                if tx.from.is_empty() {
                    self.credited.insert(tx.data.clone());
                }
            }
        }
    }

    fn committed_ids(&self, from_height: usize) -> HashSet<Hash> {
        self.chain
            .iter()
            .skip(from_height)
            .flat_map(|block| block.transactions.iter().filter_map(|tx| tx.id))
            .collect()
    }

    fn persist_pending(&mut self, pending: Vec<LocalTransaction>) -> Result<(), RelayError> {
        save(self.store.as_ref(), PENDING_KEY, &pending)?;
        self.pending = pending;
        Ok(())
    }

    /// `chain` must be the current chain with new blocks linked on top.
    fn check_extends_current(&self, chain: &[Block]) -> Result<(), RelayError> {
        let current = self.chain.len();
        if chain.len() <= current {
            return Err(RelayError::SettlementFailed(format!(
                "chain of {} blocks does not extend current {}",
                chain.len(),
                current
            )));
        }
        if chain[current - 1].hash != self.tip()?.hash {
            return Err(RelayError::SettlementFailed(
                "chain snapshot is stale: tip mismatch".to_string(),
            ));
        }
        for i in current..chain.len() {
            if chain[i].height != i as u64 || chain[i].prev_hash != chain[i - 1].hash {
                return Err(RelayError::SettlementFailed(format!(
                    "block {} is not linked to its parent",
                    i
                )));
            }
        }
        Ok(())
    }
}

impl Ledger for KvLedger {
    fn enqueue(&mut self, tx: LocalTransaction) -> Result<(), RelayError> {
        let mut pending = self.pending.clone();
        pending.push(tx);
        self.persist_pending(pending)
    }

    fn pending_txs(&self) -> Result<Vec<LocalTransaction>, RelayError> {
        Ok(self.pending.clone())
    }

    fn build_block(&self, txs: &[LocalTransaction]) -> Result<Block, RelayError> {
        let tip = self.tip()?;
        let height = tip.height + 1;
        let ids: Vec<Hash> = txs.iter().map(LocalTransaction::id_or_zero).collect();
        let merkle_root = compute_merkle_root(&ids);
        let timestamp = unix_now().max(tip.timestamp);

        Ok(Block {
            height,
            timestamp,
            prev_hash: tip.hash,
            hash: Block::compute_hash(height, &tip.hash, &merkle_root, timestamp),
            merkle_root,
            transactions: txs.to_vec(),
        })
    }

    fn current_chain(&self) -> Result<Vec<Block>, RelayError> {
        Ok(self.chain.clone())
    }

    fn append_and_persist(&mut self, chain: Vec<Block>) -> Result<(), RelayError> {
        self.check_extends_current(&chain)?;
        save(self.store.as_ref(), CHAIN_KEY, &chain)?;

        let first_new = self.chain.len();
        self.chain = chain;
        self.index_credits(first_new);
        let committed = self.committed_ids(first_new);
        self.pending.retain(|tx| !tx.id.is_some_and(|id| committed.contains(&id)));
        Ok(())
    }

    fn clear_pending(&mut self) -> Result<(), RelayError> {
        self.persist_pending(Vec::new())
    }

    fn discard_pending(&mut self, tx_id: &Hash) -> Result<(), RelayError> {
        let pending = self
            .pending
            .iter()
            .filter(|tx| tx.id.as_ref() != Some(tx_id))
            .cloned()
            .collect();
        self.persist_pending(pending)
    }

    fn has_credit(&self, source_key: &[u8]) -> Result<bool, RelayError> {
        Ok(self.credited.contains(source_key)
            || self.pending.iter().any(|tx| tx.credits_source(source_key)))
    }

    fn locate(&self, tx_id: &Hash) -> Result<Option<(u64, u64)>, RelayError> {
        Ok(self.chain.iter().rev().find_map(|block| {
            block
                .transactions
                .iter()
                .position(|tx| tx.id.as_ref() == Some(tx_id))
                .map(|seq| (block.height, seq as u64))
        }))
    }

    fn local_abstract_headers(
        &self,
        chain_id: &str,
    ) -> Result<Vec<AbstractBlockHeader>, RelayError> {
        Ok(self.chain.iter().map(|b| b.abstract_header(chain_id)).collect())
    }

    fn pack_receipt(
        &self,
        transfer: &CrossTransfer,
        height: u64,
        sequence: u64,
    ) -> Result<CrossTransferReceipt, RelayError> {
        let block = usize::try_from(height)
            .ok()
            .and_then(|h| self.chain.get(h))
            .ok_or_else(|| RelayError::SettlementFailed(format!("no block at height {}", height)))?;
        let ids = block.transaction_ids();
        let index = usize::try_from(sequence)
            .map_err(|_| RelayError::SettlementFailed(format!("sequence {} overflows", sequence)))?;
        let merkle_path = build_merkle_path(&ids, index)?;

        debug!(
            to = %transfer.to,
            value = transfer.value,
            height,
            sequence,
            "Packed cross transfer receipt"
        );

        Ok(CrossTransferReceipt {
            source_chain_id: self.chain_id.clone(),
            proof: MerkleProof {
                trans_hash: ids[index],
                merkle_path,
                merkle_index: sequence,
                height,
            },
        })
    }
}

fn genesis_block() -> Block {
    let merkle_root = [0u8; 32];
    Block {
        height: 0,
        timestamp: 0,
        prev_hash: [0u8; 32],
        hash: Block::compute_hash(0, &[0u8; 32], &merkle_root, 0),
        merkle_root,
        transactions: Vec::new(),
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &[u8],
) -> Result<Option<T>, RelayError> {
    match store.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            RelayError::Store(format!("decode {}: {}", String::from_utf8_lossy(key), e))
        }),
        None => Ok(None),
    }
}

fn save<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &[u8],
    value: &T,
) -> Result<(), RelayError> {
    let bytes = serde_json::to_vec(value)
        .map_err(|e| RelayError::Store(format!("encode {}: {}", String::from_utf8_lossy(key), e)))?;
    store.put(key, &bytes)?;
    Ok(())
}
