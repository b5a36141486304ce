//! Fixtures shared by unit tests and the workspace integration tests.

#![allow(missing_docs)]

use crate::adapters::{InMemoryKVStore, KvLedger};
use crate::domain::{
    AbstractBlockHeader, Block, CrossTransfer, KVStoreError, LocalTransaction, RelayError,
};
use std::collections::HashSet;
use crate::ports::{KeyValueStore, Ledger};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-memory store whose writes can be made to fail.
#[derive(Default)]
pub struct FlakyKVStore {
    inner: InMemoryKVStore,
    fail_all: AtomicBool,
    fail_after: Mutex<Option<usize>>,
    held: Mutex<bool>,
    released: Condvar,
}

impl FlakyKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `put` until switched off.
    pub fn fail_all_puts(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Let `skip` puts through, fail the next one, then recover.
    pub fn fail_one_put_after(&self, skip: usize) {
        *self.fail_after.lock() = Some(skip);
    }

    /// Block every `put` until [`release_puts`](Self::release_puts).
    pub fn hold_puts(&self) {
        *self.held.lock() = true;
    }

    pub fn release_puts(&self) {
        *self.held.lock() = false;
        self.released.notify_all();
    }

    fn wait_if_held(&self) {
        let mut held = self.held.lock();
        while *held {
            self.released.wait(&mut held);
        }
    }

    fn should_fail(&self) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        let mut countdown = self.fail_after.lock();
        match *countdown {
            Some(0) => {
                *countdown = None;
                true
            }
            Some(n) => {
                *countdown = Some(n - 1);
                false
            }
            None => false,
        }
    }
}

impl KeyValueStore for FlakyKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.wait_if_held();
        if self.should_fail() {
            return Err(KVStoreError::IOError {
                message: "injected write failure".to_string(),
            });
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.inner.delete(key)
    }
}

/// Source chain with one settled block of outgoing transfers at height 1.
pub struct SourceChain {
    pub chain_id: String,
    pub ledger: KvLedger,
}

impl SourceChain {
    /// Build the chain with `tx_count` transactions from `alice`.
    pub fn with_block(chain_id: &str, tx_count: usize) -> Result<Self, RelayError> {
        let mut ledger = KvLedger::open(chain_id, Arc::new(InMemoryKVStore::new()))?;
        for i in 0..tx_count {
            let tx = LocalTransaction {
                from: "alice".to_string(),
                to: format!("escrow-{}", i),
                data: Vec::new(),
                value: 10 + i as u64,
                id: None,
            }
            .seal()?;
            ledger.enqueue(tx)?;
        }
        let txs = ledger.pending_txs()?;
        let block = ledger.build_block(&txs)?;
        let mut chain = ledger.current_chain()?;
        chain.push(block);
        ledger.append_and_persist(chain)?;
        ledger.clear_pending()?;

        Ok(Self {
            chain_id: chain_id.to_string(),
            ledger,
        })
    }

    /// Abstract headers of the source chain.
    pub fn headers(&self) -> Result<Vec<AbstractBlockHeader>, RelayError> {
        self.ledger.local_abstract_headers(&self.chain_id)
    }

    /// Transfer proving the transaction at `sequence` of block 1.
    pub fn transfer(
        &self,
        sequence: u64,
        to: &str,
        value: u64,
    ) -> Result<CrossTransfer, RelayError> {
        let placeholder = CrossTransfer::new(
            self.chain_id.clone(),
            to,
            value,
            crate::domain::MerkleProof {
                trans_hash: [0u8; 32],
                merkle_path: Vec::new(),
                merkle_index: 0,
                height: 1,
            },
        );
        let receipt = self.ledger.pack_receipt(&placeholder, 1, sequence)?;
        Ok(CrossTransfer {
            proof: receipt.proof,
            ..placeholder
        })
    }
}

/// Assert no transaction id appears in two blocks (or twice in one).
///
/// Returns the number of transactions on the chain.
pub fn assert_blocks_disjoint(chain: &[Block]) -> usize {
    let mut seen = HashSet::new();
    let mut total = 0;
    for block in chain {
        for tx in &block.transactions {
            total += 1;
            assert!(
                seen.insert(tx.id_or_zero()),
                "transaction included twice, again at height {}",
                block.height
            );
        }
    }
    total
}

/// `count` headers for `chain_id` with heights `0..count`.
pub fn make_headers(chain_id: &str, count: u64) -> Vec<AbstractBlockHeader> {
    (0..count)
        .map(|h| AbstractBlockHeader {
            chain_id: chain_id.to_string(),
            height: h,
            block_hash: [h as u8 + 1; 32],
            prev_hash: if h == 0 { [0u8; 32] } else { [h as u8; 32] },
            merkle_root: [0xA0 ^ h as u8; 32],
            timestamp: 1000 + h,
        })
        .collect()
}
