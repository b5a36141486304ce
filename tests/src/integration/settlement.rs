//! # Settlement Under Load
//!
//! Concurrent transfers from many connections against one responder ledger,
//! plus restart of a file-backed node.
//!
//! Checked properties:
//! - chain grows by exactly the number of successful settlements
//! - every credit lands in exactly one block
//! - appended blocks stay linked

#[cfg(test)]
mod tests {
    use super::super::*;
    use futures::future::join_all;
    use qc_15_cross_chain_relay::test_utils::{assert_blocks_disjoint, SourceChain};
    use qc_15_cross_chain_relay::{
        CrossTransfer, FileBackedKVStore, Initiator, KeyValueStore, KvLedger, Ledger,
        ResponseEvent,
    };
    use std::collections::HashSet;

    const TRANSFERS: usize = 12;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transfers_settle_atomically() {
        let source = SourceChain::with_block("chain-a", TRANSFERS).unwrap();
        let transfers: Vec<_> = (0..TRANSFERS as u64)
            .map(|seq| source.transfer(seq, "bob", 1).unwrap())
            .collect();
        let a_ctx = context_with_ledger(test_config("chain-a"), Box::new(source.ledger));
        let a = spawn_node(a_ctx).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        // Seed B with A's headers once.
        let mut seed = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        seed.sync_headers().await.unwrap();

        let addr = b.addr.to_string();
        let tasks = transfers.into_iter().map(|transfer| {
            let addr = addr.clone();
            let handlers = a.handlers();
            tokio::spawn(async move {
                let mut initiator = Initiator::connect(&addr, handlers).await.unwrap();
                initiator.send_transfer(&transfer).await
            })
        });

        let mut settled = 0;
        for result in join_all(tasks).await {
            if let Ok(ResponseEvent::Receipt { verified: true, .. }) = result.unwrap() {
                settled += 1;
            }
        }

        assert_eq!(settled, TRANSFERS);
        assert_eq!(b.chain_len(), 1 + TRANSFERS);
        assert_eq!(b.ctx.coordinator.pending_len().unwrap(), 0);

        let headers = b.ctx.coordinator.local_headers().unwrap();
        for (i, pair) in headers.windows(2).enumerate() {
            assert_eq!(pair[1].prev_hash, pair[0].block_hash, "break after height {}", i);
        }
        assert_eq!(assert_blocks_disjoint(&b.ctx.coordinator.chain().unwrap()), TRANSFERS);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replays_settle_once() {
        let source = SourceChain::with_block("chain-a", 1).unwrap();
        let transfer = source.transfer(0, "bob", 9).unwrap();
        let a_ctx = context_with_ledger(test_config("chain-a"), Box::new(source.ledger));
        let a = spawn_node(a_ctx).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut seed = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        seed.sync_headers().await.unwrap();

        let addr = b.addr.to_string();
        let tasks = (0..6).map(|_| {
            let addr = addr.clone();
            let handlers = a.handlers();
            let transfer = transfer.clone();
            tokio::spawn(async move {
                let mut initiator = Initiator::connect(&addr, handlers).await.unwrap();
                initiator.send_transfer(&transfer).await
            })
        });

        let settled = join_all(tasks)
            .await
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(ResponseEvent::Receipt { verified: true, .. }))))
            .count();

        assert_eq!(settled, 1);
        assert_eq!(b.chain_len(), 2);
        assert_eq!(assert_blocks_disjoint(&b.ctx.coordinator.chain().unwrap()), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_replays_with_altered_terms_settle_once() {
        let source = SourceChain::with_block("chain-a", 1).unwrap();
        let original = source.transfer(0, "bob", 3).unwrap();
        let a_ctx = context_with_ledger(test_config("chain-a"), Box::new(source.ledger));
        let a = spawn_node(a_ctx).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers())
            .await
            .unwrap();
        initiator.sync_headers().await.unwrap();
        assert!(matches!(
            initiator.send_transfer(&original).await.unwrap(),
            ResponseEvent::Receipt { verified: true, .. }
        ));

        let replays = [
            CrossTransfer {
                value: 3_000_000,
                ..original.clone()
            },
            CrossTransfer {
                to: "mallory".to_string(),
                ..original
            },
        ];
        for replay in replays {
            let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers())
                .await
                .unwrap();
            assert!(initiator.send_transfer(&replay).await.is_err());
        }

        assert_eq!(b.chain_len(), 2);
        assert_eq!(assert_blocks_disjoint(&b.ctx.coordinator.chain().unwrap()), 1);
    }

    #[tokio::test]
    async fn test_file_backed_node_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.db");

        let source = SourceChain::with_block("chain-a", 2).unwrap();
        let transfer = source.transfer(1, "carol", 40).unwrap();
        let a_ctx = context_with_ledger(test_config("chain-a"), Box::new(source.ledger));
        let a = spawn_node(a_ctx).await;

        {
            let store: Arc<dyn KeyValueStore> = Arc::new(FileBackedKVStore::open(&path).unwrap());
            let ctx = Arc::new(RelayContext::with_store(test_config("chain-b"), store).unwrap());
            let b = spawn_node(ctx).await;

            let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers())
                .await
                .unwrap();
            initiator.sync_headers().await.unwrap();
            assert!(matches!(
                initiator.send_transfer(&transfer).await.unwrap(),
                ResponseEvent::Receipt { verified: true, .. }
            ));
        }

        let store: Arc<dyn KeyValueStore> = Arc::new(FileBackedKVStore::open(&path).unwrap());
        let ledger = KvLedger::open("chain-b", Arc::clone(&store)).unwrap();
        let chain = ledger.current_chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].transactions.len(), 1);
        assert_eq!(chain[1].transactions[0].to, "carol");

        let ctx = RelayContext::with_store(test_config("chain-b"), store).unwrap();
        assert!(ctx.remote_headers.get("chain-a").unwrap().is_some());

        // The restarted node still refuses the replay.
        let b = spawn_node(Arc::new(ctx)).await;
        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        assert!(initiator.send_transfer(&transfer).await.is_err());
        assert_eq!(b.chain_len(), 2);

        let pool: HashSet<_> = chain[1].transaction_ids().into_iter().collect();
        assert_eq!(pool.len(), 1);
    }
}
