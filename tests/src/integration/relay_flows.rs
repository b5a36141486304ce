//! # Relay Flows
//!
//! End-to-end protocol exchanges between two relay nodes:
//!
//! 1. **Liveness**: `PING` → `PONG`, no state change
//! 2. **Diagnostics**: unknown type code → echo
//! 3. **Header sync**: both directions, idempotent overwrite
//! 4. **Transfer**: verified proof settles and returns a verifiable receipt
//! 5. **Tampered transfer**: silence (or `REJECT` when enabled), no state change

#[cfg(test)]
mod tests {
    use super::super::*;
    use qc_15_cross_chain_relay::test_utils::SourceChain;
    use qc_15_cross_chain_relay::{
        AbstractBlockHeader, Envelope, ExchangeState, Initiator, RelayError, ResponseEvent,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Source chain `chain-a` with `txs` outgoing transactions, served as a node.
    async fn source_node(
        txs: usize,
        config: RelayConfig,
    ) -> (RunningNode, Vec<AbstractBlockHeader>, SourceChain) {
        let source = SourceChain::with_block("chain-a", txs).unwrap();
        let headers = source.headers().unwrap();
        // The fixture keeps its own copy of the chain for building proofs.
        let fixture = SourceChain::with_block("chain-a", txs).unwrap();
        let node = spawn_node(context_with_ledger(config, Box::new(source.ledger))).await;
        (node, headers, fixture)
    }

    // =============================================================================
    // LIVENESS AND DIAGNOSTICS
    // =============================================================================

    #[tokio::test]
    async fn test_ping_pong_over_tcp() {
        let b = spawn_fresh_node(test_config("chain-b")).await;
        let a = spawn_fresh_node(test_config("chain-a")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.ping().await.unwrap();

        assert_eq!(b.chain_len(), 1);
        assert_eq!(b.ctx.coordinator.pending_len().unwrap(), 0);
        assert!(b.ctx.remote_headers.get("chain-a").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_type_echo_over_tcp() {
        let b = spawn_fresh_node(test_config("chain-b")).await;
        let a = spawn_fresh_node(test_config("chain-a")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        let events = initiator.exchange(&Envelope::new(999, "hi")).await.unwrap();

        match events.as_slice() {
            [ResponseEvent::Echo(content)] => assert!(content.contains("hi")),
            other => panic!("unexpected events {:?}", other),
        }
        assert_eq!(b.chain_len(), 1);
    }

    #[tokio::test]
    async fn test_many_exchanges_on_one_connection() {
        let b = spawn_fresh_node(test_config("chain-b")).await;
        let a = spawn_fresh_node(test_config("chain-a")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        for _ in 0..10 {
            initiator.ping().await.unwrap();
        }
        initiator.sync_headers().await.unwrap();
        initiator.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_dial_refused() {
        let a = spawn_fresh_node(test_config("chain-a")).await;
        let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = reserved.local_addr().unwrap();
        drop(reserved);

        let result = Initiator::connect(&addr.to_string(), a.handlers()).await;
        assert!(matches!(result, Err(RelayError::Transport(_))));
    }

    // =============================================================================
    // HEADER SYNC
    // =============================================================================

    #[tokio::test]
    async fn test_header_sync_both_directions() {
        let (a, a_headers, _) = source_node(3, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        // A dials B.
        let mut to_b = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        to_b.sync_headers().await.unwrap();
        assert_eq!(b.ctx.remote_headers.get("chain-a").unwrap(), Some(a_headers.clone()));
        assert_eq!(a.ctx.remote_headers.get("chain-b").unwrap().map(|h| h.len()), Some(1));

        // B dials A: the reply path is symmetric.
        let mut to_a = Initiator::connect(&a.addr.to_string(), b.handlers()).await.unwrap();
        let event = to_a.sync_headers().await.unwrap();
        assert_eq!(
            event,
            ResponseEvent::HeadersSynced {
                chain_id: "chain-a".to_string(),
                count: a_headers.len()
            }
        );
        assert_eq!(to_a.state(), ExchangeState::Synced);
    }

    #[tokio::test]
    async fn test_repeated_sync_is_idempotent() {
        let (a, a_headers, _) = source_node(2, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.sync_headers().await.unwrap();
        initiator.sync_headers().await.unwrap();

        assert_eq!(b.ctx.remote_headers.get("chain-a").unwrap(), Some(a_headers));
    }

    #[tokio::test]
    async fn test_empty_header_sync_gets_no_reply() {
        let b = spawn_fresh_node(test_config("chain-b")).await;
        let a = spawn_fresh_node(test_config("chain-a")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        let err = initiator.exchange(&Envelope::header_sync(&[]).unwrap()).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }));

        // The session survives the malformed request.
        initiator.ping().await.unwrap();
    }

    // =============================================================================
    // TRANSFERS
    // =============================================================================

    #[tokio::test]
    async fn test_transfer_settles_with_verified_receipt() {
        let (a, _, fixture) = source_node(4, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.sync_headers().await.unwrap();

        let transfer = fixture.transfer(2, "bob", 25).unwrap();
        let event = initiator.send_transfer(&transfer).await.unwrap();

        match event {
            ResponseEvent::Receipt { receipt, verified } => {
                assert!(verified);
                assert_eq!(receipt.source_chain_id, "chain-b");
                assert_eq!(receipt.proof.height, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(initiator.state(), ExchangeState::Settled);
        assert_eq!(b.chain_len(), 2);
        assert_eq!(b.ctx.coordinator.pending_len().unwrap(), 0);

        // A's copy of B's headers now includes the settling block.
        assert_eq!(a.ctx.remote_headers.get("chain-b").unwrap().map(|h| h.len()), Some(2));
    }

    #[tokio::test]
    async fn test_tampered_transfer_is_silently_dropped() {
        let (a, _, fixture) = source_node(2, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.sync_headers().await.unwrap();

        let mut transfer = fixture.transfer(0, "bob", 25).unwrap();
        transfer.proof.trans_hash[5] ^= 0x01;
        let err = initiator.send_transfer(&transfer).await.unwrap_err();

        assert!(matches!(err, RelayError::Timeout { .. }));
        assert_eq!(b.chain_len(), 1);
        assert_eq!(b.ctx.coordinator.pending_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tampered_transfer_rejected_when_enabled() {
        let (a, _, fixture) = source_node(2, test_config("chain-a")).await;
        let b = spawn_fresh_node(RelayConfig {
            reject_on_verification_failure: true,
            ..test_config("chain-b")
        })
        .await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.sync_headers().await.unwrap();

        let mut transfer = fixture.transfer(1, "bob", 25).unwrap();
        transfer.proof.merkle_path[0][0] ^= 0x80;
        match initiator.send_transfer(&transfer).await.unwrap() {
            ResponseEvent::Rejected(rejection) => {
                assert_eq!(rejection.trans_hash, Some(transfer.proof.trans_hash));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(initiator.state(), ExchangeState::Rejected);
        assert_eq!(b.chain_len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_before_sync_is_dropped() {
        let (a, _, fixture) = source_node(1, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        let transfer = fixture.transfer(0, "bob", 1).unwrap();
        assert!(initiator.send_transfer(&transfer).await.is_err());
        assert_eq!(b.chain_len(), 1);
    }

    #[tokio::test]
    async fn test_sequential_transfers_on_one_connection() {
        let (a, _, fixture) = source_node(3, test_config("chain-a")).await;
        let b = spawn_fresh_node(test_config("chain-b")).await;

        let mut initiator = Initiator::connect(&b.addr.to_string(), a.handlers()).await.unwrap();
        initiator.sync_headers().await.unwrap();

        for seq in 0..3u64 {
            let transfer = fixture.transfer(seq, "bob", 5).unwrap();
            match initiator.send_transfer(&transfer).await.unwrap() {
                ResponseEvent::Receipt { verified, receipt } => {
                    assert!(verified);
                    assert_eq!(receipt.proof.height, seq + 1);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(b.chain_len(), 4);
    }
}
