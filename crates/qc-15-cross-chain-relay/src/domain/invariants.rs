//! # Domain Invariants
//!
//! Rules the header-sync and verification paths rely on.

use super::entities::AbstractBlockHeader;
use super::errors::RelayError;
use super::value_objects::MerkleProof;

/// Key prefix for remote header records.
pub const REMOTE_HEADERS_KEY_PREFIX: &str = "remote_headers:";

/// Default upper bound for one frame payload (4 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Invariant: a synced header sequence is non-empty, comes from a single
/// chain and satisfies `headers[i].height == i`.
///
/// Returns the chain id the sequence belongs to.
pub fn invariant_header_sequence(headers: &[AbstractBlockHeader]) -> Result<&str, RelayError> {
    let first = headers
        .first()
        .ok_or_else(|| RelayError::MalformedPayload("empty header sequence".to_string()))?;

    for (i, header) in headers.iter().enumerate() {
        if header.height != i as u64 {
            return Err(RelayError::MalformedPayload(format!(
                "header at position {} has height {}",
                i, header.height
            )));
        }
        if header.chain_id != first.chain_id {
            return Err(RelayError::MalformedPayload(format!(
                "mixed chain ids in header sequence: {} and {}",
                first.chain_id, header.chain_id
            )));
        }
    }

    Ok(&first.chain_id)
}

/// Invariant: `0 <= proof.height < len(stored)`.
///
/// Out-of-range heights are verification failures, never index panics.
pub fn invariant_proof_height<'a>(
    proof: &MerkleProof,
    stored: &'a [AbstractBlockHeader],
) -> Result<&'a AbstractBlockHeader, RelayError> {
    let header = usize::try_from(proof.height)
        .ok()
        .and_then(|h| stored.get(h))
        .ok_or_else(|| {
            RelayError::VerificationFailure(format!(
                "proof height {} outside stored headers [0, {})",
                proof.height,
                stored.len()
            ))
        })?;

    if header.height != proof.height {
        return Err(RelayError::VerificationFailure(format!(
            "stored header at {} reports height {}",
            proof.height, header.height
        )));
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(chain: &str, n: u64) -> Vec<AbstractBlockHeader> {
        (0..n)
            .map(|h| AbstractBlockHeader {
                chain_id: chain.to_string(),
                height: h,
                block_hash: [h as u8; 32],
                prev_hash: [0u8; 32],
                merkle_root: [h as u8; 32],
                timestamp: 0,
            })
            .collect()
    }

    fn proof_at(height: u64) -> MerkleProof {
        MerkleProof {
            trans_hash: [0u8; 32],
            merkle_path: vec![],
            merkle_index: 0,
            height,
        }
    }

    #[test]
    fn test_empty_sequence_is_malformed() {
        assert!(matches!(
            invariant_header_sequence(&[]),
            Err(RelayError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_valid_sequence_returns_chain_id() {
        let hs = headers("chain-a", 3);
        assert_eq!(invariant_header_sequence(&hs).unwrap(), "chain-a");
    }

    #[test]
    fn test_height_gap_rejected() {
        let mut hs = headers("chain-a", 3);
        hs[2].height = 5;
        assert!(invariant_header_sequence(&hs).is_err());
    }

    #[test]
    fn test_mixed_chains_rejected() {
        let mut hs = headers("chain-a", 2);
        hs[1].chain_id = "chain-b".to_string();
        assert!(invariant_header_sequence(&hs).is_err());
    }

    #[test]
    fn test_proof_height_in_range() {
        let hs = headers("chain-a", 3);
        assert_eq!(invariant_proof_height(&proof_at(2), &hs).unwrap().height, 2);
    }

    #[test]
    fn test_proof_height_out_of_range_is_verification_failure() {
        let hs = headers("chain-a", 3);
        for h in [3, 4, u64::MAX] {
            assert!(matches!(
                invariant_proof_height(&proof_at(h), &hs),
                Err(RelayError::VerificationFailure(_))
            ));
        }
        assert!(invariant_proof_height(&proof_at(0), &[]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_proof_height_accepted_iff_stored(len in 0u64..64, height in 0u64..128) {
            let hs = headers("chain-a", len);
            let result = invariant_proof_height(&proof_at(height), &hs);
            proptest::prop_assert_eq!(result.is_ok(), height < len);
        }
    }
}
