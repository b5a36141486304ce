//! SHA-256 Merkle verifier adapter.

use crate::algorithms::verify_merkle_path;
use crate::domain::Hash;
use crate::ports::MerkleVerifier;

/// Verifies index-directed SHA-256 Merkle paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256MerkleVerifier;

impl MerkleVerifier for Sha256MerkleVerifier {
    fn verify(
        &self,
        trans_hash: &Hash,
        merkle_path: &[Hash],
        merkle_index: u64,
        root: &Hash,
    ) -> bool {
        verify_merkle_path(trans_hash, merkle_path, merkle_index, root)
    }
}
