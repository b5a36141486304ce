//! # Merkle Inclusion Proofs
//!
//! Index-directed Merkle paths over transaction ids.
//!
//! # Algorithm
//!
//! 1. Start with the leaf as current hash
//! 2. For each sibling, bit `k` of `merkle_index` selects its side:
//!    - bit set: hash = SHA256(sibling || current)
//!    - bit clear: hash = SHA256(current || sibling)
//! 3. Final hash should equal the root
//!
//! The last node of an odd level is paired with itself, so a duplicate only
//! ever appears as a right sibling. A left sibling equal to the running hash
//! is rejected; otherwise flipping the index bit at a duplicated level would
//! still reach the root.

use crate::domain::{Hash, RelayError};
use sha2::{Digest, Sha256};

/// Verify that `leaf` sits at `merkle_index` under `root`.
///
/// # Time Complexity: O(log n)
pub fn verify_merkle_path(
    leaf: &Hash,
    merkle_path: &[Hash],
    merkle_index: u64,
    root: &Hash,
) -> bool {
    // Index bits beyond the path length would be silently ignored otherwise.
    if merkle_path.len() < 64 && merkle_index >> merkle_path.len() != 0 {
        return false;
    }

    let mut current = *leaf;
    let mut index = merkle_index;

    for sibling in merkle_path {
        current = if index & 1 == 1 {
            if *sibling == current {
                return false;
            }
            hash_concat(sibling, &current)
        } else {
            hash_concat(&current, sibling)
        };
        index >>= 1;
    }

    current == *root
}

/// Hash two nodes together.
pub(crate) fn hash_concat(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| hash_concat(&pair[0], pair.get(1).unwrap_or(&pair[0])))
        .collect()
}

/// Merkle root over leaves; zero hash when empty.
pub fn compute_merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Sibling path for the leaf at `index`.
pub fn build_merkle_path(leaves: &[Hash], index: usize) -> Result<Vec<Hash>, RelayError> {
    if index >= leaves.len() {
        return Err(RelayError::SettlementFailed(format!(
            "leaf index {} out of range for {} leaves",
            index,
            leaves.len()
        )));
    }

    let mut path = Vec::new();
    let mut level = leaves.to_vec();
    let mut index = index;

    while level.len() > 1 {
        let sibling = if index % 2 == 0 {
            *level.get(index + 1).unwrap_or(&level[index])
        } else {
            level[index - 1]
        };
        path.push(sibling);
        level = next_level(&level);
        index /= 2;
    }

    Ok(path)
}
