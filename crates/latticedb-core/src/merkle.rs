//! Binary Merkle tree over receipt state signatures.
//!
//! The database root commits to every sealed lattice plus the normalized
//! configuration: leaves are the 32-byte `state_sig` values sorted ascending
//! by byte order, with `config_hash` appended as the final leaf. A level
//! with an odd node count duplicates its last node. An internal node is
//! SHA-256(left || right).

use sha2::{Digest, Sha256};

use crate::hash::Sha256Hash;

/// Compute the Merkle root of the given leaves.
///
/// Leaves are used as level-0 nodes directly (no leaf re-hash). An empty
/// leaf set yields SHA-256 of the empty string.
pub fn merkle_root(leaves: &[Sha256Hash]) -> Sha256Hash {
    if leaves.is_empty() {
        return Sha256Hash::hash(b"");
    }

    let mut level: Vec<Sha256Hash> = leaves.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            // Duplicate-last on odd counts.
            let last = *level.last().unwrap();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| {
                let mut hasher = Sha256::new();
                hasher.update(pair[0].as_bytes());
                hasher.update(pair[1].as_bytes());
                Sha256Hash(hasher.finalize().into())
            })
            .collect();
    }
    level[0]
}

/// Compute the database root over lattice state signatures and the config
/// hash.
///
/// State signatures are sorted ascending byte-lex before `config_hash` is
/// appended, so the root is independent of insertion order.
pub fn db_root(state_sigs: &[Sha256Hash], config_hash: Sha256Hash) -> Sha256Hash {
    let mut leaves: Vec<Sha256Hash> = state_sigs.to_vec();
    leaves.sort_unstable();
    leaves.push(config_hash);
    merkle_root(&leaves)
}
