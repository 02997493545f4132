//! Merkle inclusion paths over SHA3-256 or Poseidon nodes
//!
//! A tree commits to a vector of leaves, each leaf being a short row of
//! field elements. A proof is the ordered list of sibling digests from leaf
//! to root; **direction bits are derived from the leaf index, LSB first**,
//! never transmitted separately.
//!
//! Leaf and node hashing are domain-separated (`0x00` leaf / `0x01` node
//! prefixes for SHA3; distinct initial accumulators for Poseidon) so a node
//! digest can never be replayed as a leaf.

use ark_ff::PrimeField;
use serde::{Deserialize, Serialize};

use crate::curve::fr_to_be_bytes;
use crate::hashing::sha3_256;
use crate::{poseidon, F};

/// 32-byte node digest.
pub type Digest32 = [u8; 32];

/// Hash function a circuit pins for its commitment trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MerkleHash {
    /// SHA3-256 nodes (byte-oriented).
    #[serde(rename = "sha3-256")]
    Sha3,
    /// Poseidon nodes (field-oriented, pinned parameters).
    #[serde(rename = "poseidon")]
    Poseidon,
}

/// Merkle verification failures.
#[derive(Debug, thiserror::Error)]
pub enum MerkleError {
    /// Recomputed root differs from the committed root.
    #[error("merkle inclusion mismatch at index {index}")]
    Mismatch {
        /// Leaf index whose path failed.
        index: u64,
    },
}

/// Hash a leaf row of field elements.
pub fn hash_leaf(hash: MerkleHash, elems: &[F]) -> Digest32 {
    match hash {
        MerkleHash::Sha3 => {
            let mut bytes = Vec::with_capacity(1 + 32 * elems.len());
            bytes.push(0x00);
            for e in elems {
                bytes.extend_from_slice(&fr_to_be_bytes(e));
            }
            sha3_256(&bytes)
        }
        MerkleHash::Poseidon => fr_to_be_bytes(&poseidon::hash_many(elems)),
    }
}

/// Hash two child digests into their parent.
pub fn hash_nodes(hash: MerkleHash, left: &Digest32, right: &Digest32) -> Digest32 {
    match hash {
        MerkleHash::Sha3 => {
            let mut bytes = Vec::with_capacity(65);
            bytes.push(0x01);
            bytes.extend_from_slice(left);
            bytes.extend_from_slice(right);
            sha3_256(&bytes)
        }
        MerkleHash::Poseidon => {
            // Digests under Poseidon are canonical Fr renderings (< r), so
            // the mod-order conversion is exact.
            let l = F::from_be_bytes_mod_order(left);
            let r = F::from_be_bytes_mod_order(right);
            fr_to_be_bytes(&poseidon::hash2(l, r))
        }
    }
}

/// Verify an inclusion path for `leaf` at `index` against `root`.
pub fn verify_path(
    hash: MerkleHash,
    root: &Digest32,
    leaf: &[F],
    index: u64,
    siblings: &[Digest32],
) -> Result<(), MerkleError> {
    let mut acc = hash_leaf(hash, leaf);
    let mut idx = index;
    for sibling in siblings {
        acc = if idx & 1 == 0 {
            hash_nodes(hash, &acc, sibling)
        } else {
            hash_nodes(hash, sibling, &acc)
        };
        idx >>= 1;
    }
    if &acc == root {
        Ok(())
    } else {
        Err(MerkleError::Mismatch { index })
    }
}

/// Commit to a vector of leaf rows; returns the root.
///
/// Leaf count must be a power of two (callers pad explicitly). Exposed for
/// integration tooling; the verifiers only ever consume paths.
pub fn build_root(hash: MerkleHash, leaves: &[Vec<F>]) -> Digest32 {
    let mut level: Vec<Digest32> = leaves.iter().map(|l| hash_leaf(hash, l)).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| hash_nodes(hash, &pair[0], &pair[1]))
            .collect();
    }
    level.first().copied().unwrap_or([0u8; 32])
}

/// Produce the sibling path for `index`; companion to [`build_root`].
pub fn build_path(hash: MerkleHash, leaves: &[Vec<F>], index: u64) -> Vec<Digest32> {
    let mut level: Vec<Digest32> = leaves.iter().map(|l| hash_leaf(hash, l)).collect();
    let mut idx = index as usize;
    let mut path = Vec::new();
    while level.len() > 1 {
        path.push(level[idx ^ 1]);
        level = level
            .chunks(2)
            .map(|pair| hash_nodes(hash, &pair[0], &pair[1]))
            .collect();
        idx >>= 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: u64) -> Vec<Vec<F>> {
        (0..n).map(|i| vec![F::from(i), F::from(i * i)]).collect()
    }

    #[test]
    fn paths_verify_for_every_index() {
        for hash in [MerkleHash::Sha3, MerkleHash::Poseidon] {
            let ls = leaves(8);
            let root = build_root(hash, &ls);
            for i in 0..8u64 {
                let path = build_path(hash, &ls, i);
                assert_eq!(path.len(), 3);
                verify_path(hash, &root, &ls[i as usize], i, &path).unwrap();
            }
        }
    }

    #[test]
    fn wrong_leaf_is_rejected() {
        let ls = leaves(8);
        let root = build_root(MerkleHash::Sha3, &ls);
        let path = build_path(MerkleHash::Sha3, &ls, 3);
        let tampered = vec![F::from(99u64), F::from(9u64)];
        assert!(matches!(
            verify_path(MerkleHash::Sha3, &root, &tampered, 3, &path),
            Err(MerkleError::Mismatch { index: 3 })
        ));
    }

    #[test]
    fn wrong_index_is_rejected() {
        // Same leaf, same path, wrong index: the LSB-first direction bits
        // walk the other way and the root cannot match.
        let ls = leaves(8);
        let root = build_root(MerkleHash::Sha3, &ls);
        let path = build_path(MerkleHash::Sha3, &ls, 2);
        assert!(verify_path(MerkleHash::Sha3, &root, &ls[2], 3, &path).is_err());
    }

    #[test]
    fn leaf_and_node_domains_are_separated() {
        // A single-element "leaf" carrying a node digest must not hash to
        // that node.
        let ls = leaves(4);
        let l0 = hash_leaf(MerkleHash::Sha3, &ls[0]);
        let l1 = hash_leaf(MerkleHash::Sha3, &ls[1]);
        let node = hash_nodes(MerkleHash::Sha3, &l0, &l1);
        assert_ne!(hash_leaf(MerkleHash::Sha3, &[F::from(0u64)]), node);
    }
}
