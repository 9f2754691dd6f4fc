//! Merkle tree over ordered transaction fingerprints.
//!
//! Leaves are hex fingerprints. A parent is `digest(left || right)` over the
//! two hex strings. An odd level duplicates its last node. The root of an
//! empty tree is [`empty_root`].

use crate::hash::{digest_concat_hex, digest_hex};

/// Root used for a block that carries no transactions: `digest("")`.
pub fn empty_root() -> String {
    digest_hex(b"")
}

fn combine(left: &str, right: &str) -> String {
    digest_concat_hex(&[left, right])
}

/// Compute the merkle root of a list of leaf fingerprints.
pub fn merkle_root(leaves: &[String]) -> String {
    MerkleTree::new(leaves).root().to_string()
}

/// A merkle tree that keeps every level, for inclusion proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level (leaves first).
    levels: Vec<Vec<String>>,
    /// Number of real leaves (zero for the empty tree).
    leaves: usize,
}

/// A merkle proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: String,
    /// Sibling fingerprints from leaf to root.
    pub siblings: Vec<String>,
    /// Direction for each sibling (true = sibling sits on the right).
    pub directions: Vec<bool>,
}

impl MerkleTree {
    /// Build a merkle tree from a list of leaf fingerprints.
    pub fn new(leaves: &[String]) -> Self {
        if leaves.is_empty() {
            return Self {
                levels: vec![vec![empty_root()]],
                leaves: 0,
            };
        }

        let mut levels: Vec<Vec<String>> = vec![leaves.to_vec()];

        loop {
            let current = &levels[levels.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next: Vec<String> = current
                .chunks(2)
                .map(|chunk| match chunk {
                    [left, right] => combine(left, right),
                    [last] => combine(last, last),
                    _ => unreachable!("chunks(2) yields one or two items"),
                })
                .collect();
            levels.push(next);
        }

        Self {
            levels,
            leaves: leaves.len(),
        }
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> &str {
        &self.levels[self.levels.len() - 1][0]
    }

    /// Get the number of leaves in the tree. An empty tree has none.
    pub fn leaf_count(&self) -> usize {
        self.leaves
    }

    /// Generate a proof for the leaf at the given index.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let leaf = self.levels[0][index].clone();
        let mut siblings = Vec::new();
        let mut directions = Vec::new();
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let is_right = idx % 2 == 0;
            let sibling_idx = if is_right { idx + 1 } else { idx - 1 };

            let sibling = level.get(sibling_idx).unwrap_or(&level[idx]);

            siblings.push(sibling.clone());
            directions.push(is_right);
            idx /= 2;
        }

        Some(MerkleProof {
            leaf,
            siblings,
            directions,
        })
    }
}

/// Verify a merkle proof against a given root.
pub fn verify_proof(root: &str, proof: &MerkleProof) -> bool {
    let mut current = proof.leaf.clone();

    for (sibling, is_right) in proof.siblings.iter().zip(proof.directions.iter()) {
        current = if *is_right {
            combine(&current, sibling)
        } else {
            combine(sibling, &current)
        };
    }

    current == root
}
