//! Sealed blocks and the genesis sentinel.

use crate::hash::digest_hex;
use serde::{Deserialize, Serialize};

/// Id held by the genesis block. Vote-bearing blocks start at 1.
pub const GENESIS_ID: u64 = 0;

/// Linkage value stored in the genesis block's `prev_hash` and `merkle_root`.
pub const GENESIS_LINK: &str = "0";

/// Sentinel hash of the genesis block. It is never mined.
pub const GENESIS_HASH: &str = "genesis";

/// A block on the chain.
///
/// `hash` is `digest(prev_hash || merkle_root || nonce || timestamp)` for every
/// mined block; the genesis block carries sentinel values instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Sequential id; 0 is genesis.
    pub id: u64,
    /// Hash of the previous block (`"0"` for genesis).
    pub prev_hash: String,
    /// Merkle root over the block's votes (`"0"` for genesis).
    pub merkle_root: String,
    /// Mined fingerprint.
    pub hash: String,
    /// Winning nonce (0 for genesis).
    pub nonce: u64,
    /// Sealing time in seconds since the Unix epoch.
    pub timestamp: f64,
}

impl Block {
    /// Create the genesis block.
    pub fn genesis(timestamp: f64) -> Self {
        Self {
            id: GENESIS_ID,
            prev_hash: GENESIS_LINK.to_string(),
            merkle_root: GENESIS_LINK.to_string(),
            hash: GENESIS_HASH.to_string(),
            nonce: 0,
            timestamp,
        }
    }

    /// Check if this is the genesis block.
    pub fn is_genesis(&self) -> bool {
        self.id == GENESIS_ID && self.prev_hash == GENESIS_LINK && self.hash == GENESIS_HASH
    }

    /// Recompute the seal hash from the stored fields.
    pub fn compute_hash(&self) -> String {
        seal_hash(&self.prev_hash, &self.merkle_root, self.nonce, self.timestamp)
    }

    /// Whether the stored hash is the one its fields produce.
    pub fn hash_is_consistent(&self) -> bool {
        self.is_genesis() || self.compute_hash() == self.hash
    }
}

/// The sealing payload as it is hashed: the four fields concatenated.
pub fn seal_payload(prev_hash: &str, merkle_root: &str, nonce: u64, timestamp: f64) -> String {
    format!("{prev_hash}{merkle_root}{nonce}{timestamp:.6}")
}

/// Hash of a sealing attempt.
pub fn seal_hash(prev_hash: &str, merkle_root: &str, nonce: u64, timestamp: f64) -> String {
    digest_hex(seal_payload(prev_hash, merkle_root, nonce, timestamp).as_bytes())
}

/// The difficulty predicate: an exact, case-sensitive prefix match.
pub fn meets_difficulty(hash: &str, prefix: &str) -> bool {
    hash.starts_with(prefix)
}
