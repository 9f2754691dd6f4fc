//! Core ledger primitives for votechain.
//!
//! This crate provides the fundamental types used throughout the ledger:
//! - Fingerprints (Blake3 hex digests)
//! - Merkle trees over ordered vote fingerprints
//! - Votes
//! - Blocks, the genesis sentinel and the sealing payload

pub mod block;
pub mod hash;
pub mod merkle;
pub mod vote;

// Re-export commonly used types at the crate root
pub use block::{meets_difficulty, seal_hash, Block, GENESIS_HASH, GENESIS_ID, GENESIS_LINK};
pub use hash::{digest_concat_hex, digest_hex, FINGERPRINT_LEN};
pub use merkle::{empty_root, merkle_root, verify_proof, MerkleProof, MerkleTree};
pub use vote::{now_timestamp, sort_votes, votes_merkle_root, Vote, VoteError};
