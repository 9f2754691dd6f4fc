//! Tamper verification and seal validation.
//!
//! [`Verifier`] recomputes a block's merkle root from the votes currently
//! assigned to it and compares against the stored root. [`BlockValidator`]
//! checks the seal itself: hash consistency, difficulty and linkage.

use thiserror::Error;
use votechain_core::{meets_difficulty, votes_merkle_root, Block, Vote, GENESIS_LINK};

/// Errors that can occur during seal validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("block id mismatch (expected {expected}, got {got})")]
    InvalidHeight { expected: u64, got: u64 },

    #[error("block {id} prev_hash does not match parent hash")]
    InvalidPrevHash { id: u64 },

    #[error("block {id} hash does not match its sealed fields")]
    HashMismatch { id: u64 },

    #[error("block {id} hash does not start with {prefix:?}")]
    DifficultyNotMet { id: u64, prefix: String },

    #[error("first block is not a genesis block")]
    InvalidGenesis,
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Outcome of re-verifying a block against its live votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStatus {
    Verified,
    Tampered,
}

impl VerificationStatus {
    /// Whether the block was found tampered.
    pub fn is_tampered(&self) -> bool {
        matches!(self, VerificationStatus::Tampered)
    }
}

/// A verification finding for one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// Block that was checked.
    pub block_id: u64,
    /// Merkle root stored in the block.
    pub stored_root: String,
    /// Merkle root recomputed from live votes.
    pub recomputed_root: String,
    /// Verified or tampered.
    pub status: VerificationStatus,
}

/// Merkle recomputation against live data.
pub struct Verifier;

impl Verifier {
    /// Compare `block.merkle_root` against the root of `votes`.
    ///
    /// `votes` must be the block's current transactions in ledger order. The
    /// genesis block carries no votes; it verifies as long as none are
    /// assigned to it.
    pub fn verify(block: &Block, votes: &[Vote]) -> Verification {
        let recomputed_root = if block.is_genesis() && votes.is_empty() {
            GENESIS_LINK.to_string()
        } else {
            votes_merkle_root(votes)
        };

        let status = if recomputed_root == block.merkle_root {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Tampered
        };

        Verification {
            block_id: block.id,
            stored_root: block.merkle_root.clone(),
            recomputed_root,
            status,
        }
    }
}

/// Seal and linkage checks for stored blocks.
pub struct BlockValidator;

impl BlockValidator {
    /// Validate a block's own seal: stored hash reproduces and meets the prefix.
    pub fn validate_seal(block: &Block, difficulty_prefix: &str) -> Result<()> {
        if block.is_genesis() {
            return Ok(());
        }

        if block.compute_hash() != block.hash {
            return Err(ValidationError::HashMismatch { id: block.id });
        }

        if !meets_difficulty(&block.hash, difficulty_prefix) {
            return Err(ValidationError::DifficultyNotMet {
                id: block.id,
                prefix: difficulty_prefix.to_string(),
            });
        }

        Ok(())
    }

    /// Validate block extends the parent correctly.
    pub fn validate_block_extends_parent(block: &Block, parent: &Block) -> Result<()> {
        if block.id != parent.id + 1 {
            return Err(ValidationError::InvalidHeight {
                expected: parent.id + 1,
                got: block.id,
            });
        }

        if block.prev_hash != parent.hash {
            return Err(ValidationError::InvalidPrevHash { id: block.id });
        }

        Ok(())
    }

    /// Walk a whole chain (genesis first) checking every seal and link.
    pub fn validate_chain(blocks: &[Block], difficulty_prefix: &str) -> Result<()> {
        let Some(genesis) = blocks.first() else {
            return Ok(());
        };
        if !genesis.is_genesis() {
            return Err(ValidationError::InvalidGenesis);
        }

        for pair in blocks.windows(2) {
            Self::validate_block_extends_parent(&pair[1], &pair[0])?;
            Self::validate_seal(&pair[1], difficulty_prefix)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::{CancelToken, Miner, PowConfig};
    use votechain_core::{empty_root, GENESIS_HASH};

    fn votes(n: usize) -> Vec<Vote> {
        (0..n)
            .map(|i| Vote::new(format!("v{i}"), 1, i as f64, 1, 3).unwrap())
            .collect()
    }

    fn mine(id: u64, prev_hash: &str, votes: &[Vote]) -> Block {
        Miner::new(PowConfig::new("0"))
            .unwrap()
            .mine(id, prev_hash, votes, &CancelToken::new())
            .unwrap()
            .block
    }

    #[test]
    fn test_untouched_block_verifies() {
        let votes = votes(4);
        let block = mine(1, GENESIS_HASH, &votes);

        let finding = Verifier::verify(&block, &votes);
        assert_eq!(finding.status, VerificationStatus::Verified);
        assert_eq!(finding.recomputed_root, block.merkle_root);
    }

    #[test]
    fn test_deleted_vote_is_tampered() {
        let mut votes = votes(4);
        let block = mine(1, GENESIS_HASH, &votes);

        votes.remove(2);
        assert!(Verifier::verify(&block, &votes).status.is_tampered());
    }

    #[test]
    fn test_mutated_vote_is_tampered() {
        let mut votes = votes(4);
        let block = mine(1, GENESIS_HASH, &votes);

        votes[0].choice = 3;
        let finding = Verifier::verify(&block, &votes);
        assert_eq!(finding.status, VerificationStatus::Tampered);
        assert_ne!(finding.recomputed_root, finding.stored_root);
    }

    #[test]
    fn test_empty_block_verifies() {
        let block = mine(1, GENESIS_HASH, &[]);
        assert_eq!(block.merkle_root, empty_root());
        assert_eq!(
            Verifier::verify(&block, &[]).status,
            VerificationStatus::Verified
        );
    }

    #[test]
    fn test_genesis_verifies() {
        let genesis = Block::genesis(1.0);
        assert_eq!(
            Verifier::verify(&genesis, &[]).status,
            VerificationStatus::Verified
        );
    }

    #[test]
    fn test_validate_chain() {
        let genesis = Block::genesis(1.0);
        let b1 = mine(1, &genesis.hash, &votes(2));
        let b2 = mine(2, &b1.hash, &votes(3));

        let chain = vec![genesis.clone(), b1.clone(), b2.clone()];
        assert!(BlockValidator::validate_chain(&chain, "0").is_ok());

        let mut forged = b2.clone();
        forged.prev_hash = "ff".to_string();
        let broken = vec![genesis.clone(), b1.clone(), forged];
        assert_eq!(
            BlockValidator::validate_chain(&broken, "0"),
            Err(ValidationError::InvalidPrevHash { id: 2 })
        );

        let mut rewritten = b1.clone();
        rewritten.merkle_root = empty_root();
        assert_eq!(
            BlockValidator::validate_seal(&rewritten, "0"),
            Err(ValidationError::HashMismatch { id: 1 })
        );

        assert!(matches!(
            BlockValidator::validate_chain(&[b1], "0"),
            Err(ValidationError::InvalidGenesis)
        ));
    }

    #[test]
    fn test_difficulty_not_met() {
        let block = mine(1, GENESIS_HASH, &votes(1));
        // A fresh prefix the hash almost certainly lacks.
        let prefix = if block.hash.starts_with("0f") { "0e" } else { "0f" };
        assert!(matches!(
            BlockValidator::validate_seal(&block, prefix),
            Err(ValidationError::DifficultyNotMet { .. })
        ));
    }
}
