//! Proof-of-work sealing.
//!
//! A block is sealed by searching nonces `0, 1, 2, ...` until
//! `digest(prev_hash || merkle_root || nonce || timestamp)` starts with the
//! configured difficulty prefix. The sealing timestamp is captured once,
//! before the search, and stays fixed for every attempt.
//!
//! The search is always bounded: by an attempt budget, and optionally by a
//! wall-clock deadline. A [`CancelToken`] lets another thread abandon it.
//! Nothing is written anywhere while mining; the caller appends the returned
//! block only after the search succeeds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use votechain_core::{
    meets_difficulty, now_timestamp, seal_hash, votes_merkle_root, Block, Vote,
};

/// Default attempt budget for one block.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 10_000_000;

/// How often (in attempts) the deadline and cancel flag are checked.
const CHECK_INTERVAL: u64 = 1024;

/// Errors that can occur while mining.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MiningError {
    #[error("no nonce satisfied prefix {prefix:?} within {attempts} attempts")]
    DifficultyUnsatisfiable { prefix: String, attempts: u64 },

    #[error("mining timed out after {elapsed:?} ({attempts} attempts)")]
    MiningTimeout { elapsed: Duration, attempts: u64 },

    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("invalid difficulty: {0}")]
    InvalidDifficulty(String),
}

pub type Result<T> = std::result::Result<T, MiningError>;

/// Proof-of-work configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowConfig {
    /// Required hash prefix (lowercase hex).
    pub difficulty_prefix: String,
    /// Maximum number of nonces tried per block.
    pub max_attempts: u64,
    /// Optional wall-clock limit per block.
    pub timeout: Option<Duration>,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            difficulty_prefix: "0".to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: None,
        }
    }
}

impl PowConfig {
    /// Create a configuration with the default attempt budget and no deadline.
    pub fn new(difficulty_prefix: impl Into<String>) -> Self {
        Self {
            difficulty_prefix: difficulty_prefix.into(),
            ..Self::default()
        }
    }

    /// Set the attempt budget.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set a wall-clock limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Reject prefixes no hex digest can ever match, and empty budgets.
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.difficulty_prefix;
        if prefix.len() > votechain_core::FINGERPRINT_LEN {
            return Err(MiningError::InvalidDifficulty(format!(
                "prefix longer than a fingerprint ({} chars)",
                prefix.len()
            )));
        }
        if let Some(c) = prefix
            .chars()
            .find(|c| !(c.is_ascii_digit() || ('a'..='f').contains(c)))
        {
            return Err(MiningError::InvalidDifficulty(format!(
                "character {c:?} never appears in a lowercase hex digest"
            )));
        }
        if self.max_attempts == 0 {
            return Err(MiningError::InvalidDifficulty(
                "attempt budget is zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shared flag for abandoning a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A successfully mined block plus search statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct MinedBlock {
    /// The sealed block, ready to append.
    pub block: Block,
    /// Number of hashes computed.
    pub attempts: u64,
    /// Time spent searching.
    pub elapsed: Duration,
}

/// Proof-of-work miner.
#[derive(Debug, Clone)]
pub struct Miner {
    config: PowConfig,
}

impl Miner {
    /// Create a miner, validating its configuration.
    pub fn new(config: PowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub fn config(&self) -> &PowConfig {
        &self.config
    }

    /// Seal block `block_id` on top of `prev_hash` over `votes`.
    ///
    /// `votes` must already be in ledger order. An empty slice is sealed over
    /// the empty merkle root.
    pub fn mine(
        &self,
        block_id: u64,
        prev_hash: &str,
        votes: &[Vote],
        cancel: &CancelToken,
    ) -> Result<MinedBlock> {
        let merkle_root = votes_merkle_root(votes);
        let timestamp = now_timestamp();
        self.search(block_id, prev_hash, merkle_root, timestamp, cancel)
    }

    /// Run the nonce search with a fixed merkle root and timestamp.
    pub fn search(
        &self,
        block_id: u64,
        prev_hash: &str,
        merkle_root: String,
        timestamp: f64,
        cancel: &CancelToken,
    ) -> Result<MinedBlock> {
        let prefix = self.config.difficulty_prefix.as_str();
        let started = Instant::now();
        debug!(block_id, prefix, %merkle_root, "starting nonce search");

        for nonce in 0..self.config.max_attempts {
            if nonce % CHECK_INTERVAL == 0 {
                if cancel.is_cancelled() {
                    return Err(MiningError::Cancelled { attempts: nonce });
                }
                if let Some(limit) = self.config.timeout {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(MiningError::MiningTimeout {
                            elapsed,
                            attempts: nonce,
                        });
                    }
                }
            }

            let hash = seal_hash(prev_hash, &merkle_root, nonce, timestamp);
            if meets_difficulty(&hash, prefix) {
                let elapsed = started.elapsed();
                let attempts = nonce + 1;
                info!(block_id, nonce, attempts, ?elapsed, "block mined");
                return Ok(MinedBlock {
                    block: Block {
                        id: block_id,
                        prev_hash: prev_hash.to_string(),
                        merkle_root,
                        hash,
                        nonce,
                        timestamp,
                    },
                    attempts,
                    elapsed,
                });
            }
        }

        Err(MiningError::DifficultyUnsatisfiable {
            prefix: prefix.to_string(),
            attempts: self.config.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_core::{empty_root, GENESIS_HASH};

    fn votes() -> Vec<Vote> {
        (0..3)
            .map(|i| Vote::new(format!("v{i}"), 1 + (i % 3) as u8, i as f64, 1, 3).unwrap())
            .collect()
    }

    #[test]
    fn test_mined_hash_has_prefix_and_recomputes() {
        let miner = Miner::new(PowConfig::new("00")).unwrap();
        let mined = miner
            .mine(1, GENESIS_HASH, &votes(), &CancelToken::new())
            .unwrap();

        let block = &mined.block;
        assert!(block.hash.starts_with("00"));
        assert_eq!(
            seal_hash(&block.prev_hash, &block.merkle_root, block.nonce, block.timestamp),
            block.hash
        );
        assert_eq!(block.merkle_root, votes_merkle_root(&votes()));
        assert_eq!(mined.attempts, block.nonce + 1);
    }

    #[test]
    fn test_first_matching_nonce_is_chosen() {
        let miner = Miner::new(PowConfig::new("0")).unwrap();
        let root = empty_root();
        let mined = miner
            .search(1, GENESIS_HASH, root.clone(), 42.0, &CancelToken::new())
            .unwrap();

        for nonce in 0..mined.block.nonce {
            assert!(!seal_hash(GENESIS_HASH, &root, nonce, 42.0).starts_with('0'));
        }
    }

    #[test]
    fn test_search_is_reproducible_for_fixed_timestamp() {
        let miner = Miner::new(PowConfig::new("0")).unwrap();
        let a = miner
            .search(1, GENESIS_HASH, empty_root(), 7.0, &CancelToken::new())
            .unwrap();
        let b = miner
            .search(1, GENESIS_HASH, empty_root(), 7.0, &CancelToken::new())
            .unwrap();
        assert_eq!(a.block, b.block);
    }

    #[test]
    fn test_empty_block_is_sealed() {
        let miner = Miner::new(PowConfig::new("0")).unwrap();
        let mined = miner.mine(1, GENESIS_HASH, &[], &CancelToken::new()).unwrap();
        assert_eq!(mined.block.merkle_root, empty_root());
        assert!(mined.block.hash.starts_with('0'));
    }

    #[test]
    fn test_attempt_budget_exhausted() {
        // Eight leading zeros are out of reach in 10 attempts.
        let miner = Miner::new(PowConfig::new("00000000").with_max_attempts(10)).unwrap();
        let result = miner.mine(1, GENESIS_HASH, &votes(), &CancelToken::new());
        assert_eq!(
            result,
            Err(MiningError::DifficultyUnsatisfiable {
                prefix: "00000000".to_string(),
                attempts: 10
            })
        );
    }

    #[test]
    fn test_timeout() {
        let config = PowConfig::new("0000000000000000")
            .with_max_attempts(u64::MAX)
            .with_timeout(Duration::from_millis(20));
        let miner = Miner::new(config).unwrap();
        let result = miner.mine(1, GENESIS_HASH, &votes(), &CancelToken::new());
        assert!(matches!(result, Err(MiningError::MiningTimeout { .. })));
    }

    #[test]
    fn test_cancelled_before_start() {
        let miner = Miner::new(PowConfig::new("0000000000000000").with_max_attempts(u64::MAX))
            .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = miner.mine(1, GENESIS_HASH, &votes(), &cancel);
        assert_eq!(result, Err(MiningError::Cancelled { attempts: 0 }));

        cancel.reset();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        assert!(matches!(
            Miner::new(PowConfig::new("0G")),
            Err(MiningError::InvalidDifficulty(_))
        ));
        assert!(matches!(
            Miner::new(PowConfig::new("AB")),
            Err(MiningError::InvalidDifficulty(_))
        ));
        assert!(matches!(
            Miner::new(PowConfig::new("0").with_max_attempts(0)),
            Err(MiningError::InvalidDifficulty(_))
        ));
        assert!(Miner::new(PowConfig::new("")).is_ok());
    }
}
