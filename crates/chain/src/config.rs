//! Ledger configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use votechain_consensus::{PowConfig, DEFAULT_MAX_ATTEMPTS};

/// A rejected configuration value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Options recognized by the ledger. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Votes generated per ingest run.
    pub batch_size: usize,
    /// Votes assigned to each block.
    pub tx_per_block: usize,
    /// Most blocks sealed by one seal run.
    pub block_count: u64,
    /// Required hash prefix.
    pub difficulty_prefix: String,
    /// Length of `difficulty_prefix`; must agree with it.
    pub difficulty_length: usize,
    /// Number of candidates; choices run `1..=candidates`.
    pub candidates: u8,
    /// Nonce budget per block.
    pub max_attempts: u64,
    /// Optional per-block mining deadline in seconds.
    pub mining_timeout: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            tx_per_block: 5,
            block_count: 10,
            difficulty_prefix: "0".to_string(),
            difficulty_length: 1,
            candidates: 3,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mining_timeout: None,
        }
    }
}

impl LedgerConfig {
    /// Replace the difficulty prefix, keeping the length in step.
    pub fn with_difficulty(mut self, prefix: impl Into<String>) -> Self {
        self.difficulty_prefix = prefix.into();
        self.difficulty_length = self.difficulty_prefix.len();
        self
    }

    /// Check every option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError("batch_size must be positive".into()));
        }
        if self.tx_per_block == 0 {
            return Err(ConfigError("tx_per_block must be positive".into()));
        }
        if self.block_count == 0 {
            return Err(ConfigError("block_count must be positive".into()));
        }
        if self.candidates == 0 {
            return Err(ConfigError("candidates must be positive".into()));
        }
        if self.difficulty_prefix.is_empty() {
            return Err(ConfigError("difficulty_prefix must not be empty".into()));
        }
        if self.difficulty_prefix.len() != self.difficulty_length {
            return Err(ConfigError(format!(
                "difficulty_length {} does not match prefix {:?}",
                self.difficulty_length, self.difficulty_prefix
            )));
        }
        self.pow_config()
            .validate()
            .map_err(|e| ConfigError(e.to_string()))
    }

    /// Mining settings derived from this configuration.
    pub fn pow_config(&self) -> PowConfig {
        let config = PowConfig::new(self.difficulty_prefix.clone())
            .with_max_attempts(self.max_attempts);
        match self.mining_timeout {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}
