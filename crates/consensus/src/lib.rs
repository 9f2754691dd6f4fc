//! Proof-of-work sealing and tamper verification for votechain.
//!
//! This crate provides:
//! - Nonce search against a hex difficulty prefix, bounded by an attempt
//!   budget and an optional deadline
//! - Merkle recomputation of sealed blocks against their live votes
//! - Seal and linkage validation across the whole chain
//!
//! # Example
//!
//! ```rust,no_run
//! use votechain_consensus::{CancelToken, Miner, PowConfig, Verifier};
//! use votechain_core::{Vote, GENESIS_HASH};
//!
//! let votes = vec![Vote::new("a", 1, 1.0, 1, 3).unwrap()];
//! let miner = Miner::new(PowConfig::new("00")).unwrap();
//! let mined = miner.mine(1, GENESIS_HASH, &votes, &CancelToken::new()).unwrap();
//!
//! assert!(!Verifier::verify(&mined.block, &votes).status.is_tampered());
//! ```

pub mod pow;
pub mod validator;

// Re-export commonly used types
pub use pow::{CancelToken, MinedBlock, Miner, MiningError, PowConfig, DEFAULT_MAX_ATTEMPTS};
pub use validator::{
    BlockValidator, ValidationError, Verification, VerificationStatus, Verifier,
};
