//! Vote transactions.

use crate::hash::digest_hex;
use crate::merkle::merkle_root;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors that can occur when building a vote.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("choice {choice} outside candidate range 1..={candidates}")]
    InvalidChoice { choice: u8, candidates: u8 },

    #[error("block id 0 is the genesis block and holds no votes")]
    InvalidBlockId,

    #[error("empty vote id")]
    EmptyId,
}

/// A single vote recorded on the ledger.
///
/// `id` and `choice` never change once created. `block_id` is assigned at
/// ingestion and only rewritten by a resync from backup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Client-generated unique identifier.
    pub id: String,
    /// Candidate number, starting at 1.
    pub choice: u8,
    /// Creation time in seconds since the Unix epoch.
    pub timestamp: f64,
    /// Block this vote is assigned to.
    pub block_id: u64,
}

impl Vote {
    /// Create a vote, validating the choice against `candidates`.
    pub fn new(
        id: impl Into<String>,
        choice: u8,
        timestamp: f64,
        block_id: u64,
        candidates: u8,
    ) -> Result<Self, VoteError> {
        let id = id.into();
        if id.is_empty() {
            return Err(VoteError::EmptyId);
        }
        if choice == 0 || choice > candidates {
            return Err(VoteError::InvalidChoice { choice, candidates });
        }
        if block_id == 0 {
            return Err(VoteError::InvalidBlockId);
        }
        Ok(Self {
            id,
            choice,
            timestamp,
            block_id,
        })
    }

    /// Canonical string form fed to the merkle tree.
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    /// Display fingerprint of this vote (also its merkle leaf).
    pub fn fingerprint(&self) -> String {
        digest_hex(self.serialize().as_bytes())
    }

    /// Ordering used wherever a block's transactions are listed: ascending
    /// timestamp, ties broken by id.
    pub fn ledger_order(a: &Vote, b: &Vote) -> Ordering {
        a.timestamp
            .total_cmp(&b.timestamp)
            .then_with(|| a.id.cmp(&b.id))
    }
}

impl fmt::Display for Vote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{:.6}|{}",
            self.id, self.choice, self.timestamp, self.block_id
        )
    }
}

/// Current wall-clock time in seconds, with microsecond resolution.
pub fn now_timestamp() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
}

/// Merkle root over votes, taken in the order given.
///
/// Callers pass a block's votes in ledger order; see [`sort_votes`].
pub fn votes_merkle_root(votes: &[Vote]) -> String {
    let leaves: Vec<String> = votes.iter().map(Vote::fingerprint).collect();
    merkle_root(&leaves)
}

/// Sort votes in ledger order.
pub fn sort_votes(votes: &mut [Vote]) {
    votes.sort_by(Vote::ledger_order);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(id: &str, ts: f64) -> Vote {
        Vote::new(id, 1, ts, 1, 3).unwrap()
    }

    #[test]
    fn test_new_vote_valid() {
        let v = Vote::new("abc", 3, 10.5, 2, 3).unwrap();
        assert_eq!(v.choice, 3);
        assert_eq!(v.block_id, 2);
    }

    #[test]
    fn test_choice_out_of_range() {
        assert_eq!(
            Vote::new("abc", 4, 1.0, 1, 3),
            Err(VoteError::InvalidChoice {
                choice: 4,
                candidates: 3
            })
        );
        assert!(Vote::new("abc", 0, 1.0, 1, 3).is_err());
    }

    #[test]
    fn test_block_zero_rejected() {
        assert_eq!(Vote::new("abc", 1, 1.0, 0, 3), Err(VoteError::InvalidBlockId));
    }

    #[test]
    fn test_serialize_format() {
        let v = Vote::new("id-1", 2, 1.5, 7, 3).unwrap();
        assert_eq!(v.serialize(), "id-1|2|1.500000|7");
    }

    #[test]
    fn test_fingerprint_changes_with_choice() {
        let a = Vote::new("id-1", 1, 1.5, 7, 3).unwrap();
        let mut b = a.clone();
        b.choice = 2;
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }

    #[test]
    fn test_ledger_order_breaks_ties_by_id() {
        let mut votes = vec![vote("b", 2.0), vote("c", 1.0), vote("a", 2.0)];
        sort_votes(&mut votes);
        let ids: Vec<&str> = votes.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_votes_merkle_root_uses_fingerprints() {
        let votes = vec![vote("a", 1.0), vote("b", 2.0)];
        let leaves = vec![votes[0].fingerprint(), votes[1].fingerprint()];
        assert_eq!(votes_merkle_root(&votes), merkle_root(&leaves));
        assert_eq!(votes_merkle_root(&[]), crate::merkle::empty_root());
    }

    #[test]
    fn test_now_timestamp_is_recent() {
        assert!(now_timestamp() > 1_600_000_000.0);
    }
}
