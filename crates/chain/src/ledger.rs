//! The ledger facade.
//!
//! This module brings together the stores, the miner, the verifier and the
//! synchronizer behind the operations a client calls: ingest, seal, list,
//! detail, verify and sync.

use crate::config::{ConfigError, LedgerConfig};
use crate::locks::BlockLocks;
use crate::sync::{SyncReport, Synchronizer};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use votechain_consensus::{
    BlockValidator, CancelToken, Miner, MiningError, ValidationError, Verification, Verifier,
};
use votechain_core::{now_timestamp, verify_proof, Block, MerkleProof, MerkleTree, Vote, VoteError};
use votechain_storage::{BackupStore, ChainStore, DualWriter, Storage, StorageError, VoteStore};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("mining error: {0}")]
    Mining(#[from] MiningError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid vote: {0}")]
    InvalidVote(#[from] VoteError),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("vote not found: {0}")]
    VoteNotFound(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Outcome of sealing one block.
#[derive(Debug, Clone, PartialEq)]
pub struct SealSummary {
    pub block_id: u64,
    pub hash: String,
    pub nonce: u64,
    /// Hashes computed before the winning nonce was found.
    pub attempts: u64,
    /// Votes covered by the merkle root.
    pub transactions: usize,
    pub elapsed: Duration,
}

/// A block together with its live transactions and a fresh verification.
#[derive(Debug, Clone)]
pub struct BlockDetail {
    pub block: Block,
    /// Live votes assigned to the block, in ledger order.
    pub transactions: Vec<Vote>,
    pub verification: Verification,
    /// Blocks built on top of this one, itself included.
    pub confirmations: u64,
    pub previous: Option<u64>,
    pub next: Option<u64>,
}

/// A live vote as listed to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub vote: Vote,
    pub fingerprint: String,
    /// Hash of the vote's block, if that block is sealed.
    pub block_hash: Option<String>,
}

/// Proof that a vote is a leaf of its block's stored merkle root.
#[derive(Debug, Clone)]
pub struct InclusionProof {
    pub vote: Vote,
    pub block_id: u64,
    pub merkle_root: String,
    pub proof: MerkleProof,
    /// Whether `proof` leads to `merkle_root`.
    pub valid: bool,
}

/// Ledger statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    /// Number of mined blocks.
    pub height: u64,
    /// Hash of the highest block.
    pub tip: Option<String>,
    pub live_votes: usize,
    pub backup_votes: usize,
}

/// Single-writer vote ledger.
///
/// Every seal runs under one ledger-wide lock covering read tip, mine and
/// append. Per-block locks keep a repair of block `k` from overlapping the
/// mining of block `k`.
pub struct Ledger<'a> {
    storage: &'a Storage,
    votes: VoteStore,
    backup: BackupStore,
    chain: ChainStore,
    config: LedgerConfig,
    miner: Miner,
    seal_lock: Mutex<()>,
    block_locks: BlockLocks,
    cancel: CancelToken,
}

impl<'a> Ledger<'a> {
    /// Open the ledger over `storage`, validating `config`.
    pub fn new(storage: &'a Storage, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        let miner = Miner::new(config.pow_config())?;

        Ok(Self {
            storage,
            votes: VoteStore::new(storage)?,
            backup: BackupStore::new(storage)?,
            chain: ChainStore::new(storage)?,
            config,
            miner,
            seal_lock: Mutex::new(()),
            block_locks: BlockLocks::new(),
            cancel: CancelToken::new(),
        })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// The live vote store.
    pub fn votes(&self) -> &VoteStore {
        &self.votes
    }

    /// The backup mirror.
    pub fn backup(&self) -> &BackupStore {
        &self.backup
    }

    pub fn chain(&self) -> &ChainStore {
        &self.chain
    }

    /// A handle that abandons the running seal when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Return the genesis block, creating it if the chain is empty.
    pub fn ensure_genesis(&self) -> Result<Block> {
        Ok(self.chain.ensure_genesis()?)
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Start a fresh run: drop pending votes from both stores, then append
    /// `batch_size` random votes, `tx_per_block` to a block, numbered from the
    /// first unsealed block id.
    ///
    /// Sealed blocks keep their votes, so they still verify. Writes fan out
    /// over worker threads; every vote goes through the paired live/backup
    /// write.
    pub fn ingest(&self, batch_size: usize, tx_per_block: usize) -> Result<usize> {
        if tx_per_block == 0 {
            return Err(ConfigError("tx_per_block must be positive".into()).into());
        }

        let _seal = self.lock_seal();
        self.chain.ensure_genesis()?;

        let height = self.chain.height()?;
        let cleared = self.votes.prune_outside(1..=height)?;
        self.backup.discard_above(height)?;
        debug!(cleared, height, "starting fresh ingest run");

        let batch = self.generate_votes(height + 1, batch_size, tx_per_block)?;
        let writer = DualWriter::new(&self.votes, &self.backup);
        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .clamp(1, batch.len().max(1));
        let chunk_size = batch.len().div_ceil(workers).max(1);

        thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(chunk_size)
                .map(|chunk| s.spawn(move || chunk.iter().try_for_each(|vote| writer.append(vote))))
                .collect();

            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect::<std::result::Result<Vec<()>, StorageError>>()
        })?;

        self.storage.flush()?;
        let last_block = batch.last().map(|v| v.block_id).unwrap_or(height);
        info!(votes = batch.len(), first_block = height + 1, last_block, workers, "ingested votes");
        Ok(batch.len())
    }

    fn generate_votes(
        &self,
        first_block: u64,
        batch_size: usize,
        tx_per_block: usize,
    ) -> Result<Vec<Vote>> {
        let mut rng = rand::thread_rng();
        let mut timestamp = 0.0_f64;
        let mut batch = Vec::with_capacity(batch_size);

        for index in 0..batch_size {
            // Strictly increasing, so ledger order is creation order.
            timestamp = now_timestamp().max(timestamp + 1e-6);
            let block_id = first_block + (index / tx_per_block) as u64;
            let choice = rng.gen_range(1..=self.config.candidates);
            batch.push(Vote::new(
                Uuid::new_v4().to_string(),
                choice,
                timestamp,
                block_id,
                self.config.candidates,
            )?);
        }
        Ok(batch)
    }

    // =========================================================================
    // Sealing
    // =========================================================================

    /// Seal every block that has assigned votes and is not yet sealed, in id
    /// order, at most `block_count` of them per run.
    ///
    /// A mining failure stops the run; blocks sealed before it stay on the
    /// chain and nothing partial is appended.
    pub fn seal(&self) -> Result<Vec<SealSummary>> {
        let _seal = self.lock_seal();
        self.cancel.reset();
        self.chain.ensure_genesis()?;

        let height = self.chain.height()?;
        let first = height + 1;
        let highest_assigned = self.votes.block_ids()?.last().copied().unwrap_or(0);
        let last = highest_assigned.min(height + self.config.block_count);

        let mut sealed = Vec::new();
        for block_id in first..=last {
            sealed.push(self.seal_block(block_id)?);
        }

        if sealed.is_empty() {
            debug!(first, last, "nothing to seal");
        } else {
            self.storage.flush()?;
            info!(blocks = sealed.len(), height = last, "sealing finished");
        }
        Ok(sealed)
    }

    fn seal_block(&self, block_id: u64) -> Result<SealSummary> {
        let _block = self.block_locks.lock(block_id);

        let transactions = self.votes.transactions_for_block(block_id)?;
        let prev_hash = self.chain.tip()?;
        let mined = self
            .miner
            .mine(block_id, &prev_hash, &transactions, &self.cancel)?;
        self.chain.append_block(&mined.block)?;

        Ok(SealSummary {
            block_id,
            hash: mined.block.hash,
            nonce: mined.block.nonce,
            attempts: mined.attempts,
            transactions: transactions.len(),
            elapsed: mined.elapsed,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Every block, genesis first.
    pub fn list_blocks(&self) -> Result<Vec<Block>> {
        self.chain.ensure_genesis()?;
        Ok(self.chain.all_blocks()?)
    }

    /// Look a block up by hash, or by id when no hash matches.
    pub fn find_block(&self, key: &str) -> Result<Block> {
        if let Some(block) = self.chain.get_block_by_hash(key)? {
            return Ok(block);
        }
        let by_id = match key.parse::<u64>() {
            Ok(id) => self.chain.get_block(id)?,
            Err(_) => None,
        };
        by_id.ok_or_else(|| LedgerError::BlockNotFound(key.to_string()))
    }

    /// A block, its live transactions and a fresh verification.
    pub fn block_detail(&self, key: &str) -> Result<BlockDetail> {
        self.chain.ensure_genesis()?;
        let block = self.find_block(key)?;
        let height = self.chain.height()?;

        let (transactions, verification) = self.verify_with_transactions(&block)?;
        let previous = block.id.checked_sub(1);
        let next = Some(block.id + 1).filter(|next| *next <= height);

        Ok(BlockDetail {
            confirmations: height - block.id + 1,
            block,
            transactions,
            verification,
            previous,
            next,
        })
    }

    /// Votes per candidate, `(choice, count)` for every candidate.
    pub fn tally(&self) -> Result<Vec<(u8, usize)>> {
        (1..=self.config.candidates)
            .map(|choice| -> Result<(u8, usize)> {
                Ok((choice, self.votes.count_by_choice(choice)?))
            })
            .collect()
    }

    /// Live votes in ledger order with fingerprints and sealing block hashes.
    pub fn transactions(&self, limit: Option<usize>) -> Result<Vec<TransactionRecord>> {
        let mut hashes: HashMap<u64, Option<String>> = HashMap::new();
        let votes = self.votes.all()?;
        let take = limit.unwrap_or(votes.len());

        let mut records = Vec::with_capacity(take.min(votes.len()));
        for vote in votes.into_iter().take(take) {
            let block_hash = match hashes.get(&vote.block_id) {
                Some(hash) => hash.clone(),
                None => {
                    let hash = self.chain.get_block(vote.block_id)?.map(|b| b.hash);
                    hashes.insert(vote.block_id, hash.clone());
                    hash
                }
            };
            records.push(TransactionRecord {
                fingerprint: vote.fingerprint(),
                vote,
                block_hash,
            });
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        Ok(LedgerStats {
            height: self.chain.height()?,
            tip: self.chain.latest_block()?.map(|b| b.hash),
            live_votes: self.votes.len()?,
            backup_votes: self.backup.len()?,
        })
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Recompute one block's merkle root from its live votes.
    pub fn verify_block(&self, block_id: u64) -> Result<Verification> {
        let block = self
            .chain
            .get_block(block_id)?
            .ok_or_else(|| LedgerError::BlockNotFound(block_id.to_string()))?;
        Ok(self.verify_with_transactions(&block)?.1)
    }

    /// Verify the `n` most recently mined blocks, lowest id first.
    pub fn verify_recent(&self, n: u64) -> Result<Vec<Verification>> {
        let mut blocks = self.chain.get_recent_blocks(n)?;
        blocks.retain(|b| !b.is_genesis());
        blocks.reverse();

        blocks
            .iter()
            .map(|block| self.verify_with_transactions(block).map(|(_, verification)| verification))
            .collect()
    }

    fn verify_with_transactions(&self, block: &Block) -> Result<(Vec<Vote>, Verification)> {
        let _block = self.block_locks.lock(block.id);
        let transactions = self.votes.transactions_for_block(block.id)?;
        let verification = Verifier::verify(block, &transactions);

        if verification.status.is_tampered() {
            warn!(
                block_id = block.id,
                stored = %verification.stored_root,
                recomputed = %verification.recomputed_root,
                "block tampered"
            );
        } else {
            debug!(block_id = block.id, "block verified");
        }
        Ok((transactions, verification))
    }

    /// Merkle inclusion proof for a live vote against its sealed block.
    pub fn inclusion_proof(&self, vote_id: &str) -> Result<InclusionProof> {
        let vote = self
            .votes
            .get(vote_id)?
            .ok_or_else(|| LedgerError::VoteNotFound(vote_id.to_string()))?;
        let block = self
            .chain
            .get_block(vote.block_id)?
            .ok_or_else(|| LedgerError::BlockNotFound(vote.block_id.to_string()))?;

        let transactions = self.votes.transactions_for_block(vote.block_id)?;
        let leaves: Vec<String> = transactions.iter().map(Vote::fingerprint).collect();
        let index = transactions
            .iter()
            .position(|tx| tx.id == vote.id)
            .ok_or_else(|| LedgerError::VoteNotFound(vote_id.to_string()))?;
        let proof = MerkleTree::new(&leaves)
            .proof(index)
            .ok_or_else(|| LedgerError::VoteNotFound(vote_id.to_string()))?;

        Ok(InclusionProof {
            valid: verify_proof(&block.merkle_root, &proof),
            block_id: block.id,
            merkle_root: block.merkle_root,
            vote,
            proof,
        })
    }

    /// Check linkage, seal hashes and difficulty of every stored block.
    ///
    /// Difficulty is checked against the current configuration. Returns the
    /// number of blocks checked.
    pub fn validate_chain(&self) -> Result<usize> {
        let blocks = self.chain.all_blocks()?;
        BlockValidator::validate_chain(&blocks, &self.config.difficulty_prefix)?;
        Ok(blocks.len())
    }

    // =========================================================================
    // Synchronization
    // =========================================================================

    /// Restore a sealed block's votes from the backup.
    pub fn sync_block(&self, block_id: u64) -> Result<SyncReport> {
        let height = self.chain.height()?;
        if block_id == 0 || block_id > height {
            return Err(LedgerError::BlockNotFound(block_id.to_string()));
        }

        let _block = self.block_locks.lock(block_id);
        let report = self.synchronizer().sync_block(block_id)?;
        self.storage.flush()?;
        Ok(report)
    }

    /// Replace every live vote with the backup.
    ///
    /// Holds every sealed block's lock, so no verification observes the
    /// store half-restored.
    pub fn sync_all(&self) -> Result<SyncReport> {
        let _seal = self.lock_seal();
        // Ascending order, matching the single-id holders.
        let _blocks: Vec<_> = (1..=self.chain.height()?)
            .map(|id| self.block_locks.lock(id))
            .collect();
        let report = self.synchronizer().sync_all()?;
        self.storage.flush()?;
        Ok(report)
    }

    fn synchronizer(&self) -> Synchronizer<'_> {
        Synchronizer::new(&self.votes, &self.backup, &self.chain)
    }

    // =========================================================================
    // Tampering
    // =========================================================================

    /// Delete a live vote, leaving the backup untouched.
    pub fn tamper_delete(&self, vote_id: &str) -> Result<Vote> {
        let removed = self
            .votes
            .remove(vote_id)?
            .ok_or_else(|| LedgerError::VoteNotFound(vote_id.to_string()))?;
        warn!(id = vote_id, block_id = removed.block_id, "live vote deleted");
        Ok(removed)
    }

    /// Change a live vote's choice, leaving the backup untouched.
    pub fn tamper_choice(&self, vote_id: &str, choice: u8) -> Result<Vote> {
        let original = self
            .votes
            .get(vote_id)?
            .ok_or_else(|| LedgerError::VoteNotFound(vote_id.to_string()))?;
        let altered = Vote::new(
            original.id.clone(),
            choice,
            original.timestamp,
            original.block_id,
            self.config.candidates,
        )?;
        self.votes.replace(&altered)?;
        warn!(id = vote_id, from = original.choice, to = choice, "live vote altered");
        Ok(altered)
    }

    fn lock_seal(&self) -> MutexGuard<'_, ()> {
        self.seal_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
