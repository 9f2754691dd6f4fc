//! Restoring live votes from the backup mirror.
//!
//! A sync throws away the live copy (one block or everything), re-inserts
//! the backup records with their original ids, choices, timestamps and block
//! assignments, and finally prunes live votes assigned to blocks that do not
//! exist on this chain. Running a sync twice in a row leaves the live store
//! exactly as the first run did.

use std::ops::RangeInclusive;
use tracing::{debug, info};
use votechain_core::Vote;
use votechain_storage::{BackupStore, ChainStore, Result, VoteStore};

/// What a sync changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Live votes deleted before restoring.
    pub removed: usize,
    /// Votes copied back from the backup.
    pub restored: usize,
    /// Live votes dropped for referencing a block outside the chain.
    pub pruned: usize,
}

/// Repairs the live store from the backup.
///
/// Callers are responsible for excluding concurrent sealing of the same
/// block; see [`crate::Ledger::sync_block`].
pub struct Synchronizer<'a> {
    live: &'a VoteStore,
    backup: &'a BackupStore,
    chain: &'a ChainStore,
}

impl<'a> Synchronizer<'a> {
    pub fn new(live: &'a VoteStore, backup: &'a BackupStore, chain: &'a ChainStore) -> Self {
        Self {
            live,
            backup,
            chain,
        }
    }

    /// Restore one block's votes from the backup.
    pub fn sync_block(&self, block_id: u64) -> Result<SyncReport> {
        let removed = self.live.delete_block(block_id)?;
        let restored = self.restore(&self.backup.transactions_for_block(block_id)?)?;
        let pruned = self.prune()?;

        info!(block_id, removed, restored, pruned, "block synced from backup");
        Ok(SyncReport {
            removed,
            restored,
            pruned,
        })
    }

    /// Replace the whole live store with the backup.
    pub fn sync_all(&self) -> Result<SyncReport> {
        let removed = self.live.clear_all()?;
        let restored = self.restore(&self.backup.all()?)?;
        let pruned = self.prune()?;

        info!(removed, restored, pruned, "all blocks synced from backup");
        Ok(SyncReport {
            removed,
            restored,
            pruned,
        })
    }

    /// Block ids a live vote may reference: `1..=height`.
    pub fn valid_range(&self) -> Result<RangeInclusive<u64>> {
        Ok(1..=self.chain.height()?)
    }

    fn restore(&self, votes: &[Vote]) -> Result<usize> {
        for vote in votes {
            // A vote whose live block id was rewritten still occupies its id.
            if let Some(stale) = self.live.remove(&vote.id)? {
                debug!(id = %vote.id, from = stale.block_id, to = vote.block_id, "reassigning vote");
            }
            self.live.append(vote)?;
        }
        Ok(votes.len())
    }

    fn prune(&self) -> Result<usize> {
        self.live.prune_outside(self.valid_range()?)
    }
}
