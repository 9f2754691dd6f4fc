//! Live vote store, backup mirror and the paired write path.
//!
//! Both stores share one layout inside their own sled tree:
//! - `vote:{id}` -> bincode-encoded [`Vote`]
//! - `block:{block_id:020}:{id}` -> id (per-block index)
//!
//! A record and its index entry are always written and removed in the same
//! transaction.

use crate::db::{decode_in_tx, Result, Storage, StorageError};
use sled::transaction::abort;
use sled::Tree;
use std::ops::RangeInclusive;
use tracing::{debug, warn};
use votechain_core::{sort_votes, Vote};

const VOTE_PREFIX: &[u8] = b"vote:";
const BLOCK_PREFIX: &[u8] = b"block:";

/// Keyed vote table backed by one sled tree.
#[derive(Clone)]
struct VoteTable {
    tree: Tree,
}

impl VoteTable {
    fn open(storage: &Storage, name: &str) -> Result<Self> {
        Ok(Self {
            tree: storage.tree(name)?,
        })
    }

    fn append(&self, vote: &Vote) -> Result<()> {
        let record_key = Storage::vote_key(&vote.id);
        let index_key = Storage::block_index_key(vote.block_id, &vote.id);
        let encoded = bincode::serialize(vote)?;

        self.tree.transaction::<_, _, StorageError>(|tx| {
            if tx.get(record_key.as_slice())?.is_some() {
                return abort(StorageError::DuplicateId(vote.id.clone()));
            }
            tx.insert(record_key.as_slice(), encoded.as_slice())?;
            tx.insert(index_key.as_slice(), vote.id.as_bytes())?;
            Ok(())
        })?;
        Ok(())
    }

    /// Overwrite an existing record, moving its index entry if the block changed.
    fn replace(&self, vote: &Vote) -> Result<Vote> {
        let record_key = Storage::vote_key(&vote.id);
        let index_key = Storage::block_index_key(vote.block_id, &vote.id);
        let encoded = bincode::serialize(vote)?;

        let previous = self.tree.transaction::<_, _, StorageError>(|tx| {
            let previous: Vote = match tx.get(record_key.as_slice())? {
                Some(bytes) => decode_in_tx(&bytes)?,
                None => return abort(StorageError::NotFound(vote.id.clone())),
            };
            tx.remove(Storage::block_index_key(previous.block_id, &previous.id))?;
            tx.insert(record_key.as_slice(), encoded.as_slice())?;
            tx.insert(index_key.as_slice(), vote.id.as_bytes())?;
            Ok(previous)
        })?;
        Ok(previous)
    }

    fn remove(&self, id: &str) -> Result<Option<Vote>> {
        let record_key = Storage::vote_key(id);

        let removed = self.tree.transaction::<_, _, StorageError>(|tx| {
            let vote: Vote = match tx.remove(record_key.as_slice())? {
                Some(bytes) => decode_in_tx(&bytes)?,
                None => return Ok(None),
            };
            tx.remove(Storage::block_index_key(vote.block_id, &vote.id))?;
            Ok(Some(vote))
        })?;
        Ok(removed)
    }

    fn get(&self, id: &str) -> Result<Option<Vote>> {
        match self.tree.get(Storage::vote_key(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn contains(&self, id: &str) -> Result<bool> {
        Ok(self.tree.contains_key(Storage::vote_key(id))?)
    }

    fn ids_for_block(&self, block_id: u64) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in self.tree.scan_prefix(Storage::block_index_prefix(block_id)) {
            let (_, value) = entry?;
            ids.push(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(ids)
    }

    fn for_block(&self, block_id: u64) -> Result<Vec<Vote>> {
        let mut votes = Vec::new();
        for id in self.ids_for_block(block_id)? {
            if let Some(vote) = self.get(&id)? {
                votes.push(vote);
            }
        }
        sort_votes(&mut votes);
        Ok(votes)
    }

    fn all(&self) -> Result<Vec<Vote>> {
        let mut votes = Vec::new();
        for entry in self.tree.scan_prefix(VOTE_PREFIX) {
            let (_, bytes) = entry?;
            votes.push(bincode::deserialize(&bytes)?);
        }
        sort_votes(&mut votes);
        Ok(votes)
    }

    fn len(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.tree.scan_prefix(VOTE_PREFIX) {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn count_by_choice(&self, choice: u8) -> Result<usize> {
        let mut count = 0;
        for entry in self.tree.scan_prefix(VOTE_PREFIX) {
            let (_, bytes) = entry?;
            let vote: Vote = bincode::deserialize(&bytes)?;
            if vote.choice == choice {
                count += 1;
            }
        }
        Ok(count)
    }

    fn delete_block(&self, block_id: u64) -> Result<usize> {
        let ids = self.ids_for_block(block_id)?;
        let mut batch = sled::Batch::default();
        for id in &ids {
            batch.remove(Storage::vote_key(id));
            batch.remove(Storage::block_index_key(block_id, id));
        }
        self.tree.apply_batch(batch)?;
        Ok(ids.len())
    }

    fn clear(&self) -> Result<usize> {
        let count = self.len()?;
        self.tree.clear()?;
        Ok(count)
    }

    /// Block ids that currently have at least one indexed vote, ascending.
    fn block_ids(&self) -> Result<Vec<u64>> {
        let mut ids: Vec<u64> = Vec::new();
        for entry in self.tree.scan_prefix(BLOCK_PREFIX) {
            let (key, _) = entry?;
            if let Some(block_id) = Storage::parse_block_index_key(&key) {
                if ids.last() != Some(&block_id) {
                    ids.push(block_id);
                }
            }
        }
        Ok(ids)
    }

    fn prune_outside(&self, keep: RangeInclusive<u64>) -> Result<usize> {
        let mut pruned = 0;
        for block_id in self.block_ids()? {
            if !keep.contains(&block_id) {
                pruned += self.delete_block(block_id)?;
            }
        }
        Ok(pruned)
    }
}

// =============================================================================
// Live store
// =============================================================================

/// The live, mutable set of votes.
#[derive(Clone)]
pub struct VoteStore {
    table: VoteTable,
}

impl VoteStore {
    /// Tree holding live votes.
    pub const TREE: &'static str = "votes";

    /// Open the live store.
    pub fn new(storage: &Storage) -> Result<Self> {
        Ok(Self {
            table: VoteTable::open(storage, Self::TREE)?,
        })
    }

    /// Insert a new vote. Fails with `DuplicateId` rather than overwrite.
    pub fn append(&self, vote: &Vote) -> Result<()> {
        self.table.append(vote)
    }

    /// Overwrite an existing vote and return the previous record.
    pub fn replace(&self, vote: &Vote) -> Result<Vote> {
        self.table.replace(vote)
    }

    /// Remove a vote by id.
    pub fn remove(&self, id: &str) -> Result<Option<Vote>> {
        self.table.remove(id)
    }

    /// Look up a vote by id.
    pub fn get(&self, id: &str) -> Result<Option<Vote>> {
        self.table.get(id)
    }

    /// Check if a vote id is present.
    pub fn contains(&self, id: &str) -> Result<bool> {
        self.table.contains(id)
    }

    /// Remove every live vote; returns how many were removed.
    pub fn clear_all(&self) -> Result<usize> {
        let removed = self.table.clear()?;
        debug!(removed, "cleared live votes");
        Ok(removed)
    }

    /// Votes assigned to a block, ascending by timestamp (ties by id).
    ///
    /// This order is what the merkle tree is built over.
    pub fn transactions_for_block(&self, block_id: u64) -> Result<Vec<Vote>> {
        self.table.for_block(block_id)
    }

    /// Every live vote, ascending by timestamp.
    pub fn all(&self) -> Result<Vec<Vote>> {
        self.table.all()
    }

    /// Number of live votes.
    pub fn len(&self) -> Result<usize> {
        self.table.len()
    }

    /// Whether the store holds no votes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of votes for a candidate; zero when none match.
    pub fn count_by_choice(&self, choice: u8) -> Result<usize> {
        self.table.count_by_choice(choice)
    }

    /// Delete every vote assigned to a block.
    pub fn delete_block(&self, block_id: u64) -> Result<usize> {
        self.table.delete_block(block_id)
    }

    /// Block ids that have at least one live vote, ascending.
    pub fn block_ids(&self) -> Result<Vec<u64>> {
        self.table.block_ids()
    }

    /// Delete votes whose block id falls outside `keep`.
    pub fn prune_outside(&self, keep: RangeInclusive<u64>) -> Result<usize> {
        self.table.prune_outside(keep)
    }
}

// =============================================================================
// Backup mirror
// =============================================================================

/// Append-mostly mirror of every accepted vote, read only for recovery.
#[derive(Clone)]
pub struct BackupStore {
    table: VoteTable,
}

impl BackupStore {
    /// Tree holding backup votes.
    pub const TREE: &'static str = "backup";

    /// Open the backup store.
    pub fn new(storage: &Storage) -> Result<Self> {
        Ok(Self {
            table: VoteTable::open(storage, Self::TREE)?,
        })
    }

    /// Mirror a vote.
    pub fn append(&self, vote: &Vote) -> Result<()> {
        self.table.append(vote)
    }

    /// Backup votes assigned to a block, ascending by timestamp.
    pub fn transactions_for_block(&self, block_id: u64) -> Result<Vec<Vote>> {
        self.table.for_block(block_id)
    }

    /// Every backup vote, ascending by timestamp.
    pub fn all(&self) -> Result<Vec<Vote>> {
        self.table.all()
    }

    /// Number of backup votes.
    pub fn len(&self) -> Result<usize> {
        self.table.len()
    }

    /// Whether the mirror holds no votes.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop mirrored votes assigned above `height`, i.e. not yet sealed.
    pub fn discard_above(&self, height: u64) -> Result<usize> {
        let removed = self.table.prune_outside(0..=height)?;
        if removed > 0 {
            warn!(removed, height, "discarded unsealed backup votes");
        }
        Ok(removed)
    }
}

// =============================================================================
// Paired write path
// =============================================================================

/// The single write path for new votes: live store and backup together.
///
/// Either both stores accept the vote or neither keeps it. When the second
/// write fails the first is rolled back and `PartialWriteFailure` is returned.
#[derive(Clone, Copy)]
pub struct DualWriter<'a> {
    live: &'a VoteStore,
    backup: &'a BackupStore,
}

impl<'a> DualWriter<'a> {
    /// Pair a live store with its backup.
    pub fn new(live: &'a VoteStore, backup: &'a BackupStore) -> Self {
        Self { live, backup }
    }

    /// Append a vote to both stores.
    pub fn append(&self, vote: &Vote) -> Result<()> {
        self.live.append(vote)?;

        if let Err(backup_err) = self.backup.append(vote) {
            warn!(id = %vote.id, error = %backup_err, "backup write failed, rolling back live vote");
            let reason = match self.live.remove(&vote.id) {
                Ok(_) => format!("backup write failed: {backup_err}"),
                Err(rollback_err) => {
                    format!("backup write failed: {backup_err}; rollback failed: {rollback_err}")
                }
            };
            return Err(StorageError::PartialWriteFailure {
                id: vote.id.clone(),
                reason,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Storage, VoteStore, BackupStore) {
        let storage = Storage::open_temporary().unwrap();
        let live = VoteStore::new(&storage).unwrap();
        let backup = BackupStore::new(&storage).unwrap();
        (storage, live, backup)
    }

    fn vote(id: &str, choice: u8, ts: f64, block_id: u64) -> Vote {
        Vote::new(id, choice, ts, block_id, 3).unwrap()
    }

    #[test]
    fn test_append_and_get() {
        let (_storage, live, _) = setup();
        let v = vote("a", 1, 1.0, 1);
        live.append(&v).unwrap();

        assert_eq!(live.get("a").unwrap(), Some(v));
        assert!(live.contains("a").unwrap());
        assert_eq!(live.len().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 1)).unwrap();

        let result = live.append(&vote("a", 2, 2.0, 1));
        assert!(matches!(result, Err(StorageError::DuplicateId(id)) if id == "a"));
        // Original record untouched
        assert_eq!(live.get("a").unwrap().unwrap().choice, 1);
    }

    #[test]
    fn test_transactions_for_block_ordered() {
        let (_storage, live, _) = setup();
        live.append(&vote("late", 1, 3.0, 1)).unwrap();
        live.append(&vote("early", 2, 1.0, 1)).unwrap();
        live.append(&vote("other", 3, 2.0, 2)).unwrap();
        live.append(&vote("mid", 3, 2.0, 1)).unwrap();

        let ids: Vec<String> = live
            .transactions_for_block(1)
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["early", "mid", "late"]);
        assert!(live.transactions_for_block(9).unwrap().is_empty());
    }

    #[test]
    fn test_count_by_choice() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 1)).unwrap();
        live.append(&vote("b", 1, 2.0, 1)).unwrap();
        live.append(&vote("c", 2, 3.0, 1)).unwrap();

        assert_eq!(live.count_by_choice(1).unwrap(), 2);
        assert_eq!(live.count_by_choice(2).unwrap(), 1);
        assert_eq!(live.count_by_choice(3).unwrap(), 0);
    }

    #[test]
    fn test_clear_all_leaves_backup() {
        let (_storage, live, backup) = setup();
        let writer = DualWriter::new(&live, &backup);
        writer.append(&vote("a", 1, 1.0, 1)).unwrap();
        writer.append(&vote("b", 2, 2.0, 1)).unwrap();

        assert_eq!(live.clear_all().unwrap(), 2);
        assert!(live.is_empty().unwrap());
        assert!(live.transactions_for_block(1).unwrap().is_empty());
        assert_eq!(backup.len().unwrap(), 2);
    }

    #[test]
    fn test_remove_drops_index_entry() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 4)).unwrap();

        let removed = live.remove("a").unwrap();
        assert_eq!(removed.map(|v| v.id), Some("a".to_string()));
        assert!(live.transactions_for_block(4).unwrap().is_empty());
        assert!(live.remove("a").unwrap().is_none());
    }

    #[test]
    fn test_replace_moves_index() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 1)).unwrap();

        let previous = live.replace(&vote("a", 2, 1.0, 2)).unwrap();
        assert_eq!(previous.block_id, 1);
        assert!(live.transactions_for_block(1).unwrap().is_empty());
        assert_eq!(live.transactions_for_block(2).unwrap()[0].choice, 2);

        let missing = live.replace(&vote("zz", 1, 1.0, 1));
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_delete_block_and_block_ids() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 1)).unwrap();
        live.append(&vote("b", 1, 2.0, 2)).unwrap();
        live.append(&vote("c", 1, 3.0, 2)).unwrap();

        assert_eq!(live.block_ids().unwrap(), vec![1, 2]);
        assert_eq!(live.delete_block(2).unwrap(), 2);
        assert_eq!(live.block_ids().unwrap(), vec![1]);
        assert!(live.get("b").unwrap().is_none());
    }

    #[test]
    fn test_prune_outside() {
        let (_storage, live, _) = setup();
        live.append(&vote("a", 1, 1.0, 1)).unwrap();
        live.append(&vote("b", 1, 2.0, 3)).unwrap();
        live.append(&vote("c", 1, 3.0, 7)).unwrap();

        assert_eq!(live.prune_outside(1..=3).unwrap(), 1);
        assert_eq!(live.block_ids().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_dual_writer_pairs_writes() {
        let (_storage, live, backup) = setup();
        let writer = DualWriter::new(&live, &backup);
        let v = vote("a", 3, 1.0, 1);
        writer.append(&v).unwrap();

        assert_eq!(live.get("a").unwrap(), Some(v.clone()));
        assert_eq!(backup.transactions_for_block(1).unwrap(), vec![v]);
    }

    #[test]
    fn test_dual_writer_rolls_back_on_backup_failure() {
        let (_storage, live, backup) = setup();
        // Backup already holds the id, so the second write fails.
        backup.append(&vote("a", 1, 1.0, 1)).unwrap();

        let writer = DualWriter::new(&live, &backup);
        let result = writer.append(&vote("a", 1, 1.0, 1));

        assert!(matches!(result, Err(StorageError::PartialWriteFailure { .. })));
        assert!(!live.contains("a").unwrap());
    }

    #[test]
    fn test_dual_writer_duplicate_in_live() {
        let (_storage, live, backup) = setup();
        let writer = DualWriter::new(&live, &backup);
        writer.append(&vote("a", 1, 1.0, 1)).unwrap();

        let result = writer.append(&vote("a", 2, 2.0, 1));
        assert!(matches!(result, Err(StorageError::DuplicateId(_))));
        assert_eq!(backup.len().unwrap(), 1);
    }

    #[test]
    fn test_backup_discard_above() {
        let (_storage, _, backup) = setup();
        backup.append(&vote("a", 1, 1.0, 1)).unwrap();
        backup.append(&vote("b", 2, 2.0, 2)).unwrap();
        backup.append(&vote("c", 3, 3.0, 3)).unwrap();

        assert_eq!(backup.discard_above(1).unwrap(), 2);
        assert_eq!(backup.len().unwrap(), 1);
        assert_eq!(backup.transactions_for_block(1).unwrap().len(), 1);
        assert_eq!(backup.discard_above(0).unwrap(), 1);
        assert!(backup.is_empty().unwrap());
    }
}
