//! Per-block mutual exclusion.
//!
//! Mining block `k` and repairing block `k` must not overlap. Work on
//! different block ids proceeds in parallel.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Set of block ids currently held.
#[derive(Debug, Default)]
pub struct BlockLocks {
    held: Mutex<HashSet<u64>>,
    released: Condvar,
}

impl BlockLocks {
    /// Create an empty lock set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `block_id` is free, then hold it until the guard drops.
    pub fn lock(&self, block_id: u64) -> BlockGuard<'_> {
        let mut held = self.held_set();
        while held.contains(&block_id) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        held.insert(block_id);
        BlockGuard {
            locks: self,
            block_id,
        }
    }

    fn held_set(&self) -> MutexGuard<'_, HashSet<u64>> {
        // The set stays consistent even if a holder panicked.
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(&self, block_id: u64) {
        self.held_set().remove(&block_id);
        self.released.notify_all();
    }
}

/// Exclusive hold on one block id.
#[derive(Debug)]
pub struct BlockGuard<'a> {
    locks: &'a BlockLocks,
    block_id: u64,
}

impl Drop for BlockGuard<'_> {
    fn drop(&mut self) {
        self.locks.release(self.block_id);
    }
}
