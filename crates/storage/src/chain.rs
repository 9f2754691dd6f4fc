//! Block storage and chain head tracking.

use crate::db::{decode_in_tx, Result, Storage, StorageError};
use sled::transaction::abort;
use sled::Tree;
use tracing::info;
use votechain_core::{now_timestamp, Block};

/// Key of the chain head (highest block id).
const CHAIN_HEAD_KEY: &[u8] = b"chain:head";

/// Manages block storage and chain state.
///
/// Layout inside the `blocks` tree:
/// - `chain:id:{id:020}` -> bincode-encoded [`Block`]
/// - `chain:hash:{hash}` -> id
/// - `chain:head` -> highest id
#[derive(Clone)]
pub struct ChainStore {
    tree: Tree,
}

impl ChainStore {
    /// Tree holding blocks.
    pub const TREE: &'static str = "blocks";

    /// Open the chain store.
    pub fn new(storage: &Storage) -> Result<Self> {
        Ok(Self {
            tree: storage.tree(Self::TREE)?,
        })
    }

    // =========================================================================
    // Block Lookup
    // =========================================================================

    /// Get a block by its id.
    pub fn get_block(&self, id: u64) -> Result<Option<Block>> {
        match self.tree.get(Storage::block_id_key(id))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Get a block by its hash.
    pub fn get_block_by_hash(&self, hash: &str) -> Result<Option<Block>> {
        match self.tree.get(Storage::block_hash_key(hash))? {
            Some(bytes) => {
                let id: u64 = bincode::deserialize(&bytes)?;
                self.get_block(id)
            }
            None => Ok(None),
        }
    }

    // =========================================================================
    // Chain Head Tracking
    // =========================================================================

    /// Id of the highest block, or `None` if the chain has no genesis yet.
    pub fn head_id(&self) -> Result<Option<u64>> {
        match self.tree.get(CHAIN_HEAD_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of mined blocks. Genesis sits at id 0 and ids have no gaps, so
    /// this is also the highest id.
    pub fn height(&self) -> Result<u64> {
        Ok(self.head_id()?.unwrap_or(0))
    }

    /// Check if the chain has a genesis block.
    pub fn is_initialized(&self) -> Result<bool> {
        Ok(self.head_id()?.is_some())
    }

    /// Get the highest block.
    pub fn latest_block(&self) -> Result<Option<Block>> {
        match self.head_id()? {
            Some(id) => self.get_block(id),
            None => Ok(None),
        }
    }

    /// Hash of the highest block; the `prev_hash` of the next seal.
    pub fn tip(&self) -> Result<String> {
        self.latest_block()?
            .map(|block| block.hash)
            .ok_or(StorageError::EmptyChain)
    }

    // =========================================================================
    // Genesis Block
    // =========================================================================

    /// Return the genesis block, creating it first if the chain is empty.
    ///
    /// Calling this repeatedly never creates a second genesis block.
    pub fn ensure_genesis(&self) -> Result<Block> {
        let genesis = Block::genesis(now_timestamp());
        let id_key = Storage::block_id_key(genesis.id);
        let hash_key = Storage::block_hash_key(&genesis.hash);
        let encoded = bincode::serialize(&genesis)?;
        let encoded_id = bincode::serialize(&genesis.id)?;

        let (block, created) = self.tree.transaction::<_, _, StorageError>(|tx| {
            if tx.get(CHAIN_HEAD_KEY)?.is_some() {
                return match tx.get(id_key.as_slice())? {
                    Some(bytes) => Ok((decode_in_tx::<Block>(&bytes)?, false)),
                    None => abort(StorageError::NotFound(format!("block {}", genesis.id))),
                };
            }
            tx.insert(id_key.as_slice(), encoded.as_slice())?;
            tx.insert(hash_key.as_slice(), encoded_id.as_slice())?;
            tx.insert(CHAIN_HEAD_KEY, encoded_id.as_slice())?;
            Ok((genesis.clone(), true))
        })?;

        if created {
            info!(timestamp = block.timestamp, "genesis block created");
        }
        Ok(block)
    }

    // =========================================================================
    // Chain Operations
    // =========================================================================

    /// Append a new block to the chain.
    ///
    /// This validates that:
    /// - The block id is exactly current_height + 1 (`OutOfOrder`)
    /// - The block's prev_hash matches the current tip (`BrokenLink`)
    ///
    /// The block, its hash index and the new head are written in one
    /// transaction, so a failed append leaves the chain unchanged.
    pub fn append_block(&self, block: &Block) -> Result<()> {
        let id_key = Storage::block_id_key(block.id);
        let hash_key = Storage::block_hash_key(&block.hash);
        let encoded = bincode::serialize(block)?;
        let encoded_id = bincode::serialize(&block.id)?;

        self.tree.transaction::<_, _, StorageError>(|tx| {
            let height: u64 = match tx.get(CHAIN_HEAD_KEY)? {
                Some(bytes) => decode_in_tx(&bytes)?,
                None => return abort(StorageError::EmptyChain),
            };

            if block.id != height + 1 {
                return abort(StorageError::OutOfOrder {
                    expected: height + 1,
                    got: block.id,
                });
            }

            let tip: Block = match tx.get(Storage::block_id_key(height))? {
                Some(bytes) => decode_in_tx(&bytes)?,
                None => return abort(StorageError::NotFound(format!("block {}", height))),
            };

            if block.prev_hash != tip.hash {
                return abort(StorageError::BrokenLink {
                    expected: tip.hash,
                    got: block.prev_hash.clone(),
                });
            }

            tx.insert(id_key.as_slice(), encoded.as_slice())?;
            tx.insert(hash_key.as_slice(), encoded_id.as_slice())?;
            tx.insert(CHAIN_HEAD_KEY, encoded_id.as_slice())?;
            Ok(())
        })?;

        Ok(())
    }

    /// Get blocks in a range [from_id, to_id].
    pub fn get_blocks_range(&self, from_id: u64, to_id: u64) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for id in from_id..=to_id {
            if let Some(block) = self.get_block(id)? {
                blocks.push(block);
            } else {
                break; // Stop at first missing block
            }
        }
        Ok(blocks)
    }

    /// Every block, genesis first.
    pub fn all_blocks(&self) -> Result<Vec<Block>> {
        match self.head_id()? {
            Some(head) => self.get_blocks_range(0, head),
            None => Ok(Vec::new()),
        }
    }

    /// Get the last N blocks (most recent first), genesis included.
    pub fn get_recent_blocks(&self, count: u64) -> Result<Vec<Block>> {
        let head = match self.head_id()? {
            Some(head) if count > 0 => head,
            _ => return Ok(Vec::new()),
        };

        let from_id = head.saturating_sub(count - 1);
        let mut blocks = self.get_blocks_range(from_id, head)?;
        blocks.reverse(); // Most recent first
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use votechain_core::{empty_root, seal_hash, GENESIS_HASH};

    fn setup() -> (Storage, ChainStore) {
        let storage = Storage::open_temporary().unwrap();
        let chain = ChainStore::new(&storage).unwrap();
        (storage, chain)
    }

    fn next_block(id: u64, prev_hash: &str) -> Block {
        let merkle_root = empty_root();
        let hash = seal_hash(prev_hash, &merkle_root, 0, id as f64);
        Block {
            id,
            prev_hash: prev_hash.to_string(),
            merkle_root,
            hash,
            nonce: 0,
            timestamp: id as f64,
        }
    }

    #[test]
    fn test_ensure_genesis_creates_once() {
        let (_storage, chain) = setup();
        assert!(!chain.is_initialized().unwrap());
        assert!(matches!(chain.tip(), Err(StorageError::EmptyChain)));

        let first = chain.ensure_genesis().unwrap();
        let second = chain.ensure_genesis().unwrap();

        assert_eq!(first, second);
        assert!(first.is_genesis());
        assert_eq!(chain.head_id().unwrap(), Some(0));
        assert_eq!(chain.height().unwrap(), 0);
        assert_eq!(chain.tip().unwrap(), GENESIS_HASH);
    }

    #[test]
    fn test_append_block() {
        let (_storage, chain) = setup();
        chain.ensure_genesis().unwrap();

        let block1 = next_block(1, GENESIS_HASH);
        chain.append_block(&block1).unwrap();
        let block2 = next_block(2, &block1.hash);
        chain.append_block(&block2).unwrap();

        assert_eq!(chain.height().unwrap(), 2);
        assert_eq!(chain.tip().unwrap(), block2.hash);
        assert_eq!(chain.get_block(1).unwrap(), Some(block1.clone()));
        assert_eq!(chain.get_block_by_hash(&block1.hash).unwrap(), Some(block1));
        assert!(chain.get_block_by_hash("nope").unwrap().is_none());
    }

    #[test]
    fn test_append_out_of_order_fails() {
        let (_storage, chain) = setup();
        chain.ensure_genesis().unwrap();

        let result = chain.append_block(&next_block(5, GENESIS_HASH));
        assert!(matches!(
            result,
            Err(StorageError::OutOfOrder {
                expected: 1,
                got: 5
            })
        ));
        assert_eq!(chain.height().unwrap(), 0);
    }

    #[test]
    fn test_append_broken_link_fails() {
        let (_storage, chain) = setup();
        chain.ensure_genesis().unwrap();

        let block = next_block(1, "deadbeef");
        let result = chain.append_block(&block);
        assert!(matches!(result, Err(StorageError::BrokenLink { .. })));
        assert!(chain.get_block(1).unwrap().is_none());
        assert!(chain.get_block_by_hash(&block.hash).unwrap().is_none());
    }

    #[test]
    fn test_append_without_genesis_fails() {
        let (_storage, chain) = setup();
        let result = chain.append_block(&next_block(1, GENESIS_HASH));
        assert!(matches!(result, Err(StorageError::EmptyChain)));
    }

    #[test]
    fn test_linkage_holds_across_chain() {
        let (_storage, chain) = setup();
        chain.ensure_genesis().unwrap();
        for id in 1..=4 {
            let tip = chain.tip().unwrap();
            chain.append_block(&next_block(id, &tip)).unwrap();
        }

        let blocks = chain.all_blocks().unwrap();
        assert_eq!(blocks.len(), 5);
        assert!(blocks[0].is_genesis());
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].prev_hash, pair[0].hash);
            assert_eq!(pair[1].id, pair[0].id + 1);
        }
    }

    #[test]
    fn test_get_recent_blocks() {
        let (_storage, chain) = setup();
        chain.ensure_genesis().unwrap();
        let block1 = next_block(1, GENESIS_HASH);
        chain.append_block(&block1).unwrap();
        chain.append_block(&next_block(2, &block1.hash)).unwrap();

        let recent: Vec<u64> = chain
            .get_recent_blocks(2)
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(recent, vec![2, 1]);
        assert_eq!(chain.get_recent_blocks(10).unwrap().len(), 3);
        assert!(chain.get_recent_blocks(0).unwrap().is_empty());
    }
}
