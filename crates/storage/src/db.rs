//! sled database wrapper with serialization helpers.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Tree};
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Duplicate vote id: {0}")]
    DuplicateId(String),

    #[error("Block out of order: expected id {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("Broken link: block prev_hash {got} does not match chain tip {expected}")]
    BrokenLink { expected: String, got: String },

    #[error("Partial write for vote {id}: {reason}")]
    PartialWriteFailure { id: String, reason: String },

    #[error("Chain has no genesis block")]
    EmptyChain,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<TransactionError<StorageError>> for StorageError {
    fn from(err: TransactionError<StorageError>) -> Self {
        match err {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => StorageError::Database(e),
        }
    }
}

/// Decode a value inside a sled transaction, aborting it on failure.
pub(crate) fn decode_in_tx<V>(
    bytes: &[u8],
) -> std::result::Result<V, ConflictableTransactionError<StorageError>>
where
    V: serde::de::DeserializeOwned,
{
    bincode::deserialize(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(StorageError::Serialization(e)))
}

/// Wrapper around sled database with serialization helpers.
pub struct Storage {
    db: Db,
}

impl Storage {
    /// Open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open an in-memory database (for testing).
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Open (or create) a named tree. Each store lives in its own tree.
    pub fn tree(&self, name: &str) -> Result<Tree> {
        Ok(self.db.open_tree(name)?)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    // =========================================================================
    // Key Construction Helpers
    // =========================================================================

    /// Key of a vote record.
    /// Format: "vote:{id}"
    pub fn vote_key(id: &str) -> Vec<u8> {
        format!("vote:{}", id).into_bytes()
    }

    /// Prefix of the per-block vote index.
    /// Format: "block:{block_id:020}:"
    pub fn block_index_prefix(block_id: u64) -> Vec<u8> {
        format!("block:{:020}:", block_id).into_bytes()
    }

    /// Key of a per-block vote index entry.
    /// Format: "block:{block_id:020}:{id}"
    pub fn block_index_key(block_id: u64, id: &str) -> Vec<u8> {
        let mut key = Self::block_index_prefix(block_id);
        key.extend_from_slice(id.as_bytes());
        key
    }

    /// Parse the block id back out of an index key.
    pub fn parse_block_index_key(key: &[u8]) -> Option<u64> {
        let rest = key.strip_prefix(b"block:")?;
        let digits = rest.get(..20)?;
        std::str::from_utf8(digits).ok()?.parse().ok()
    }

    /// Key of a block by id.
    /// Format: "chain:id:{id:020}"
    pub fn block_id_key(id: u64) -> Vec<u8> {
        format!("chain:id:{:020}", id).into_bytes()
    }

    /// Key of the hash -> id index.
    /// Format: "chain:hash:{hash}"
    pub fn block_hash_key(hash: &str) -> Vec<u8> {
        format!("chain:hash:{}", hash).into_bytes()
    }
}
