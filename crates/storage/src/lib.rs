//! Persistent storage layer for votechain.
//!
//! This crate provides the storage backend for the ledger:
//! - Live votes (mutable working copy, indexed by block)
//! - Backup votes (durable mirror used only for recovery)
//! - The paired live/backup write path
//! - Block storage (by id and hash) with chain head tracking
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │        (Ledger: ingest, seal, verify, synchronize)       │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                   Storage Layer                          │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ VoteStore   │  │ ChainStore  │  │ Storage (DB)    │  │
//! │  │ BackupStore │  │  - Blocks   │  │  - sled wrapper │  │
//! │  │ DualWriter  │  │  - Head     │  │  - serialization│  │
//! │  │             │  │  - Genesis  │  │  - key helpers  │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────┘  │
//! └────────────────────────┬────────────────────────────────┘
//!                          │
//! ┌────────────────────────▼────────────────────────────────┐
//! │                    sled Database                         │
//! │        (trees: votes, backup, blocks)                    │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use votechain_storage::{BackupStore, ChainStore, DualWriter, Storage, VoteStore};
//! use votechain_core::Vote;
//!
//! let storage = Storage::open("./ledger_data").unwrap();
//!
//! let live = VoteStore::new(&storage).unwrap();
//! let backup = BackupStore::new(&storage).unwrap();
//! let writer = DualWriter::new(&live, &backup);
//! writer.append(&Vote::new("v-1", 2, 1.0, 1, 3).unwrap()).unwrap();
//!
//! let chain = ChainStore::new(&storage).unwrap();
//! let genesis = chain.ensure_genesis().unwrap();
//! assert_eq!(chain.tip().unwrap(), genesis.hash);
//! ```

pub mod chain;
pub mod db;
pub mod votes;

// Re-export commonly used types
pub use chain::ChainStore;
pub use db::{Result, Storage, StorageError};
pub use votes::{BackupStore, DualWriter, VoteStore};
