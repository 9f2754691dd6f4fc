//! Ledger orchestration for votechain.
//!
//! This crate brings the components together into a working vote ledger:
//! - **Ingestion**: batches of votes written to the live store and its backup
//! - **Sealing**: proof-of-work over each block's merkle root, strictly in id order
//! - **Verification**: merkle recomputation against live votes
//! - **Synchronization**: repairing the live store from the backup
//!
//! # Example
//!
//! ```rust,no_run
//! use votechain_chain::{Ledger, LedgerConfig};
//! use votechain_storage::Storage;
//!
//! let storage = Storage::open("./ledger_data").unwrap();
//! let ledger = Ledger::new(&storage, LedgerConfig::default()).unwrap();
//!
//! ledger.ingest(10, 5).unwrap();
//! for sealed in ledger.seal().unwrap() {
//!     println!("block {} -> {}", sealed.block_id, sealed.hash);
//! }
//!
//! for finding in ledger.verify_recent(5).unwrap() {
//!     if finding.status.is_tampered() {
//!         ledger.sync_block(finding.block_id).unwrap();
//!     }
//! }
//! ```

pub mod config;
pub mod ledger;
pub mod locks;
pub mod sync;

// Re-export commonly used types
pub use config::{ConfigError, LedgerConfig};
pub use ledger::{
    BlockDetail, InclusionProof, Ledger, LedgerError, LedgerStats, SealSummary, TransactionRecord,
};
pub use locks::{BlockGuard, BlockLocks};
pub use sync::{SyncReport, Synchronizer};
