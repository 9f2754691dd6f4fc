//! CLI commands module.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};
use votechain_chain::LedgerConfig;
use votechain_storage::Storage;

mod audit;
mod block;
mod ingest;
mod init;
mod seal;
mod sync;
mod tamper;
mod verify;
mod votes;

const CONFIG_FILE: &str = "config.json";

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ledger and write config.json
    Init(init::InitArgs),
    /// Generate a fresh batch of votes
    Ingest(ingest::IngestArgs),
    /// Seal pending blocks with proof-of-work
    Seal(seal::SealArgs),
    /// List all blocks
    Blocks,
    /// Show a block, its transactions and its verification status
    Block(block::BlockArgs),
    /// Recompute merkle roots of recent blocks
    Verify(verify::VerifyArgs),
    /// Restore live votes from the backup
    Sync(sync::SyncArgs),
    /// Count votes per candidate
    Tally,
    /// List live transactions
    Transactions(votes::TransactionsArgs),
    /// Alter or delete a live vote (demonstrates tamper detection)
    Tamper(tamper::TamperArgs),
    /// Show a merkle inclusion proof for a vote
    Proof(audit::ProofArgs),
    /// Check linkage and seals across the whole chain
    Audit,
}

pub fn run(cmd: Commands, data_dir: &Path) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args, data_dir),
        Commands::Ingest(args) => ingest::run(args, data_dir),
        Commands::Seal(args) => seal::run(args, data_dir),
        Commands::Blocks => block::list_blocks(data_dir),
        Commands::Block(args) => block::show_block(args, data_dir),
        Commands::Verify(args) => verify::run(args, data_dir),
        Commands::Sync(args) => sync::run(args, data_dir),
        Commands::Tally => votes::tally(data_dir),
        Commands::Transactions(args) => votes::transactions(args, data_dir),
        Commands::Tamper(args) => tamper::run(args, data_dir),
        Commands::Proof(args) => audit::proof(args, data_dir),
        Commands::Audit => audit::run(data_dir),
    }
}

fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load `config.json` from the data directory, or the defaults if absent.
pub(crate) fn load_config(data_dir: &Path) -> Result<LedgerConfig> {
    let path = config_path(data_dir);
    if !path.exists() {
        return Ok(LedgerConfig::default());
    }

    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: LedgerConfig = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` to `config.json` in the data directory.
pub(crate) fn save_config(data_dir: &Path, config: &LedgerConfig) -> Result<PathBuf> {
    let path = config_path(data_dir);
    fs::write(&path, serde_json::to_string_pretty(config)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

pub(crate) fn open_storage(data_dir: &Path) -> Result<Storage> {
    Storage::open(data_dir).with_context(|| {
        format!(
            "Failed to open storage at {}. Did you run 'votechain init'?",
            data_dir.display()
        )
    })
}

/// Render a ledger timestamp as UTC.
pub(crate) fn format_timestamp(timestamp: f64) -> String {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    match chrono::DateTime::from_timestamp(secs as i64, nanos) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string(),
        None => format!("{timestamp:.6}"),
    }
}

/// First `n` characters of a fingerprint.
pub(crate) fn short(hash: &str, n: usize) -> &str {
    hash.get(..n).unwrap_or(hash)
}
