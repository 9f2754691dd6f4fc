//! Initialize ledger command.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::Path;
use votechain_chain::{Ledger, LedgerConfig};

use super::{config_path, open_storage, save_config};

#[derive(Args)]
pub struct InitArgs {
    /// Votes generated per ingest run
    #[arg(long, default_value = "50")]
    batch_size: usize,

    /// Votes assigned to each block
    #[arg(long, default_value = "5")]
    tx_per_block: usize,

    /// Most blocks sealed by one seal run
    #[arg(long, default_value = "10")]
    block_count: u64,

    /// Required hash prefix (lowercase hex)
    #[arg(short, long, default_value = "0")]
    prefix: String,

    /// Number of candidates
    #[arg(long, default_value = "3")]
    candidates: u8,

    /// Nonce budget per block
    #[arg(long, default_value = "10000000")]
    max_attempts: u64,

    /// Per-block mining deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Overwrite an existing config.json
    #[arg(long)]
    force: bool,
}

pub fn run(args: InitArgs, data_dir: &Path) -> Result<()> {
    println!("{}", "Initializing votechain...".bold().cyan());
    println!();

    if config_path(data_dir).exists() && !args.force {
        bail!(
            "{} already exists. Use --force to overwrite it.",
            config_path(data_dir).display()
        );
    }

    let config = LedgerConfig {
        batch_size: args.batch_size,
        tx_per_block: args.tx_per_block,
        block_count: args.block_count,
        candidates: args.candidates,
        max_attempts: args.max_attempts,
        mining_timeout: args.timeout_secs,
        ..LedgerConfig::default().with_difficulty(args.prefix)
    };
    config.validate()?;

    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    println!("{}  Created data directory", "✓".green().bold());

    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, config.clone())?;
    let genesis = ledger
        .ensure_genesis()
        .context("Failed to create genesis block")?;
    storage.flush()?;

    println!("{}  Genesis block ready", "✓".green().bold());
    println!("    Hash: {}", genesis.hash.bright_yellow());
    println!("    Id:   {}", genesis.id.to_string().bright_cyan());

    let path = save_config(data_dir, &config)?;
    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        path.display().to_string().bright_black()
    );

    println!();
    println!("{}", "Ledger initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  • Use {} to generate votes", "votechain ingest".bright_cyan());
    println!("  • Use {} to mine blocks", "votechain seal".bright_cyan());
    println!("  • Use {} to check for tampering", "votechain verify".bright_cyan());

    Ok(())
}
