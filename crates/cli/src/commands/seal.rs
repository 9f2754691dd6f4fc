//! Block sealing command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{load_config, open_storage};

#[derive(Args)]
pub struct SealArgs {
    /// Override the difficulty prefix for this run
    #[arg(short, long)]
    prefix: Option<String>,

    /// Override the nonce budget per block
    #[arg(long)]
    max_attempts: Option<u64>,

    /// Override the per-block mining deadline in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

pub fn run(args: SealArgs, data_dir: &Path) -> Result<()> {
    let mut config = load_config(data_dir)?;
    if let Some(prefix) = args.prefix {
        config = config.with_difficulty(prefix);
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if args.timeout_secs.is_some() {
        config.mining_timeout = args.timeout_secs;
    }

    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, config)?;

    println!(
        "{} (prefix {:?})",
        "Sealing pending blocks...".bold().cyan(),
        ledger.config().difficulty_prefix
    );
    println!();

    let sealed = ledger.seal().context("Sealing stopped")?;
    if sealed.is_empty() {
        println!("  {}", "Nothing to seal.".bright_black());
        println!();
        return Ok(());
    }

    for summary in &sealed {
        println!(
            "{}  Block {} mined",
            "✓".green().bold(),
            summary.block_id.to_string().bright_cyan()
        );
        println!("    Hash:     {}", summary.hash.bright_yellow());
        println!("    Nonce:    {}", summary.nonce);
        println!(
            "    Txs:      {}",
            summary.transactions.to_string().bright_cyan()
        );
        println!(
            "    Attempts: {} in {:.2?}",
            summary.attempts, summary.elapsed
        );
    }

    println!();
    println!(
        "{}",
        format!("Successfully sealed {} blocks.", sealed.len())
            .green()
            .bold()
    );
    println!();
    Ok(())
}
