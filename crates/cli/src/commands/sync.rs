//! Backup synchronization command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{load_config, open_storage};

#[derive(Args)]
pub struct SyncArgs {
    /// Restore only this block (default: every block)
    #[arg(short, long)]
    block: Option<u64>,
}

pub fn run(args: SyncArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;

    let report = match args.block {
        Some(block_id) => {
            println!(
                "{}",
                format!("Syncing transactions in block {}...", block_id)
                    .bold()
                    .cyan()
            );
            ledger
                .sync_block(block_id)
                .with_context(|| format!("Failed to sync block {}", block_id))?
        }
        None => {
            println!("{}", "Syncing all transactions from backup...".bold().cyan());
            ledger.sync_all().context("Failed to sync from backup")?
        }
    };

    println!();
    println!(
        "{}  Restored {} votes ({} live votes replaced)",
        "✓".green().bold(),
        report.restored.to_string().bright_cyan(),
        report.removed
    );
    if report.pruned > 0 {
        println!(
            "{}  Pruned {} votes assigned to blocks outside the chain",
            "!".yellow().bold(),
            report.pruned
        );
    }
    println!();
    Ok(())
}
