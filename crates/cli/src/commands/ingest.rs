//! Vote ingestion command.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{load_config, open_storage, short};

#[derive(Args)]
pub struct IngestArgs {
    /// Number of votes to generate (defaults to the configured batch size)
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Votes per block (defaults to the configured value)
    #[arg(short, long)]
    tx_per_block: Option<usize>,
}

pub fn run(args: IngestArgs, data_dir: &Path) -> Result<()> {
    let config = load_config(data_dir)?;
    let batch_size = args.batch_size.unwrap_or(config.batch_size);
    let tx_per_block = args.tx_per_block.unwrap_or(config.tx_per_block);

    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, config)?;

    println!("{}", "Generating votes...".bold().cyan());
    let count = ledger
        .ingest(batch_size, tx_per_block)
        .context("Failed to ingest votes")?;

    println!();
    println!(
        "{}  Appended {} votes to live and backup stores",
        "✓".green().bold(),
        count.to_string().bright_cyan()
    );

    // Only this run's blocks; sealed ones keep their earlier votes.
    let height = ledger.chain().height()?;
    let blocks: Vec<u64> = ledger
        .votes()
        .block_ids()?
        .into_iter()
        .filter(|id| *id > height)
        .collect();
    if let (Some(first), Some(last)) = (blocks.first(), blocks.last()) {
        println!(
            "    Blocks: {}..={} ({} per block)",
            first, last, tx_per_block
        );
    }

    println!();
    let fresh = ledger
        .transactions(None)?
        .into_iter()
        .filter(|record| record.vote.block_id > height)
        .take(10);
    for record in fresh {
        println!(
            "  {} {} {}",
            short(&record.vote.id, 8).bright_black(),
            short(&record.fingerprint, 16).bright_yellow(),
            format!("(candidate {}, block {})", record.vote.choice, record.vote.block_id)
                .bright_black()
        );
    }
    if count > 10 {
        println!("  {}", format!("... {} more", count - 10).bright_black());
    }
    println!();

    Ok(())
}
