//! Block explorer commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::{ColoredString, Colorize};
use std::path::Path;
use votechain_chain::Ledger;
use votechain_consensus::VerificationStatus;

use super::{format_timestamp, load_config, open_storage, short};

#[derive(Args)]
pub struct BlockArgs {
    /// Block id or hash
    block: String,
}

pub(crate) fn status_label(status: VerificationStatus) -> ColoredString {
    match status {
        VerificationStatus::Verified => "VERIFIED".green().bold(),
        VerificationStatus::Tampered => "TAMPERED".red().bold(),
    }
}

pub fn list_blocks(data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;
    let blocks = ledger.list_blocks()?;

    println!();
    println!("{}", "Blocks:".bold().cyan());
    println!();

    for block in &blocks {
        let label = if block.is_genesis() {
            "(genesis)".to_string()
        } else {
            format!("(nonce {})", block.nonce)
        };
        println!(
            "  {} {} {} {}",
            format!("#{}", block.id).bright_black(),
            short(&block.hash, 16).bright_yellow(),
            format!("prev {}", short(&block.prev_hash, 16)).bright_black(),
            label.bright_black()
        );
    }

    println!();
    Ok(())
}

pub fn show_block(args: BlockArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;
    let detail = ledger
        .block_detail(&args.block)
        .with_context(|| format!("No block matches {:?}", args.block))?;
    let block = &detail.block;

    println!();
    println!("{}", "Block Information:".bold().cyan());
    println!();
    println!("  Id:            {}", block.id.to_string().bright_cyan());
    println!("  Hash:          {}", block.hash.bright_yellow());
    println!("  Parent Hash:   {}", block.prev_hash.bright_black());
    println!("  Merkle Root:   {}", block.merkle_root.bright_black());
    println!(
        "  Recomputed:    {}",
        detail.verification.recomputed_root.bright_black()
    );
    println!("  Nonce:         {}", block.nonce);
    println!(
        "  Timestamp:     {}",
        format_timestamp(block.timestamp).bright_black()
    );
    println!(
        "  Confirmations: {}",
        detail.confirmations.to_string().bright_cyan()
    );
    println!(
        "  Status:        {}",
        status_label(detail.verification.status)
    );
    if let Some(previous) = detail.previous {
        println!("  Previous:      #{}", previous);
    }
    if let Some(next) = detail.next {
        println!("  Next:          #{}", next);
    }
    println!();

    if !detail.transactions.is_empty() {
        println!(
            "{} ({})",
            "Transactions:".bold(),
            detail.transactions.len()
        );
        println!();
        for (i, vote) in detail.transactions.iter().enumerate() {
            println!(
                "  {} {} {} {}",
                format!("{}.", i + 1).bright_black(),
                vote.id.bright_black(),
                short(&vote.fingerprint(), 16).bright_yellow(),
                format!("candidate {}", vote.choice).bright_cyan()
            );
        }
        println!();
    }

    if detail.verification.status.is_tampered() {
        println!(
            "Run {} to restore this block from the backup.",
            format!("votechain sync --block {}", block.id).bright_cyan()
        );
        println!();
    }

    Ok(())
}
