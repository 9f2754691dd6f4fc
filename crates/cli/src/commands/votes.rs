//! Tally and transaction listing commands.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{format_timestamp, load_config, open_storage, short};

#[derive(Args)]
pub struct TransactionsArgs {
    /// Maximum number of transactions to show
    #[arg(short, long, default_value = "100")]
    limit: usize,
}

pub fn tally(data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;
    let tally = ledger.tally()?;
    let total: usize = tally.iter().map(|(_, count)| count).sum();

    println!();
    println!("{}", "Results:".bold().cyan());
    println!();
    for (choice, count) in &tally {
        let share = if total == 0 {
            0.0
        } else {
            *count as f64 * 100.0 / total as f64
        };
        println!(
            "  Candidate {}: {} {}",
            choice,
            count.to_string().bright_cyan(),
            format!("({share:.1}%)").bright_black()
        );
    }
    println!();
    println!("  Total: {}", total.to_string().bold());
    println!();
    Ok(())
}

pub fn transactions(args: TransactionsArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;
    let records = ledger.transactions(Some(args.limit))?;
    let total = ledger.votes().len()?;

    println!();
    println!(
        "{} ({} of {})",
        "Transactions:".bold().cyan(),
        records.len(),
        total
    );
    println!();

    for record in &records {
        let block = match &record.block_hash {
            Some(hash) => short(hash, 12).bright_yellow(),
            None => "unsealed".bright_black(),
        };
        println!(
            "  {} {} {} {} {}",
            record.vote.id.bright_black(),
            short(&record.fingerprint, 16).bright_yellow(),
            format!("candidate {}", record.vote.choice).bright_cyan(),
            format!("block #{}", record.vote.block_id).bright_black(),
            block
        );
        println!(
            "      {}",
            format_timestamp(record.vote.timestamp).bright_black()
        );
    }
    println!();
    Ok(())
}
