//! Tamper verification command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::block::status_label;
use super::{load_config, open_storage, short};

#[derive(Args)]
pub struct VerifyArgs {
    /// Number of most recent blocks to verify
    #[arg(short, long, default_value = "5")]
    recent: u64,
}

pub fn run(args: VerifyArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;

    println!("{}", "Verifying blocks...".bold().cyan());
    println!();

    let findings = ledger.verify_recent(args.recent)?;
    if findings.is_empty() {
        println!("  {}", "No sealed blocks yet.".bright_black());
        println!();
        return Ok(());
    }

    for finding in &findings {
        println!(
            "  {} {} {}",
            format!("#{}", finding.block_id).bright_black(),
            status_label(finding.status),
            format!(
                "(stored {}, recomputed {})",
                short(&finding.stored_root, 12),
                short(&finding.recomputed_root, 12)
            )
            .bright_black()
        );
    }

    let tampered: Vec<String> = findings
        .iter()
        .filter(|f| f.status.is_tampered())
        .map(|f| f.block_id.to_string())
        .collect();

    println!();
    if tampered.is_empty() {
        println!("{}", "All checked blocks verified.".green().bold());
    } else {
        println!(
            "{} {}",
            "Tampered blocks:".red().bold(),
            tampered.join(", ")
        );
        println!(
            "Run {} or {} to repair.",
            "votechain sync".bright_cyan(),
            "votechain sync --block <ID>".bright_cyan()
        );
    }
    println!();
    Ok(())
}
