//! Chain audit and inclusion proof commands.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{load_config, open_storage, short};

#[derive(Args)]
pub struct ProofArgs {
    /// Id of the live vote
    vote_id: String,
}

pub fn run(data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;

    println!("{}", "Auditing chain...".bold().cyan());
    println!();

    let checked = ledger.validate_chain().context("Chain audit failed")?;
    let stats = ledger.stats()?;

    println!(
        "{}  {} blocks linked and sealed",
        "✓".green().bold(),
        checked.to_string().bright_cyan()
    );
    println!("    Height:       {}", stats.height.to_string().bright_cyan());
    if let Some(tip) = &stats.tip {
        println!("    Tip:          {}", tip.bright_yellow());
    }
    println!("    Live votes:   {}", stats.live_votes);
    println!("    Backup votes: {}", stats.backup_votes);
    if stats.live_votes != stats.backup_votes {
        println!(
            "{}  Live and backup stores differ; run {} to inspect.",
            "!".yellow().bold(),
            "votechain verify".bright_cyan()
        );
    }
    println!();
    Ok(())
}

pub fn proof(args: ProofArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;
    let inclusion = ledger
        .inclusion_proof(&args.vote_id)
        .with_context(|| format!("No proof for vote {}", args.vote_id))?;

    println!();
    println!("{}", "Inclusion Proof:".bold().cyan());
    println!();
    println!("  Vote:        {}", inclusion.vote.id.bright_black());
    println!("  Block:       #{}", inclusion.block_id);
    println!("  Leaf:        {}", inclusion.proof.leaf.bright_yellow());
    for (sibling, right) in inclusion
        .proof
        .siblings
        .iter()
        .zip(&inclusion.proof.directions)
    {
        let side = if *right { "R" } else { "L" };
        println!("    {} {}", side.bright_black(), short(sibling, 32));
    }
    println!("  Merkle Root: {}", inclusion.merkle_root.bright_black());
    let verdict = if inclusion.valid {
        "VALID".green().bold()
    } else {
        "INVALID".red().bold()
    };
    println!("  Result:      {}", verdict);
    println!();
    Ok(())
}
