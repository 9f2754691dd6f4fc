//! Tamper demonstration command.
//!
//! Only the live store is touched; the backup keeps the original vote so
//! `votechain sync` can restore it.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::Path;
use votechain_chain::Ledger;

use super::{load_config, open_storage};

#[derive(Args)]
pub struct TamperArgs {
    /// Id of the live vote to tamper with
    vote_id: String,

    /// Change the vote's candidate instead of deleting it
    #[arg(short, long)]
    choice: Option<u8>,
}

pub fn run(args: TamperArgs, data_dir: &Path) -> Result<()> {
    let storage = open_storage(data_dir)?;
    let ledger = Ledger::new(&storage, load_config(data_dir)?)?;

    let vote = match args.choice {
        Some(choice) => {
            let vote = ledger
                .tamper_choice(&args.vote_id, choice)
                .with_context(|| format!("Failed to alter vote {}", args.vote_id))?;
            println!(
                "{}  Vote {} now votes for candidate {}",
                "!".yellow().bold(),
                vote.id.bright_black(),
                choice.to_string().bright_cyan()
            );
            vote
        }
        None => {
            let vote = ledger
                .tamper_delete(&args.vote_id)
                .with_context(|| format!("Failed to delete vote {}", args.vote_id))?;
            println!(
                "{}  Vote {} deleted from the live store",
                "!".yellow().bold(),
                vote.id.bright_black()
            );
            vote
        }
    };
    storage.flush()?;

    println!(
        "    Run {} to see the effect.",
        format!("votechain block {}", vote.block_id).bright_cyan()
    );
    Ok(())
}
