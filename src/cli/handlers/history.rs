// src/cli/handlers/history.rs

use crate::cli::{Outcome, handlers::commons};
use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use std::path::Path;

/// The `history` subcommands.
#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// Lists the stored evaluations, newest first.
    List,
    /// Prints a stored evaluation.
    Show {
        /// Position in the history, 0 being the latest.
        #[arg(default_value_t = 0, conflicts_with = "failed")]
        index: usize,
        /// Shows the latest evaluation with at least one failure instead.
        #[arg(long)]
        failed: bool,
    },
    /// Deletes every stored evaluation.
    Clear,
}

/// Lists, prints or clears the history.
pub fn handle(action: HistoryAction, config_path: Option<&Path>) -> Result<Outcome> {
    let cache = commons::open_cache(config_path)?;
    match action {
        HistoryAction::List => {
            let records = cache.records()?;
            if records.is_empty() {
                println!("{}", "The history is empty.".yellow());
            }
            for (index, record) in records.iter().enumerate() {
                let evaluation = record.load()?;
                let failures = evaluation.failure_count();
                let status = if failures == 0 {
                    "ok".green()
                } else {
                    format!("{} failed", failures).red()
                };
                println!(
                    "{:>3}  {}  {:>3} command(s)  {}",
                    index.to_string().cyan(),
                    record.created_at.format("%Y-%m-%d %H:%M:%S"),
                    evaluation.command_count(),
                    status
                );
            }
        }
        HistoryAction::Show { index, failed } => {
            let (record, evaluation) = if failed {
                cache.latest_failed()?
            } else {
                let record = cache.record(index)?;
                let evaluation = record.load()?;
                (record, evaluation)
            };
            println!("--- {} '{}' ---", "Evaluation".bold(), record.id.yellow());
            commons::print_evaluation(&evaluation);
        }
        HistoryAction::Clear => {
            let removed = cache.clear()?;
            println!("Removed {} evaluation(s) from '{}'.", removed, cache.root().display());
        }
    }
    Ok(Outcome::Success)
}
