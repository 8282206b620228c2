// src/cli/handlers/plan.rs

use crate::cli::{Outcome, handlers::commons};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::Path;

/// Arguments of `plan`.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Sources and selection flags.
    #[command(flatten)]
    pub filter: commons::FilterArgs,
}

/// Prints which commands would run against each source, without running anything.
pub fn handle(args: PlanArgs, config_path: Option<&Path>) -> Result<Outcome> {
    let config = commons::load_configuration(config_path)?;
    let global = args.filter.to_filter(&config)?;
    let resolution = config.commands_map(&args.filter.sources(&config), &global);

    if resolution.commands_map.is_empty() {
        println!("{}", "No command matches these sources.".yellow());
    } else {
        commons::print_commands_map(&resolution.commands_map);
    }
    commons::print_resolution_errors(&resolution.errors);

    Ok(if resolution.errors.is_empty() {
        Outcome::Success
    } else {
        Outcome::Failures
    })
}
