// src/cli/handlers/run.rs

use crate::{
    cli::{
        Outcome,
        handlers::commons::{self, ExecutionOptions},
    },
    core::cache::Cache,
    models::ExecutionMode,
    system::executor::OutputMode,
};
use anyhow::Result;
use clap::Args;
use std::path::Path;

/// Arguments of `run`.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Sources and selection flags.
    #[command(flatten)]
    pub filter: commons::FilterArgs,

    /// Overrides the execution mode from the configuration.
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,

    /// Let the tools write to the terminal instead of capturing their output (sync mode only).
    #[arg(long)]
    pub stream: bool,

    /// Do not record this run in the history.
    #[arg(long)]
    pub no_cache: bool,
}

/// Resolves the plan for the given sources, runs it and records the evaluation.
pub fn handle(args: RunArgs, config_path: Option<&Path>) -> Result<Outcome> {
    let config = commons::load_configuration(config_path)?;
    let global = args.filter.to_filter(&config)?;
    let resolution = config.commands_map(&args.filter.sources(&config), &global);
    commons::print_resolution_errors(&resolution.errors);

    let cache = Cache::from_settings(config.cache())?;
    let options = ExecutionOptions {
        mode: args.mode.unwrap_or(config.execution_mode()),
        output_mode: if args.stream {
            OutputMode::Streamed
        } else {
            OutputMode::Captured
        },
        save: !args.no_cache,
    };

    let outcome = commons::execute_plan(&resolution.commands_map, &cache, options)?;
    Ok(if resolution.errors.is_empty() {
        outcome
    } else {
        Outcome::Failures
    })
}
