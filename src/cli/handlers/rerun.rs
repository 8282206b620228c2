// src/cli/handlers/rerun.rs

use crate::{
    cli::{
        Outcome,
        handlers::commons::{self, ExecutionOptions},
    },
    models::ExecutionMode,
    system::executor::OutputMode,
};
use anyhow::Result;
use clap::Args;
use std::path::Path;

/// Arguments of `rerun`.
#[derive(Args, Debug, Default)]
pub struct RerunArgs {
    /// Which past run to repeat, 0 being the latest.
    #[arg(long, default_value_t = 0, conflicts_with = "failed")]
    pub index: usize,

    /// Repeat only the failed commands of the latest failing run.
    #[arg(long)]
    pub failed: bool,

    /// Overrides the execution mode from the configuration.
    #[arg(long, value_enum)]
    pub mode: Option<ExecutionMode>,
}

/// Runs again the commands of a stored evaluation.
pub fn handle(args: RerunArgs, config_path: Option<&Path>) -> Result<Outcome> {
    let cache = commons::open_cache(config_path)?;
    let map = if args.failed {
        let (record, evaluation) = cache.latest_failed()?;
        log::debug!("Re-running the failures of '{}'", record.id);
        evaluation.failed_commands_map()
    } else {
        cache.get(args.index)?.to_commands_map()
    };

    let mode = match args.mode {
        Some(mode) => mode,
        None => commons::load_configuration(config_path)
            .map(|config| config.execution_mode())
            .unwrap_or_default(),
    };
    let options = ExecutionOptions {
        mode,
        output_mode: OutputMode::Captured,
        save: true,
    };
    commons::execute_plan(&map, &cache, options)
}
