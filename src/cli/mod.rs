// src/cli/mod.rs

//! The `toolmesh` command line: argument definitions and dispatch.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod handlers;

/// toolmesh: runs linting and analysis tools across a codebase.
///
/// Which tools run, and with which arguments, is decided by the contexts and
/// commands declared in `toolmesh.toml`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file to use instead of the nearest `toolmesh.toml`.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub action: Action,
}

/// Every `toolmesh` subcommand.
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Shows which commands would run against each source.
    Plan(handlers::plan::PlanArgs),
    /// Runs the matching commands against each source.
    Run(handlers::run::RunArgs),
    /// Runs the commands of a past evaluation again.
    Rerun(handlers::rerun::RerunArgs),
    /// Inspects or clears the evaluation history.
    #[command(subcommand)]
    History(handlers::history::HistoryAction),
}

/// How a successful invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every command resolved and passed.
    Success,
    /// At least one command failed or could not be resolved.
    Failures,
}

/// Routes the parsed command line to its handler.
pub fn dispatch(cli: Cli) -> Result<Outcome> {
    log::debug!("CLI args parsed: {:?}", cli);
    let config = cli.config.as_deref();
    match cli.action {
        Action::Plan(args) => handlers::plan::handle(args, config),
        Action::Run(args) => handlers::run::handle(args, config),
        Action::Rerun(args) => handlers::rerun::handle(args, config),
        Action::History(action) => handlers::history::handle(action, config),
    }
}
