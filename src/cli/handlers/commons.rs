// src/cli/handlers/commons.rs

//! Shared by the handlers: configuration lookup, filter flags, running a plan and rendering.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};

use crate::{
    cli::Outcome,
    core::{
        cache::Cache,
        commands_map::CommandsMap,
        config_loader,
        configuration::{CacheSettings, Configuration},
        errors::ResolutionError,
        filter::CommandsFilter,
        paths,
        runner::{EvaluationRunner, RunReport},
    },
    models::{CommandEvaluation, Evaluation, ExecutionMode},
    system::executor::{ExecutionError, OutputMode, ProcessExecutor},
};

/// The selection flags shared by `plan` and `run`.
#[derive(Args, Debug, Default, Clone)]
pub struct FilterArgs {
    /// Files or directories to run over. Defaults to the paths configured under
    /// `[sources]`, or the current directory when there are none.
    pub sources: Vec<PathBuf>,

    /// Contexts applied to every source, lowest precedence first.
    #[arg(short = 'c', long = "context")]
    pub contexts: Vec<String>,

    /// Only run these commands.
    #[arg(long = "allow", conflicts_with = "deny")]
    pub allow: Vec<String>,

    /// Never run these commands.
    #[arg(long = "deny")]
    pub deny: Vec<String>,
}

impl FilterArgs {
    /// The sources to resolve, falling back to the configured ones.
    pub fn sources(&self, config: &Configuration) -> Vec<PathBuf> {
        if !self.sources.is_empty() {
            return self.sources.clone();
        }
        let configured: Vec<PathBuf> = config
            .filters()
            .iter()
            .map(|(path, _)| {
                if path.as_os_str().is_empty() {
                    PathBuf::from(".")
                } else {
                    path.clone()
                }
            })
            .collect();
        if configured.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            configured
        }
    }

    /// The global filter built from the flags.
    pub fn to_filter(&self, config: &Configuration) -> Result<CommandsFilter> {
        config
            .filter_from_names(&self.contexts, &self.allow, &self.deny)
            .context("Invalid command line filter")
    }
}

// --- Configuration ---

/// Loads the configuration from `explicit`, or from the nearest `toolmesh.toml`.
pub fn load_configuration(explicit: Option<&Path>) -> Result<Configuration> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => paths::find_config_file(&env::current_dir()?)?,
    };
    config_loader::load_configuration(&path)
        .with_context(|| format!("Failed to load configuration '{}'", path.display()))
}

/// Opens the history described by the configuration, or the default one when
/// no configuration file exists and none was requested.
pub fn open_cache(explicit: Option<&Path>) -> Result<Cache> {
    let settings = match explicit {
        Some(_) => load_configuration(explicit)?.cache().clone(),
        None => match paths::find_config_file(&env::current_dir()?) {
            Ok(path) => load_configuration(Some(&path))?.cache().clone(),
            Err(e) => {
                log::debug!("{}; using the default history.", e);
                CacheSettings::default()
            }
        },
    };
    Ok(Cache::from_settings(&settings)?)
}

// --- Execution ---

/// What `execute_plan` should do besides running.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionOptions {
    /// Which runner strategy to use.
    pub mode: ExecutionMode,
    /// Whether tool output is captured or streamed.
    pub output_mode: OutputMode,
    /// Whether the evaluation is recorded in the history.
    pub save: bool,
}

/// Runs `map`, prints the results and records them in `cache`.
pub fn execute_plan(map: &CommandsMap, cache: &Cache, options: ExecutionOptions) -> Result<Outcome> {
    if map.is_empty() {
        println!("{}", "Nothing to run.".yellow());
        return Ok(Outcome::Success);
    }

    println!(
        "{} {} command(s) over {} source(s) ({})",
        "→".blue(),
        map.command_count(),
        map.len(),
        mode_label(options.mode)
    );

    let runner = EvaluationRunner::for_mode(options.mode, ProcessExecutor::new()).with_output_mode(options.output_mode);
    let mut on_update = |source: &Path, eval: &CommandEvaluation| print_progress(source, eval);
    let report = runner.evaluate(map, Some(&mut on_update))?;

    print_report(&report);

    if options.save {
        match cache.save(&report.evaluation)? {
            Some(record) => log::debug!("Evaluation saved as '{}'", record.id),
            None => log::debug!("History disabled; evaluation not saved"),
        }
    }

    Ok(if report.is_clean() {
        Outcome::Success
    } else {
        Outcome::Failures
    })
}

fn mode_label(mode: ExecutionMode) -> &'static str {
    match mode {
        ExecutionMode::Sync => "sync",
        ExecutionMode::Async => "async",
    }
}

// --- Rendering ---

fn status_mark(success: bool) -> colored::ColoredString {
    if success { "✓".green() } else { "✗".red() }
}

/// Prints one line per finished command.
pub fn print_progress(source: &Path, eval: &CommandEvaluation) {
    println!(
        "  {} {} {} {}",
        status_mark(eval.success),
        eval.command.name().cyan(),
        source.display(),
        format!("({:.2}s)", eval.execution_duration.as_secs_f64()).dimmed()
    );
}

/// Prints the plan, one source at a time.
pub fn print_commands_map(map: &CommandsMap) {
    for (source, commands) in map.iter() {
        println!("{}", source.display().to_string().yellow().bold());
        for command in commands {
            println!("  {} {}", "├─>".dimmed(), command.display_line().green());
        }
    }
}

/// Prints resolution problems as warnings.
pub fn print_resolution_errors(errors: &[ResolutionError]) {
    for error in errors {
        eprintln!("{} {}", "warning:".yellow().bold(), error);
    }
}

/// Prints the commands that could not run.
pub fn print_execution_errors(errors: &[ExecutionError]) {
    for error in errors {
        eprintln!("{} {}", "error:".red().bold(), error);
    }
}

/// Prints every command of `evaluation`, with the output of failed ones.
pub fn print_evaluation(evaluation: &Evaluation) {
    for (source, source_eval) in &evaluation.sources_evaluations {
        println!(
            "\n{} {}",
            source.display().to_string().yellow().bold(),
            format!("({:.2}s)", source_eval.source_execution_duration.as_secs_f64()).dimmed()
        );
        for eval in &source_eval.commands_evaluations {
            println!("  {} {}", status_mark(eval.success), eval.command.display_line());
            if !eval.success {
                for line in &eval.captured_output {
                    println!("      {}", line.dimmed());
                }
            }
        }
    }
    print_summary(evaluation);
}

fn print_summary(evaluation: &Evaluation) {
    let failures = evaluation.failure_count();
    let summary = format!(
        "{} command(s), {} failed, in {:.2}s",
        evaluation.command_count(),
        failures,
        evaluation.total_execution_duration.as_secs_f64()
    );
    if failures == 0 {
        println!("\n{}", summary.green().bold());
    } else {
        println!("\n{}", summary.red().bold());
    }
}

/// Prints the evaluation followed by the commands that could not run.
pub fn print_report(report: &RunReport) {
    print_evaluation(&report.evaluation);
    print_execution_errors(&report.errors);
}
