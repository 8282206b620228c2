// src/core/runner.rs

//! # Evaluation Runner
//!
//! Executes a `CommandsMap` and records an `Evaluation`. Two strategies share the
//! same contract and are selected through `EvaluationRunner::for_mode`:
//!
//! - `SequentialRunner`: one blocking subprocess at a time, sources in map order,
//!   commands in list order.
//! - `ConcurrentRunner`: every (source, command) pair is a future polled on a
//!   single-threaded tokio runtime. Two locks are involved:
//!   1. a per-source lock, held only while one command runs against that source;
//!   2. an evaluation-wide lock, held only while a finished result is appended.
//!
//! Before anything runs, both strategies locate every executable. Commands whose tool
//! is missing are reported in `RunReport::errors` and never scheduled.

use crate::{
    core::commands_map::CommandsMap,
    models::{Command, CommandEvaluation, Evaluation, ExecutionMode, SourceEvaluation},
    system::executor::{ExecutionError, Executor, OutputMode, ProcessExecutor, ProcessOutput},
};
use futures::future::join_all;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use std::time::Instant;
use tokio::sync::Mutex as AsyncMutex;

/// Called after each command finishes, with the source it ran against.
pub type UpdateCallback<'a> = &'a mut dyn FnMut(&Path, &CommandEvaluation);

/// The outcome of a run: what was evaluated, plus every command that could not run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Every command that ran.
    pub evaluation: Evaluation,
    /// Every command that could not run.
    pub errors: Vec<ExecutionError>,
}

impl RunReport {
    /// True when every scheduled command ran and succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.evaluation.has_failures()
    }
}

// --- Pre-flight ---

/// Splits `map` into the commands whose executable exists and the ones reported missing.
fn preflight<E: Executor>(executor: &E, map: &CommandsMap) -> (CommandsMap, Vec<ExecutionError>) {
    let mut located: HashMap<&str, bool> = HashMap::new();
    let mut runnable = CommandsMap::new();
    let mut errors = Vec::new();

    for (source, command) in map.pairs() {
        let found = *located.entry(command.name()).or_insert_with(|| {
            let found = executor.locate(command.name());
            log::trace!("Locating '{}': {:?}", command.name(), found);
            found.is_some()
        });
        if found {
            runnable.push(source.clone(), command.clone());
        } else {
            log::warn!("Executable '{}' not found, skipping it for '{}'", command.name(), source.display());
            errors.push(ExecutionError::ExecutableNotFound {
                program: command.name().to_string(),
                source_path: source.clone(),
            });
        }
    }
    (runnable, errors)
}

fn command_evaluation(command: &Command, output: ProcessOutput, started: Instant, ended: Instant) -> CommandEvaluation {
    CommandEvaluation {
        command: command.clone(),
        success: output.success,
        execution_duration: ended.duration_since(started),
        captured_output: output.lines,
    }
}

// --- Sequential Strategy ---

/// Runs commands one at a time, in map order.
#[derive(Debug, Clone, Default)]
pub struct SequentialRunner<E = ProcessExecutor> {
    executor: E,
    output_mode: OutputMode,
}

impl<E: Executor> SequentialRunner<E> {
    /// A runner spawning tools through `executor`.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            output_mode: OutputMode::Captured,
        }
    }

    /// Sets how tool output is handled.
    pub fn with_output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    /// Runs every command of `map`, calling `on_update` after each one.
    pub fn evaluate(&self, map: &CommandsMap, mut on_update: Option<UpdateCallback<'_>>) -> RunReport {
        let total_start = Instant::now();
        let (runnable, mut errors) = preflight(&self.executor, map);
        let mut evaluation = Evaluation::default();

        for (source, commands) in runnable.iter() {
            let source_start = Instant::now();
            let mut source_evaluation = SourceEvaluation::default();

            for command in commands {
                log::debug!("Running '{}' on '{}'", command.name(), source.display());
                let started = Instant::now();
                match self.executor.execute(command, source, self.output_mode) {
                    Ok(output) => {
                        let eval = command_evaluation(command, output, started, Instant::now());
                        log::debug!(
                            "'{}' on '{}' finished (success: {})",
                            command.name(),
                            source.display(),
                            eval.success
                        );
                        if let Some(callback) = on_update.as_mut() {
                            callback(source, &eval);
                        }
                        source_evaluation.commands_evaluations.push(eval);
                    }
                    Err(error) => {
                        log::warn!("{}", error);
                        errors.push(error);
                    }
                }
            }

            if !source_evaluation.commands_evaluations.is_empty() {
                source_evaluation.source_execution_duration = source_start.elapsed();
                evaluation.sources_evaluations.insert(source.clone(), source_evaluation);
            }
        }

        evaluation.total_execution_duration = total_start.elapsed();
        RunReport { evaluation, errors }
    }
}

// --- Concurrent Strategy ---

/// Per-source locks, created on first use and kept for the registry's lifetime.
///
/// A registry belongs to a runner. Share one explicitly (through `Arc`) when several
/// runs must not touch the same source at the same time.
#[derive(Debug, Default)]
pub struct SourceLocks {
    locks: std::sync::Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl SourceLocks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock guarding `source`.
    pub fn lock_for(&self, source: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(source.to_path_buf()).or_default())
    }

    /// Number of distinct sources seen so far.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The evaluation being built, plus the execution window of every source.
#[derive(Default)]
struct SharedEvaluation {
    evaluation: Evaluation,
    windows: HashMap<PathBuf, (Instant, Instant)>,
}

impl SharedEvaluation {
    fn record(&mut self, source: &Path, started: Instant, ended: Instant, eval: CommandEvaluation) {
        let window = self
            .windows
            .entry(source.to_path_buf())
            .or_insert((started, ended));
        window.0 = window.0.min(started);
        window.1 = window.1.max(ended);
        let duration = window.1.duration_since(window.0);

        let source_evaluation = self
            .evaluation
            .sources_evaluations
            .entry(source.to_path_buf())
            .or_default();
        source_evaluation.commands_evaluations.push(eval);
        source_evaluation.source_execution_duration = duration;
    }
}

/// Runs every (source, command) pair as a task on one thread. Commands on the
/// same source never overlap.
#[derive(Debug, Clone, Default)]
pub struct ConcurrentRunner<E = ProcessExecutor> {
    executor: E,
    locks: Arc<SourceLocks>,
}

impl<E: Executor> ConcurrentRunner<E> {
    /// A runner spawning tools through `executor`.
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            locks: Arc::new(SourceLocks::new()),
        }
    }

    /// Uses `locks` instead of a registry private to this runner.
    pub fn with_locks(mut self, locks: Arc<SourceLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// The per-source lock registry.
    pub fn locks(&self) -> &Arc<SourceLocks> {
        &self.locks
    }

    /// Runs `map` on a fresh single-threaded runtime and blocks until every command is done.
    ///
    /// # Errors
    /// Only fails if the runtime cannot be created; per-command problems are in the report.
    pub fn evaluate(
        &self,
        map: &CommandsMap,
        on_update: Option<UpdateCallback<'_>>,
    ) -> Result<RunReport, ExecutionError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutionError::Runtime)?;
        Ok(runtime.block_on(self.evaluate_async(map, on_update)))
    }

    /// The async body of `evaluate`, for callers already inside a runtime.
    pub async fn evaluate_async(&self, map: &CommandsMap, on_update: Option<UpdateCallback<'_>>) -> RunReport {
        let total_start = Instant::now();
        let (runnable, mut errors) = preflight(&self.executor, map);
        log::debug!("Scheduling {} commands over {} sources", runnable.command_count(), runnable.len());

        let shared = AsyncMutex::new(SharedEvaluation::default());
        let on_update = RefCell::new(on_update);
        let tasks = runnable
            .pairs()
            .map(|(source, command)| self.run_one(source, command, &shared, &on_update));
        let results = join_all(tasks).await;
        errors.extend(results.into_iter().filter_map(Result::err));

        let mut evaluation = shared.into_inner().evaluation;
        evaluation.total_execution_duration = total_start.elapsed();
        RunReport { evaluation, errors }
    }

    async fn run_one(
        &self,
        source: &Path,
        command: &Command,
        shared: &AsyncMutex<SharedEvaluation>,
        on_update: &RefCell<Option<UpdateCallback<'_>>>,
    ) -> Result<(), ExecutionError> {
        let source_lock = self.locks.lock_for(source);
        let (output, started, ended) = {
            let _guard = source_lock.lock().await;
            log::trace!("Lock acquired for '{}' ({})", source.display(), command.name());
            let started = Instant::now();
            let output = self.executor.execute_async(command, source).await;
            (output, started, Instant::now())
        };

        let output = output.inspect_err(|error| log::warn!("{}", error))?;
        let eval = command_evaluation(command, output, started, ended);
        log::debug!(
            "'{}' on '{}' finished (success: {})",
            command.name(),
            source.display(),
            eval.success
        );

        if let Some(callback) = on_update.borrow_mut().as_mut() {
            callback(source, &eval);
        }
        shared.lock().await.record(source, started, ended, eval);
        Ok(())
    }
}

// --- Strategy Selection ---

/// The two runner strategies behind one `evaluate` contract.
#[derive(Debug, Clone)]
pub enum EvaluationRunner<E = ProcessExecutor> {
    /// One command at a time.
    Sequential(SequentialRunner<E>),
    /// Cooperative tasks on one thread.
    Concurrent(ConcurrentRunner<E>),
}

impl<E: Executor> EvaluationRunner<E> {
    /// The runner matching `mode`.
    pub fn for_mode(mode: ExecutionMode, executor: E) -> Self {
        match mode {
            ExecutionMode::Sync => Self::Sequential(SequentialRunner::new(executor)),
            ExecutionMode::Async => Self::Concurrent(ConcurrentRunner::new(executor)),
        }
    }

    /// Sets how tool output is handled. The concurrent strategy always captures.
    pub fn with_output_mode(self, output_mode: OutputMode) -> Self {
        match self {
            Self::Sequential(runner) => Self::Sequential(runner.with_output_mode(output_mode)),
            Self::Concurrent(runner) => {
                if output_mode == OutputMode::Streamed {
                    log::debug!("Streamed output is not available in async mode; capturing instead.");
                }
                Self::Concurrent(runner)
            }
        }
    }

    /// The strategy of this runner.
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Self::Sequential(_) => ExecutionMode::Sync,
            Self::Concurrent(_) => ExecutionMode::Async,
        }
    }

    /// Runs `map` with the selected strategy.
    ///
    /// # Errors
    /// Only the concurrent strategy fails as a whole, when its runtime cannot start.
    pub fn evaluate(
        &self,
        map: &CommandsMap,
        on_update: Option<UpdateCallback<'_>>,
    ) -> Result<RunReport, ExecutionError> {
        match self {
            Self::Sequential(runner) => Ok(runner.evaluate(map, on_update)),
            Self::Concurrent(runner) => runner.evaluate(map, on_update),
        }
    }
}
