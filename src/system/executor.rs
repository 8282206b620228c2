// src/system/executor.rs

//! Spawning external tools against a source.
//!
//! The runners only depend on the `Executor` trait: locate a program, run it
//! (blocking or as a future) and get back the exit status with the captured lines.
//! `ProcessExecutor` is the real implementation on top of `std::process` and
//! `tokio::process`.

use crate::{constants::SOURCE_PLACEHOLDER, models::Command};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Output, Stdio};
use thiserror::Error;

/// Why a command produced no evaluation.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// The tool is not installed (or not on `PATH`). Nothing was run.
    #[error("Executable '{program}' not found (needed for '{}').", source_path.display())]
    ExecutableNotFound {
        /// The program as written in the command.
        program: String,
        /// The source it was meant to run against.
        source_path: PathBuf,
    },
    /// The tool was found but the process could not be started.
    #[error("Command '{program}' could not be started for '{}': {error}", source_path.display())]
    Spawn {
        /// The program as written in the command.
        program: String,
        /// The source it was meant to run against.
        source_path: PathBuf,
        /// The operating system error.
        #[source]
        error: std::io::Error,
    },
    /// The async runtime driving the concurrent runner could not be built.
    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// How a tool's output is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputMode {
    /// Stdout then stderr lines are returned to the caller.
    #[default]
    Captured,
    /// The tool writes straight to the terminal; nothing is returned.
    Streamed,
}

/// What a finished process reports back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Stdout lines followed by stderr lines.
    pub lines: Vec<String>,
}

/// The narrow contract the runners need from the operating system.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Returns the resolved path of `program`, or `None` if it cannot be run.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Runs `command` against `source` and blocks until it exits.
    ///
    /// A non-zero exit is not an error: it is reported through `ProcessOutput::success`.
    fn execute(&self, command: &Command, source: &Path, mode: OutputMode) -> Result<ProcessOutput, ExecutionError>;

    /// Same as `execute`, as a future; output is always captured.
    async fn execute_async(&self, command: &Command, source: &Path) -> Result<ProcessOutput, ExecutionError>;
}

/// Builds the final argument list for `source`.
///
/// Every `{source}` token is substituted with the source path. When no argument
/// carries the token, the path is appended as the last argument.
pub fn invocation_args(command: &Command, source: &Path) -> Vec<String> {
    let source = source.to_string_lossy();
    if command.args().iter().any(|arg| arg.contains(SOURCE_PLACEHOLDER)) {
        command
            .args()
            .iter()
            .map(|arg| arg.replace(SOURCE_PLACEHOLDER, &source))
            .collect()
    } else {
        let mut args = command.args().to_vec();
        args.push(source.into_owned());
        args
    }
}

/// Searches `PATH` for `program`. Paths with a directory part are checked as-is.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.is_absolute() || candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path_var = env::var_os("PATH")?;
    env::split_paths(&path_var).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        if cfg!(target_os = "windows") {
            let exe = full.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

fn collect_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .chain(String::from_utf8_lossy(&output.stderr).lines())
        .map(str::to_string)
        .collect()
}

/// Runs tools as real subprocesses from the current directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Creates an executor.
    pub fn new() -> Self {
        Self
    }

    fn spawn_error(command: &Command, source: &Path, error: std::io::Error) -> ExecutionError {
        if error.kind() == std::io::ErrorKind::NotFound {
            ExecutionError::ExecutableNotFound {
                program: command.name().to_string(),
                source_path: source.to_path_buf(),
            }
        } else {
            ExecutionError::Spawn {
                program: command.name().to_string(),
                source_path: source.to_path_buf(),
                error,
            }
        }
    }
}

impl Executor for ProcessExecutor {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        find_executable(program)
    }

    fn execute(&self, command: &Command, source: &Path, mode: OutputMode) -> Result<ProcessOutput, ExecutionError> {
        let args = invocation_args(command, source);
        log::trace!("Spawning '{}' with {:?}", command.name(), args);

        let mut process = StdCommand::new(command.name());
        process.args(&args).stdin(Stdio::null());

        match mode {
            OutputMode::Captured => {
                let output = process
                    .output()
                    .map_err(|e| Self::spawn_error(command, source, e))?;
                Ok(ProcessOutput {
                    success: output.status.success(),
                    lines: collect_lines(&output),
                })
            }
            OutputMode::Streamed => {
                let status = process
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .map_err(|e| Self::spawn_error(command, source, e))?;
                Ok(ProcessOutput {
                    success: status.success(),
                    lines: Vec::new(),
                })
            }
        }
    }

    async fn execute_async(&self, command: &Command, source: &Path) -> Result<ProcessOutput, ExecutionError> {
        let args = invocation_args(command, source);
        log::trace!("Spawning '{}' with {:?} (async)", command.name(), args);

        let mut process = tokio::process::Command::new(command.name());
        process.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = process
            .output()
            .await
            .map_err(|e| Self::spawn_error(command, source, e))?;
        Ok(ProcessOutput {
            success: output.status.success(),
            lines: collect_lines(&output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, args: &[&str]) -> Command {
        Command::new(name, args.iter().map(|a| a.to_string()).collect())
    }

    #[test]
    fn test_source_is_appended_without_placeholder() {
        let args = invocation_args(&command("lint", &["--check"]), Path::new("src/a.py"));
        assert_eq!(args, ["--check", "src/a.py"]);
    }

    #[test]
    fn test_source_placeholder_is_substituted() {
        let args = invocation_args(
            &command("lint", &["--input={source}", "--strict", "{source}"]),
            Path::new("a.py"),
        );
        assert_eq!(args, ["--input=a.py", "--strict", "a.py"]);
    }

    #[test]
    fn test_find_executable_missing() {
        assert!(find_executable("toolmesh-surely-not-an-installed-tool").is_none());
        assert!(find_executable("/definitely/not/here/tool").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_executable_in_path() {
        assert!(find_executable("sh").is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_captures_stdout_then_stderr() {
        let executor = ProcessExecutor::new();
        let output = executor
            .execute(
                &command("sh", &["-c", "echo err >&2; echo out", "{source}"]),
                Path::new("ignored"),
                OutputMode::Captured,
            )
            .unwrap();
        assert!(output.success);
        assert_eq!(output.lines, ["out", "err"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_not_an_error() {
        let executor = ProcessExecutor::new();
        let output = executor
            .execute(&command("sh", &["-c", "exit 3", "{source}"]), Path::new("x"), OutputMode::Captured)
            .unwrap();
        assert!(!output.success);
    }

    #[test]
    fn test_missing_program_is_reported() {
        let executor = ProcessExecutor::new();
        let result = executor.execute(
            &command("toolmesh-surely-not-an-installed-tool", &[]),
            Path::new("x"),
            OutputMode::Captured,
        );
        assert!(matches!(result, Err(ExecutionError::ExecutableNotFound { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_async_captures_output() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let executor = ProcessExecutor::new();
        let output = runtime
            .block_on(executor.execute_async(&command("echo", &["hello"]), Path::new("a.py")))
            .unwrap();
        assert!(output.success);
        assert_eq!(output.lines, ["hello a.py"]);
    }
}
