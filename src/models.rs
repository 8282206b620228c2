// src/models.rs

//! Plain data records shared by the engine, the cache and the CLI.
//!
//! An `Evaluation` is persisted as JSON exactly as serialized here: durations are
//! written as fractional seconds.

use crate::core::commands_map::CommandsMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// --- RESOLVED COMMAND ---

/// A fully resolved, executable instruction: a tool name and its final arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    #[serde(default)]
    help: String,
    args: Vec<String>,
    #[serde(default)]
    version: Option<String>,
}

impl Command {
    /// A command with no help text and no version.
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            help: String::new(),
            args,
            version: None,
        }
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Sets the version requirement.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    /// The program to run.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// Final arguments, possibly holding a `{source}` token.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The version requirement, if any.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// The command line as it would be typed, for display.
    pub fn display_line(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// --- EXECUTION MODE ---

/// Which runner strategy executes a commands map.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One blocking subprocess at a time.
    #[default]
    Sync,
    /// Every (source, command) pair as a cooperative task.
    Async,
}

// --- EVALUATION RECORDS ---

/// The recorded outcome of executing one command against one source.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CommandEvaluation {
    /// The command as it ran.
    pub command: Command,
    /// Whether the tool exited with status zero.
    pub success: bool,
    /// Wall time of the process.
    #[serde(with = "duration_secs")]
    pub execution_duration: Duration,
    /// Stdout then stderr lines; empty when streamed.
    #[serde(default)]
    pub captured_output: Vec<String>,
}

/// Every command evaluated against a single source.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SourceEvaluation {
    /// In completion order.
    pub commands_evaluations: Vec<CommandEvaluation>,
    /// From the first command start to the last command end.
    #[serde(with = "duration_secs")]
    pub source_execution_duration: Duration,
}

impl SourceEvaluation {
    /// Returns `true` if any command failed.
    pub fn has_failures(&self) -> bool {
        self.commands_evaluations.iter().any(|eval| !eval.success)
    }
}

/// The outcome of a whole run, keyed by source path.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Per-source results, in path order.
    pub sources_evaluations: BTreeMap<PathBuf, SourceEvaluation>,
    /// Wall time of the whole run.
    #[serde(with = "duration_secs")]
    pub total_execution_duration: Duration,
}

impl Evaluation {
    /// Looks an entry up.
    pub fn get(&self, source: &Path) -> Option<&SourceEvaluation> {
        self.sources_evaluations.get(source)
    }

    /// Number of evaluated commands over every source.
    pub fn command_count(&self) -> usize {
        self.sources_evaluations
            .values()
            .map(|source| source.commands_evaluations.len())
            .sum()
    }

    /// Number of failed commands.
    pub fn failure_count(&self) -> usize {
        self.sources_evaluations
            .values()
            .flat_map(|source| source.commands_evaluations.iter())
            .filter(|eval| !eval.success)
            .count()
    }

    /// Returns `true` if any command failed.
    pub fn has_failures(&self) -> bool {
        self.sources_evaluations.values().any(SourceEvaluation::has_failures)
    }

    /// Rebuilds the commands map this evaluation was produced from.
    pub fn to_commands_map(&self) -> CommandsMap {
        self.commands_map_where(|_| true)
    }

    /// Rebuilds a commands map holding only the commands that failed.
    pub fn failed_commands_map(&self) -> CommandsMap {
        self.commands_map_where(|eval| !eval.success)
    }

    fn commands_map_where(&self, keep: impl Fn(&CommandEvaluation) -> bool) -> CommandsMap {
        let mut map = CommandsMap::new();
        for (source, source_eval) in &self.sources_evaluations {
            for eval in source_eval.commands_evaluations.iter().filter(|eval| keep(eval)) {
                map.push(source.clone(), eval.command.clone());
            }
        }
        map
    }
}

// --- SERDE HELPERS ---

/// Serializes a `Duration` as a number of seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(name: &str, success: bool) -> CommandEvaluation {
        CommandEvaluation {
            command: Command::new(name, vec!["--check".to_string()]),
            success,
            execution_duration: Duration::from_millis(250),
            captured_output: vec!["line".to_string()],
        }
    }

    fn sample() -> Evaluation {
        let mut evaluation = Evaluation::default();
        evaluation.sources_evaluations.insert(
            PathBuf::from("a.py"),
            SourceEvaluation {
                commands_evaluations: vec![eval("lint", true), eval("types", false)],
                source_execution_duration: Duration::from_millis(500),
            },
        );
        evaluation.sources_evaluations.insert(
            PathBuf::from("b.py"),
            SourceEvaluation {
                commands_evaluations: vec![eval("lint", true)],
                source_execution_duration: Duration::from_millis(250),
            },
        );
        evaluation.total_execution_duration = Duration::from_secs(1);
        evaluation
    }

    #[test]
    fn test_json_layout_matches_persisted_format() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["total_execution_duration"], 1.0);
        let source = &value["sources_evaluations"]["a.py"];
        assert_eq!(source["source_execution_duration"], 0.5);
        let first = &source["commands_evaluations"][0];
        assert_eq!(first["command"]["name"], "lint");
        assert_eq!(first["command"]["args"][0], "--check");
        assert_eq!(first["success"], true);
        assert_eq!(first["execution_duration"], 0.25);
        assert_eq!(first["captured_output"][0], "line");
    }

    #[test]
    fn test_counts_and_failed_map() {
        let evaluation = sample();
        assert_eq!(evaluation.command_count(), 3);
        assert_eq!(evaluation.failure_count(), 1);
        assert!(evaluation.has_failures());

        let failed = evaluation.failed_commands_map();
        assert_eq!(failed.len(), 1);
        let commands = failed.get(Path::new("a.py")).unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name(), "types");

        assert_eq!(evaluation.to_commands_map().command_count(), 3);
    }

    #[test]
    fn test_command_display_line() {
        let command = Command::new("ruff", vec!["check".to_string(), "--fix".to_string()]);
        assert_eq!(command.display_line(), "ruff check --fix");
    }
}
