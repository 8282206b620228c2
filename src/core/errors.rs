// src/core/errors.rs

//! Error types shared by the resolution engine (contexts, builders, filters).
//!
//! Execution and cache failures live next to the code that produces them
//! (`system::executor` and `core::cache`).

use std::fmt;
use thiserror::Error;

/// The role a context plays inside a `CommandBuilder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextRole {
    /// The context must be present for the command to be built.
    Required,
    /// The context may be present.
    Allowed,
    /// The context must not be present.
    Denied,
    /// The context rewrites the default arguments when present.
    Specified,
}

impl fmt::Display for ContextRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Required => "required",
            Self::Allowed => "allowed",
            Self::Denied => "denied",
            Self::Specified => "specifications",
        };
        f.write_str(label)
    }
}

/// Inconsistent context, command or filter definitions.
///
/// These are raised while the configuration is resolved, never while commands run.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// One or more contexts reference a parent that never resolves
    /// (missing parent, or a parent cycle).
    #[error("Unresolvable contexts (missing parent or cycle): {}", names.join(", "))]
    UnresolvableContexts {
        /// Every context that could not be resolved, sorted by name.
        names: Vec<String>,
    },
    /// Two contexts share the same name.
    #[error("Context '{name}' is defined more than once.")]
    DuplicateContext {
        /// The duplicated name.
        name: String,
    },
    /// An alias collides with the name or alias of another context.
    #[error("Alias '{alias}' of context '{context}' collides with context '{other}'.")]
    AliasCollision {
        /// The colliding alias.
        alias: String,
        /// The context declaring the alias.
        context: String,
        /// The context that already owns the name.
        other: String,
    },
    /// Setting `parent` as the parent of `context` would create a cycle.
    #[error("Cannot set '{parent}' as parent of '{context}': it would create a cycle.")]
    ContextCycle {
        /// The context being re-parented.
        context: String,
        /// The requested parent.
        parent: String,
    },
    /// A reference to a context that does not exist.
    #[error("Context '{name}' does not exist.")]
    UnknownContext {
        /// The missing context name.
        name: String,
    },
    /// A reference to a command that does not exist.
    #[error("Command '{name}' does not exist.")]
    UnknownCommand {
        /// The missing command name.
        name: String,
    },
    /// Two commands share the same name.
    #[error("Command '{name}' is defined more than once.")]
    DuplicateCommand {
        /// The duplicated name.
        name: String,
    },
    /// A specification sets two argument-rewrite modes at once.
    #[error("A context specification cannot combine '{first}' and '{second}'.")]
    ConflictingSpecification {
        /// The first active mode.
        first: &'static str,
        /// The second active mode.
        second: &'static str,
    },
    /// A context was put in two of the required/allowed/denied/specifications sets.
    #[error("Command '{command}': context '{context}' is already {existing}, it cannot also be {attempted}.")]
    ContextOverlap {
        /// The command whose context sets clash.
        command: String,
        /// The offending context.
        context: String,
        /// Where the context already is.
        existing: ContextRole,
        /// Where it was being added.
        attempted: ContextRole,
    },
    /// A single filter was given both an allow-list and a deny-list.
    #[error("A commands filter cannot have both an allow-list and a deny-list.")]
    AllowAndDenyLists,
    /// Merging filters would allow and deny the same commands.
    #[error("Commands both allowed and denied: {}", commands.join(", "))]
    ContradictoryFilters {
        /// The commands present in both lists, sorted.
        commands: Vec<String>,
    },
    /// The configured history size cannot hold a single run.
    #[error("Cache history size must be at least 1 (got {0}).")]
    InvalidHistorySize(usize),
    /// An argument string could not be split like a shell would.
    #[error("Arguments of '{owner}' could not be parsed: {args}")]
    InvalidArgs {
        /// The command or specification owning the string.
        owner: String,
        /// The raw string.
        args: String,
    },
    /// A configured path could not be expanded, or no configuration file was found.
    #[error("Path error: {0}")]
    Path(#[from] crate::core::paths::PathError),
    /// The configuration file could not be read.
    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid TOML for this schema.
    #[error("Failed to parse configuration: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// A concrete context set does not satisfy a builder's constraints.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", describe_invalid(command, missing, disallowed))]
pub struct InvalidCommand {
    /// The builder that rejected the contexts.
    pub command: String,
    /// Required contexts that were not matched by any given context.
    pub missing: Vec<String>,
    /// Given contexts that the builder does not accept.
    pub disallowed: Vec<String>,
}

fn describe_invalid(command: &str, missing: &[String], disallowed: &[String]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing required contexts: {}", missing.join(", ")));
    }
    if !disallowed.is_empty() {
        parts.push(format!("disallowed contexts: {}", disallowed.join(", ")));
    }
    format!("Invalid command '{}': {}", command, parts.join("; "))
}

/// A problem found while building the commands map for one source.
///
/// It halts only the affected source or command; the rest of the map is still built.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The global and per-source filters cannot be combined.
    #[error("Source '{source_path}': {error}")]
    Filter {
        /// The source being resolved.
        source_path: String,
        /// The merge failure.
        #[source]
        error: ConfigError,
    },
    /// A command explicitly allowed for the source rejects its contexts.
    #[error("Source '{source_path}': {error}")]
    Validation {
        /// The source being resolved.
        source_path: String,
        /// The validation failure.
        #[source]
        error: InvalidCommand,
    },
    /// An allow-list names a command that is not configured.
    #[error("Source '{source_path}': command '{command}' is not configured.")]
    UnknownCommand {
        /// The source being resolved.
        source_path: String,
        /// The unknown command name.
        command: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_command_reports_both_lists() {
        let err = InvalidCommand {
            command: "lint".to_string(),
            missing: vec!["ci".to_string(), "py".to_string()],
            disallowed: vec!["fast".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("missing required contexts: ci, py"));
        assert!(message.contains("disallowed contexts: fast"));
    }

    #[test]
    fn test_context_overlap_names_both_roles() {
        let err = ConfigError::ContextOverlap {
            command: "lint".to_string(),
            context: "ci".to_string(),
            existing: ContextRole::Required,
            attempted: ContextRole::Allowed,
        };
        assert_eq!(
            err.to_string(),
            "Command 'lint': context 'ci' is already required, it cannot also be allowed."
        );
    }
}
