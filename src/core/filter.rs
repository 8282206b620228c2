// src/core/filter.rs

//! # Commands Filters
//!
//! A `CommandsFilter` selects which builders apply to a source: the contexts the
//! source is evaluated under, plus an optional allow-list or deny-list of command
//! names. Filters compose with `merge` (a global filter from the command line with a
//! per-source filter from the configuration).
//!
//! `FiltersRepository` registers filters per path; a filter registered for a directory
//! is inherited by everything below it unless a deeper path has its own filter.

use crate::core::{
    command_builder::{CommandBuilder, ContextSet},
    context::{Context, ContextsRepository},
    errors::ConfigError,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Selects the builders that apply to a source and the contexts they are built with.
#[derive(Debug, Clone, Default)]
pub struct CommandsFilter {
    contexts: ContextSet,
    allowed_commands: Option<BTreeSet<String>>,
    denied_commands: Option<BTreeSet<String>>,
}

impl CommandsFilter {
    /// Creates a filter.
    ///
    /// # Errors
    /// Returns `AllowAndDenyLists` if both an allow-list and a deny-list are given.
    pub fn new(
        contexts: Vec<Arc<Context>>,
        allowed_commands: Option<BTreeSet<String>>,
        denied_commands: Option<BTreeSet<String>>,
    ) -> Result<Self, ConfigError> {
        if allowed_commands.is_some() && denied_commands.is_some() {
            return Err(ConfigError::AllowAndDenyLists);
        }
        Ok(Self {
            contexts: contexts.into_iter().collect(),
            allowed_commands,
            denied_commands,
        })
    }

    /// A filter that selects every builder, under no context.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter with contexts and no command lists.
    pub fn with_contexts(contexts: Vec<Arc<Context>>) -> Self {
        Self {
            contexts: contexts.into_iter().collect(),
            ..Default::default()
        }
    }

    /// A filter selecting only `commands`.
    pub fn allowing<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_commands: Some(commands.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// A filter selecting everything but `commands`.
    pub fn denying<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            denied_commands: Some(commands.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// The contexts, in the order their specifications are applied.
    pub fn contexts(&self) -> Vec<Arc<Context>> {
        self.contexts.iter().cloned().collect()
    }

    /// Names of the contexts, in order.
    pub fn context_names(&self) -> Vec<String> {
        self.contexts.names()
    }

    /// `None` means every command is allowed.
    pub fn allowed_commands(&self) -> Option<&BTreeSet<String>> {
        self.allowed_commands.as_ref()
    }

    /// `None` means no command is denied.
    pub fn denied_commands(&self) -> Option<&BTreeSet<String>> {
        self.denied_commands.as_ref()
    }

    /// Whether the name survives the allow/deny lists (contexts not considered).
    pub fn allows_name(&self, name: &str) -> bool {
        let not_denied = self
            .denied_commands
            .as_ref()
            .is_none_or(|denied| !denied.contains(name));
        let allowed = self
            .allowed_commands
            .as_ref()
            .is_none_or(|allowed| allowed.contains(name));
        not_denied && allowed
    }

    /// Whether `builder` applies under this filter: its name passes the lists and it
    /// accepts the filter's contexts.
    pub fn pass_filter(&self, builder: &CommandBuilder) -> bool {
        self.allows_name(builder.name()) && builder.match_contexts(&self.contexts())
    }

    /// Combines two filters: contexts are united (this filter's first), allow-lists
    /// intersected (`None` meaning every command), deny-lists united.
    ///
    /// # Errors
    /// Returns `ContradictoryFilters` if the result would allow and deny the same command.
    pub fn merge(&self, other: &Self) -> Result<Self, ConfigError> {
        let mut contexts = self.contexts.clone();
        for context in other.contexts.iter() {
            contexts.insert(Arc::clone(context));
        }

        let allowed_commands = match (&self.allowed_commands, &other.allowed_commands) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (Some(first), Some(second)) => Some(first.intersection(second).cloned().collect()),
        };

        let denied_commands = match (&self.denied_commands, &other.denied_commands) {
            (None, None) => None,
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (Some(first), Some(second)) => Some(first.union(second).cloned().collect()),
        };

        if let (Some(allowed), Some(denied)) = (&allowed_commands, &denied_commands) {
            let commands: Vec<String> = allowed.intersection(denied).cloned().collect();
            if !commands.is_empty() {
                return Err(ConfigError::ContradictoryFilters { commands });
            }
        }

        Ok(Self {
            contexts,
            allowed_commands,
            denied_commands,
        })
    }

    /// Drops `name` from the contexts. Returns `true` if it was present.
    pub fn remove_context(&mut self, name: &str) -> bool {
        self.contexts.remove(name).is_some()
    }

    /// Drops `name` from the allow and deny lists. Returns `true` if it was present.
    pub fn remove_command(&mut self, name: &str) -> bool {
        let from_allowed = self
            .allowed_commands
            .as_mut()
            .is_some_and(|allowed| allowed.remove(name));
        let from_denied = self
            .denied_commands
            .as_mut()
            .is_some_and(|denied| denied.remove(name));
        from_allowed || from_denied
    }

    /// Swaps the contexts for their current resolution in `repository`.
    pub fn rebind(&mut self, repository: &ContextsRepository) {
        self.contexts.rebind(repository);
    }
}

// --- Per-path registry ---

/// Filters registered per source path, inherited by nested paths.
#[derive(Debug, Clone, Default)]
pub struct FiltersRepository {
    filters: BTreeMap<PathBuf, CommandsFilter>,
    fallback: CommandsFilter,
}

impl FiltersRepository {
    /// An empty registry: every path gets the select-all filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `filter` for `path`, replacing any previous one. Returns the previous filter.
    pub fn insert(&mut self, path: impl AsRef<Path>, filter: CommandsFilter) -> Option<CommandsFilter> {
        self.filters.insert(normalize(path.as_ref()), filter)
    }

    /// The filter registered exactly for `path`.
    pub fn get(&self, path: &Path) -> Option<&CommandsFilter> {
        self.filters.get(&normalize(path))
    }

    /// The filter that applies to `path`: an exact registration first, then the nearest
    /// registered ancestor, otherwise an empty filter that selects everything.
    pub fn lookup(&self, path: &Path) -> &CommandsFilter {
        let normalized = normalize(path);
        for ancestor in normalized.ancestors() {
            if let Some(filter) = self.filters.get(ancestor) {
                log::trace!(
                    "Filter for '{}' found at '{}'",
                    path.display(),
                    ancestor.display()
                );
                return filter;
            }
        }
        &self.fallback
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Registered paths, `.` components dropped, with their filters.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &CommandsFilter)> {
        self.filters.iter()
    }

    /// Iterates mutably over the entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PathBuf, &mut CommandsFilter)> {
        self.filters.iter_mut()
    }
}

/// Drops `.` components so `./src/a.py` and `src/a.py` share filters.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}
