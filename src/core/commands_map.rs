// src/core/commands_map.rs

use crate::{
    core::{
        command_builder::CommandsRepository,
        errors::ResolutionError,
        filter::{CommandsFilter, FiltersRepository},
    },
    models::Command,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// The execution plan of a run: for every source, the commands to execute against it.
///
/// Sources iterate in path order; commands keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandsMap {
    entries: BTreeMap<PathBuf, Vec<Command>>,
}

impl CommandsMap {
    /// An empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `command` to the commands of `source`.
    pub fn push(&mut self, source: impl Into<PathBuf>, command: Command) {
        self.entries.entry(source.into()).or_default().push(command);
    }

    /// Replaces the commands of `source`.
    pub fn insert(&mut self, source: impl Into<PathBuf>, commands: Vec<Command>) {
        self.entries.insert(source.into(), commands);
    }

    /// Looks an entry up.
    pub fn get(&self, source: &Path) -> Option<&[Command]> {
        self.entries.get(source).map(Vec::as_slice)
    }

    /// Sources with their commands, in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&PathBuf, &Vec<Command>)> {
        self.entries.iter()
    }

    /// Every (source, command) pair, sources first.
    pub fn pairs(&self) -> impl Iterator<Item = (&PathBuf, &Command)> {
        self.entries
            .iter()
            .flat_map(|(source, commands)| commands.iter().map(move |command| (source, command)))
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (source, command) pairs.
    pub fn command_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Drops every command whose name satisfies `predicate`, and sources left empty.
    pub fn remove_commands_where(&mut self, predicate: impl Fn(&Command) -> bool) {
        for commands in self.entries.values_mut() {
            commands.retain(|command| !predicate(command));
        }
        self.entries.retain(|_, commands| !commands.is_empty());
    }
}

/// The result of resolving sources: the plan plus every per-source/per-command problem.
#[derive(Debug, Default)]
pub struct Resolution {
    /// The plan.
    pub commands_map: CommandsMap,
    /// Problems found while resolving, in source order.
    pub errors: Vec<ResolutionError>,
}

/// Resolves which commands run against which sources.
///
/// For each source, the filter registered for it (or its nearest ancestor) is merged
/// with `global`, whose contexts are applied last. Every builder passing the merged
/// filter is built with the merged contexts. Builders named in an allow-list that
/// reject the contexts are reported; other non-matching builders are skipped.
/// A failing source or command never prevents the rest of the map from being built.
/// A source given more than once is resolved once.
pub fn build_commands_map(
    sources: &[PathBuf],
    commands: &CommandsRepository,
    filters: &FiltersRepository,
    global: &CommandsFilter,
) -> Resolution {
    let mut resolution = Resolution::default();
    let unique: BTreeSet<&PathBuf> = sources.iter().collect();

    for source in unique {
        let source_label = source.display().to_string();
        let filter = match filters.lookup(source).merge(global) {
            Ok(filter) => filter,
            Err(error) => {
                resolution.errors.push(ResolutionError::Filter {
                    source_path: source_label,
                    error,
                });
                continue;
            }
        };

        if let Some(allowed) = filter.allowed_commands() {
            for name in allowed.iter().filter(|name| commands.get(name).is_none()) {
                resolution.errors.push(ResolutionError::UnknownCommand {
                    source_path: source_label.clone(),
                    command: name.clone(),
                });
            }
        }

        let contexts = filter.contexts();
        let explicitly_allowed =
            |name: &str| filter.allowed_commands().is_some_and(|allowed| allowed.contains(name));

        for builder in commands.iter().filter(|builder| filter.allows_name(builder.name())) {
            match builder.build_command(&contexts) {
                Ok(command) => {
                    log::debug!("'{}' -> {}", source_label, command.display_line());
                    resolution.commands_map.push(source.clone(), command);
                }
                Err(error) if explicitly_allowed(builder.name()) => {
                    resolution.errors.push(ResolutionError::Validation {
                        source_path: source_label.clone(),
                        error,
                    });
                }
                Err(error) => {
                    log::debug!("Skipping for '{}': {}", source_label, error);
                }
            }
        }

        if resolution.commands_map.get(source).is_none() {
            log::debug!("No command selected for '{}'", source_label);
        }
    }

    resolution
}
