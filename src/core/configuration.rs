// src/core/configuration.rs

//! # Configuration Aggregate
//!
//! `Configuration` owns every repository the engine reads (contexts, command builders,
//! per-path filters) plus the cache settings and the default execution mode.
//!
//! Builders and filters hold `Arc<Context>` references. Any edit that touches the
//! context tree is done here so it can fan out: the tree is rebuilt, the edited name
//! is dropped wherever it is referenced, and every remaining reference is re-bound to
//! the new tree.

use crate::{
    core::{
        command_builder::{CommandBuilder, CommandsRepository},
        commands_map::{self, Resolution},
        context::{Context, ContextDefinition, ContextsRepository},
        errors::ConfigError,
        filter::{CommandsFilter, FiltersRepository},
        paths,
    },
    models::ExecutionMode,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Where and how many past evaluations are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Directory holding the records.
    pub root: PathBuf,
    /// How many records are kept.
    pub history_size: usize,
    /// Whether new evaluations are saved.
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: paths::default_cache_root(),
            history_size: crate::constants::DEFAULT_HISTORY_SIZE,
            enabled: true,
        }
    }
}

/// Everything loaded from `toolmesh.toml`: contexts, builders, per-source
/// filters and settings. Edits go through methods that keep references consistent.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    contexts: ContextsRepository,
    commands: CommandsRepository,
    filters: FiltersRepository,
    cache: CacheSettings,
    execution_mode: ExecutionMode,
}

impl Configuration {
    /// Assembles a configuration from already consistent parts.
    pub fn new(
        contexts: ContextsRepository,
        commands: CommandsRepository,
        filters: FiltersRepository,
        cache: CacheSettings,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            contexts,
            commands,
            filters,
            cache,
            execution_mode,
        }
    }

    /// The context hierarchy.
    pub fn contexts(&self) -> &ContextsRepository {
        &self.contexts
    }

    /// The command builders.
    pub fn commands(&self) -> &CommandsRepository {
        &self.commands
    }

    /// The filters registered under `[sources]`.
    pub fn filters(&self) -> &FiltersRepository {
        &self.filters
    }

    /// Where the history lives.
    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    /// The default runner strategy.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.execution_mode
    }

    /// Mutable access to the builders. Context references added this way must come
    /// from `contexts()`.
    pub fn commands_mut(&mut self) -> &mut CommandsRepository {
        &mut self.commands
    }

    /// Mutable access to the per-source filters.
    pub fn filters_mut(&mut self) -> &mut FiltersRepository {
        &mut self.filters
    }

    /// Adds a context. Its parent must already exist.
    ///
    /// # Errors
    /// Fails on duplicate names or aliases and on an unknown parent; the configuration is
    /// left unchanged.
    pub fn add_context(&mut self, definition: ContextDefinition) -> Result<Arc<Context>, ConfigError> {
        self.contexts.add(definition)
    }

    /// Removes a context everywhere it is referenced.
    ///
    /// Children of the removed context are re-parented to its parent.
    pub fn remove_context(&mut self, name: &str) -> Result<ContextDefinition, ConfigError> {
        let removed = self.contexts.remove(name)?;
        log::debug!("Removing context '{}' from commands and filters", removed.name);

        for builder in self.commands.iter_mut() {
            if builder.remove_context(&removed.name) {
                log::debug!("Context '{}' dropped from command '{}'", removed.name, builder.name());
            }
        }
        for (path, filter) in self.filters.iter_mut() {
            if filter.remove_context(&removed.name) {
                log::debug!("Context '{}' dropped from filter '{}'", removed.name, path.display());
            }
        }
        self.rebind_contexts();
        Ok(removed)
    }

    /// Changes (or clears) a context's parent and re-binds every reference.
    ///
    /// # Errors
    /// Fails fast with `ContextCycle` if the new parent descends from `name`.
    pub fn set_context_parent(&mut self, name: &str, parent: Option<&str>) -> Result<(), ConfigError> {
        self.contexts.set_parent(name, parent)?;
        self.rebind_contexts();
        Ok(())
    }

    /// Removes a builder and strips its name from every filter.
    pub fn remove_command(&mut self, name: &str) -> Result<CommandBuilder, ConfigError> {
        let removed = self
            .commands
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownCommand {
                name: name.to_string(),
            })?;
        for (path, filter) in self.filters.iter_mut() {
            if filter.remove_command(name) {
                log::debug!("Command '{}' dropped from filter '{}'", name, path.display());
            }
        }
        Ok(removed)
    }

    fn rebind_contexts(&mut self) {
        for builder in self.commands.iter_mut() {
            builder.rebind(&self.contexts);
        }
        for (_, filter) in self.filters.iter_mut() {
            filter.rebind(&self.contexts);
        }
    }

    /// Builds a filter from names given on the command line.
    ///
    /// # Errors
    /// Fails on unknown contexts or when both lists are given.
    pub fn filter_from_names(
        &self,
        contexts: &[String],
        allowed: &[String],
        denied: &[String],
    ) -> Result<CommandsFilter, ConfigError> {
        let contexts = contexts
            .iter()
            .map(|name| self.contexts.require(name))
            .collect::<Result<Vec<_>, _>>()?;
        let as_set = |names: &[String]| -> Option<BTreeSet<String>> {
            (!names.is_empty()).then(|| names.iter().cloned().collect())
        };
        CommandsFilter::new(contexts, as_set(allowed), as_set(denied))
    }

    /// Resolves the execution plan for `sources`, with `global` applied on top of the
    /// per-source filters.
    pub fn commands_map(&self, sources: &[PathBuf], global: &CommandsFilter) -> Resolution {
        commands_map::build_commands_map(sources, &self.commands, &self.filters, global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::specification::ContextSpecification;
    use std::path::Path;

    fn configuration() -> Configuration {
        let contexts = ContextsRepository::from_definitions(vec![
            ContextDefinition::new("ci"),
            ContextDefinition::new("strict").with_parent("ci"),
            ContextDefinition::new("pedantic").with_parent("strict"),
        ])
        .unwrap();

        let mut lint = CommandBuilder::new("lint").with_default_args(["--check"]);
        lint.add_allowed(contexts.require("ci").unwrap()).unwrap();
        lint.set_specification(
            contexts.require("strict").unwrap(),
            ContextSpecification::append(["--strict"]),
        )
        .unwrap();
        let mut commands = CommandsRepository::new();
        commands.add(lint).unwrap();
        commands.add(CommandBuilder::new("fmt")).unwrap();

        let mut filters = FiltersRepository::new();
        filters.insert(
            "src",
            CommandsFilter::new(
                vec![contexts.require("pedantic").unwrap()],
                Some(["lint".to_string(), "fmt".to_string()].into()),
                None,
            )
            .unwrap(),
        );

        Configuration::new(
            contexts,
            commands,
            filters,
            CacheSettings::default(),
            ExecutionMode::Sync,
        )
    }

    #[test]
    fn test_remove_context_cascades_to_builders_and_filters() {
        let mut config = configuration();
        config.remove_context("strict").unwrap();

        let lint = config.commands().get("lint").unwrap();
        assert!(lint.specification_of("strict").is_none());

        // `pedantic` now hangs directly under `ci`, in the builder's view too.
        let filter = config.filters().get(Path::new("src")).unwrap();
        let pedantic = &filter.contexts()[0];
        assert_eq!(pedantic.parent().map(|p| p.name()), Some("ci"));
        assert!(lint.match_contexts(&filter.contexts()));
        assert_eq!(lint.build_args(&filter.contexts()), ["--check"]);
    }

    #[test]
    fn test_remove_context_used_directly_by_a_filter() {
        let mut config = configuration();
        config.remove_context("pedantic").unwrap();
        let filter = config.filters().get(Path::new("src")).unwrap();
        assert!(filter.contexts().is_empty());
    }

    #[test]
    fn test_set_context_parent_rebinds_references() {
        let mut config = configuration();
        config.set_context_parent("pedantic", None).unwrap();

        let filter = config.filters().get(Path::new("src")).unwrap();
        let lint = config.commands().get("lint").unwrap();
        assert!(!lint.match_contexts(&filter.contexts()));

        assert!(matches!(
            config.set_context_parent("ci", Some("strict")),
            Err(ConfigError::ContextCycle { .. })
        ));
    }

    #[test]
    fn test_remove_command_cascades_to_filters() {
        let mut config = configuration();
        config.remove_command("fmt").unwrap();
        let filter = config.filters().get(Path::new("src")).unwrap();
        assert_eq!(
            filter.allowed_commands().map(|a| a.iter().cloned().collect::<Vec<_>>()),
            Some(vec!["lint".to_string()])
        );
        assert!(matches!(
            config.remove_command("fmt"),
            Err(ConfigError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_commands_map_applies_inherited_specification() {
        let config = configuration();
        let resolution = config.commands_map(&[PathBuf::from("src/app.py")], &CommandsFilter::all());
        assert!(resolution.errors.len() == 1, "fmt rejects 'pedantic'");
        let commands = resolution.commands_map.get(Path::new("src/app.py")).unwrap();
        assert_eq!(commands[0].args(), ["--check", "--strict"]);
    }

    #[test]
    fn test_filter_from_names_resolves_aliases_and_rejects_unknown() {
        let config = configuration();
        let filter = config
            .filter_from_names(&["strict".to_string()], &[], &["fmt".to_string()])
            .unwrap();
        assert_eq!(filter.context_names(), ["strict"]);
        assert!(config.filter_from_names(&["nope".to_string()], &[], &[]).is_err());
        assert!(
            config
                .filter_from_names(&[], &["a".to_string()], &["b".to_string()])
                .is_err()
        );
    }

    #[test]
    fn test_add_context_is_usable_in_commands_map() {
        let mut config = configuration();
        let nightly = config
            .add_context(ContextDefinition::new("nightly").with_parent("strict"))
            .unwrap();

        let resolution = config.commands_map(
            &[PathBuf::from("other/a.py")],
            &CommandsFilter::with_contexts(vec![nightly]),
        );
        assert!(resolution.errors.is_empty());
        let selected = resolution.commands_map.get(Path::new("other/a.py")).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "lint");
        assert_eq!(selected[0].args(), ["--check", "--strict"]);
    }

    #[test]
    fn test_add_context_alias_collision_changes_nothing() {
        let mut config = configuration();
        let result = config.add_context(ContextDefinition::new("extra").with_aliases(["strict"]));
        assert!(matches!(result, Err(ConfigError::AliasCollision { .. })));
        assert_eq!(config.contexts().len(), 3);
        assert!(config.contexts().get("extra").is_none());
    }
}
