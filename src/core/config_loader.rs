// src/core/config_loader.rs

//! # Config Loader
//!
//! Reads a `toolmesh.toml` file and turns it into a `Configuration`. The TOML models
//! below only exist for deserialization; everything is checked and converted into the
//! engine's types (contexts resolved, builders and filters validated) before the
//! `Configuration` is returned.

use crate::{
    core::{
        command_builder::{CommandBuilder, CommandsRepository},
        configuration::{CacheSettings, Configuration},
        context::{ContextDefinition, ContextsRepository},
        errors::ConfigError,
        filter::{CommandsFilter, FiltersRepository},
        paths,
        specification::ContextSpecification,
    },
    models::ExecutionMode,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

// --- `toolmesh.toml` MODELS ---

#[derive(Deserialize, Debug, Default)]
struct ConfigFile {
    #[serde(default)]
    settings: SettingsSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    contexts: BTreeMap<String, ContextEntry>,
    #[serde(default)]
    commands: BTreeMap<String, CommandEntry>,
    #[serde(default)]
    sources: BTreeMap<String, SourceEntry>,
}

#[derive(Deserialize, Debug, Default)]
struct SettingsSection {
    #[serde(default)]
    execution_mode: ExecutionMode,
}

#[derive(Deserialize, Debug, Default)]
struct CacheSection {
    enabled: Option<bool>,
    root: Option<String>,
    history_size: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
struct ContextEntry {
    #[serde(default)]
    aliases: Vec<String>,
    parent: Option<String>,
    #[serde(default)]
    allowed_by_default: bool,
}

/// Arguments written either as a list or as a single shell-like line.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum ArgsEntry {
    List(Vec<String>),
    Line(String),
}

impl ArgsEntry {
    fn into_args(self, owner: &str) -> Result<Vec<String>, ConfigError> {
        match self {
            Self::List(args) => Ok(args),
            Self::Line(line) => shlex::split(&line).ok_or_else(|| ConfigError::InvalidArgs {
                owner: owner.to_string(),
                args: line,
            }),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
struct CommandEntry {
    #[serde(default)]
    help: String,
    args: Option<ArgsEntry>,
    version: Option<String>,
    #[serde(default)]
    required: Vec<String>,
    #[serde(default)]
    allowed: Vec<String>,
    #[serde(default)]
    denied: Vec<String>,
    #[serde(default)]
    specifications: BTreeMap<String, SpecificationEntry>,
}

#[derive(Deserialize, Debug, Default)]
struct SpecificationEntry {
    replace: Option<ArgsEntry>,
    append: Option<ArgsEntry>,
    #[serde(default)]
    clear: bool,
}

#[derive(Deserialize, Debug, Default)]
struct SourceEntry {
    #[serde(default)]
    contexts: Vec<String>,
    allowed: Option<Vec<String>>,
    denied: Option<Vec<String>>,
}

// --- Loading ---

/// Reads and resolves the configuration file at `path`.
///
/// # Errors
/// Returns a `ConfigError` for unreadable files, invalid TOML, and every
/// inconsistency found while resolving contexts, commands and filters.
pub fn load_configuration(path: &Path) -> Result<Configuration, ConfigError> {
    log::debug!("Loading configuration from '{}'", path.display());
    let content = fs::read_to_string(path)?;
    parse_configuration(&content)
}

/// Like `load_configuration`, but finds `toolmesh.toml` from `start` upwards.
pub fn discover_configuration(start: &Path) -> Result<Configuration, ConfigError> {
    let path = paths::find_config_file(start)?;
    load_configuration(&path)
}

/// Resolves a configuration from TOML text.
pub fn parse_configuration(content: &str) -> Result<Configuration, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;

    let contexts = ContextsRepository::from_definitions(
        file.contexts
            .into_iter()
            .map(|(name, entry)| ContextDefinition {
                name,
                aliases: entry.aliases,
                parent: entry.parent,
                allowed_by_default: entry.allowed_by_default,
            })
            .collect(),
    )?;
    log::trace!("Resolved {} contexts", contexts.len());

    let mut commands = CommandsRepository::new();
    for (name, entry) in file.commands {
        commands.add(compile_command(name, entry, &contexts)?)?;
    }

    let mut filters = FiltersRepository::new();
    for (path, entry) in file.sources {
        let filter = compile_filter(entry, &contexts)?;
        if filters.insert(&path, filter).is_some() {
            log::warn!("Source '{}' is declared more than once; keeping the last one.", path);
        }
    }

    let cache = compile_cache(file.cache)?;

    Ok(Configuration::new(
        contexts,
        commands,
        filters,
        cache,
        file.settings.execution_mode,
    ))
}

fn compile_command(
    name: String,
    entry: CommandEntry,
    contexts: &ContextsRepository,
) -> Result<CommandBuilder, ConfigError> {
    let default_args = match entry.args {
        Some(args) => args.into_args(&name)?,
        None => Vec::new(),
    };
    let mut builder = CommandBuilder::new(name)
        .with_help(entry.help)
        .with_default_args(default_args);
    builder.set_version(entry.version);

    for context in &entry.required {
        builder.add_required(contexts.require(context)?)?;
    }
    for context in &entry.allowed {
        builder.add_allowed(contexts.require(context)?)?;
    }
    for context in &entry.denied {
        builder.add_denied(contexts.require(context)?)?;
    }
    for (context, spec) in entry.specifications {
        let owner = format!("{}.specifications.{}", builder.name(), context);
        let specification = ContextSpecification::from_parts(
            spec.replace.map(|args| args.into_args(&owner)).transpose()?,
            spec.append.map(|args| args.into_args(&owner)).transpose()?,
            spec.clear,
        )?;
        builder.merge_specification(contexts.require(&context)?, &specification)?;
    }
    Ok(builder)
}

fn compile_filter(entry: SourceEntry, contexts: &ContextsRepository) -> Result<CommandsFilter, ConfigError> {
    let resolved = entry
        .contexts
        .iter()
        .map(|name| contexts.require(name))
        .collect::<Result<Vec<_>, _>>()?;
    let to_set = |names: Option<Vec<String>>| names.map(|names| names.into_iter().collect::<BTreeSet<_>>());
    CommandsFilter::new(resolved, to_set(entry.allowed), to_set(entry.denied))
}

fn compile_cache(section: CacheSection) -> Result<CacheSettings, ConfigError> {
    let defaults = CacheSettings::default();
    let history_size = section.history_size.unwrap_or(defaults.history_size);
    if history_size == 0 {
        return Err(ConfigError::InvalidHistorySize(history_size));
    }
    let root = match section.root {
        Some(template) => paths::expand_path_template(&template)?,
        None => defaults.root,
    };
    Ok(CacheSettings {
        root,
        history_size,
        enabled: section.enabled.unwrap_or(defaults.enabled),
    })
}
