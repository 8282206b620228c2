// src/core/context.rs

//! # Context Model
//!
//! A `Context` is a named classification tag (`ci`, `strict`, `python`, ...) used to
//! select which command variants apply to a source. Contexts can be aliased and can
//! inherit from a parent: a context *matches recursively* a name when the name is its
//! own name or alias, or matches recursively its parent.
//!
//! Resolved contexts are immutable and share their parents through `Arc`, so a parent
//! chain can never loop. Edits (re-parenting, removal) go through the
//! `ContextsRepository`, which keeps the declarative definitions, checks them, and
//! rebuilds the resolved tree.

use crate::core::errors::ConfigError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A named, aliasable, optionally parented classification tag.
#[derive(Debug, Clone)]
pub struct Context {
    name: String,
    aliases: Vec<String>,
    parent: Option<Arc<Context>>,
    allowed_by_default: bool,
}

impl Context {
    /// Creates a parentless context with no aliases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            parent: None,
            allowed_by_default: false,
        }
    }

    /// Adds aliases, keeping the first occurrence of each and ignoring the context's own name.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for alias in aliases {
            let alias = alias.into();
            if alias != self.name && !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
        self
    }

    /// Sets the parent.
    pub fn with_parent(mut self, parent: Arc<Context>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Makes this a root context.
    pub fn without_parent(mut self) -> Self {
        self.parent = None;
        self
    }

    /// Marks the context (and its descendants) as accepted by every builder
    /// that does not deny it.
    pub fn with_allowed_by_default(mut self, allowed: bool) -> Self {
        self.allowed_by_default = allowed;
        self
    }

    /// The name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Alternative names, never including `name`.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// The parent context, if any.
    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }

    /// Whether builders accept this context unless they deny it.
    pub fn is_allowed_by_default(&self) -> bool {
        self.allowed_by_default
    }

    /// Returns `true` if `name` is this context's name or one of its aliases.
    pub fn matches(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|alias| alias == name)
    }

    /// Returns `true` if this context or any of its ancestors matches `name`.
    pub fn is_matching_recursively(&self, name: &str) -> bool {
        self.lineage().any(|context| context.matches(name))
    }

    /// Returns `true` if `other` is this context or one of its ancestors.
    pub fn descends_from(&self, other: &Context) -> bool {
        self.lineage().any(|context| context.name == other.name)
    }

    /// Iterates over this context, then its parent, grand-parent, and so on.
    pub fn lineage(&self) -> Lineage<'_> {
        Lineage {
            next: Some(self),
        }
    }
}

// Contexts are identified by name; two resolutions of the same definition are equal.
impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Context {}

impl Hash for Context {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Iterator over a context and its ancestors.
#[derive(Debug)]
pub struct Lineage<'a> {
    next: Option<&'a Context>,
}

impl<'a> Iterator for Lineage<'a> {
    type Item = &'a Context;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = current.parent.as_deref();
        Some(current)
    }
}

// --- Declarative definitions ---

/// A context as declared in the configuration, with its parent referenced by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextDefinition {
    /// The unique name.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// Name or alias of the parent context.
    pub parent: Option<String>,
    /// See `Context::is_allowed_by_default`.
    pub allowed_by_default: bool,
}

impl ContextDefinition {
    /// A root definition without aliases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the parent.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Adds alternative names.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }
}

// --- Repository ---

/// Owns every context of a configuration.
///
/// Definitions are kept in declaration order; the resolved `Arc<Context>` tree is
/// rebuilt from them after every edit.
#[derive(Debug, Clone, Default)]
pub struct ContextsRepository {
    definitions: Vec<ContextDefinition>,
    resolved: BTreeMap<String, Arc<Context>>,
}

impl ContextsRepository {
    /// Checks names and aliases, then resolves every parent chain.
    ///
    /// # Errors
    /// Returns `DuplicateContext` or `AliasCollision` on name clashes, and
    /// `UnresolvableContexts` listing every context whose parent chain never
    /// resolves (missing parent or cycle).
    pub fn from_definitions(definitions: Vec<ContextDefinition>) -> Result<Self, ConfigError> {
        check_names(&definitions)?;
        let resolved = resolve_definitions(&definitions)?;
        Ok(Self {
            definitions,
            resolved,
        })
    }

    /// Number of resolved contexts.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Looks a context up by name or alias.
    pub fn get(&self, name: &str) -> Option<Arc<Context>> {
        if let Some(context) = self.resolved.get(name) {
            return Some(Arc::clone(context));
        }
        self.resolved
            .values()
            .find(|context| context.matches(name))
            .cloned()
    }

    /// Like `get`, but a missing context is a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<Context>, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::UnknownContext {
            name: name.to_string(),
        })
    }

    /// Resolved contexts, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Context>> {
        self.resolved.values()
    }

    /// The definitions, in declaration order.
    pub fn definitions(&self) -> &[ContextDefinition] {
        &self.definitions
    }

    /// Returns the current resolution of `context`, looked up by name.
    pub fn rebind(&self, context: &Context) -> Option<Arc<Context>> {
        self.resolved.get(context.name()).cloned()
    }

    /// Adds a new context definition.
    pub fn add(&mut self, definition: ContextDefinition) -> Result<Arc<Context>, ConfigError> {
        let name = definition.name.clone();
        let mut definitions = self.definitions.clone();
        definitions.push(definition);
        self.replace_definitions(definitions)?;
        self.require(&name)
    }

    /// Removes a context. Its children are re-parented to its own parent.
    pub fn remove(&mut self, name: &str) -> Result<ContextDefinition, ConfigError> {
        let canonical = self.require(name)?.name().to_string();
        let mut definitions = self.definitions.clone();
        let position = definitions
            .iter()
            .position(|def| def.name == canonical)
            .ok_or_else(|| ConfigError::UnknownContext {
                name: name.to_string(),
            })?;
        let removed = definitions.remove(position);

        for def in definitions.iter_mut() {
            let points_to_removed = def
                .parent
                .as_deref()
                .is_some_and(|parent| parent == removed.name || removed.aliases.iter().any(|a| a == parent));
            if points_to_removed {
                log::debug!(
                    "Re-parenting context '{}' from '{}' to {:?}",
                    def.name,
                    removed.name,
                    removed.parent
                );
                def.parent = removed.parent.clone();
            }
        }

        self.replace_definitions(definitions)?;
        Ok(removed)
    }

    /// Changes (or clears) the parent of a context.
    ///
    /// # Errors
    /// Fails with `ContextCycle` when `parent` is `name` itself or one of its descendants.
    pub fn set_parent(&mut self, name: &str, parent: Option<&str>) -> Result<(), ConfigError> {
        let child = self.require(name)?;
        let parent_name = match parent {
            Some(parent) => {
                let parent_context = self.require(parent)?;
                if parent_context.descends_from(&child) {
                    return Err(ConfigError::ContextCycle {
                        context: child.name().to_string(),
                        parent: parent_context.name().to_string(),
                    });
                }
                Some(parent_context.name().to_string())
            }
            None => None,
        };

        let mut definitions = self.definitions.clone();
        if let Some(def) = definitions.iter_mut().find(|def| def.name == child.name()) {
            def.parent = parent_name;
        }
        self.replace_definitions(definitions)
    }

    fn replace_definitions(&mut self, definitions: Vec<ContextDefinition>) -> Result<(), ConfigError> {
        check_names(&definitions)?;
        self.resolved = resolve_definitions(&definitions)?;
        self.definitions = definitions;
        Ok(())
    }
}

/// Ensures names are unique and aliases collide with no other name or alias.
fn check_names(definitions: &[ContextDefinition]) -> Result<(), ConfigError> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for def in definitions {
        if owners.insert(&def.name, &def.name).is_some() {
            return Err(ConfigError::DuplicateContext {
                name: def.name.clone(),
            });
        }
    }
    for def in definitions {
        for alias in def.aliases.iter().filter(|alias| **alias != def.name) {
            match owners.get(alias.as_str()) {
                Some(owner) if *owner != def.name => {
                    return Err(ConfigError::AliasCollision {
                        alias: alias.clone(),
                        context: def.name.clone(),
                        other: owner.to_string(),
                    });
                }
                _ => {
                    owners.insert(alias, &def.name);
                }
            }
        }
    }
    Ok(())
}

/// Maps a parent reference (name or alias) to the canonical context name.
fn canonical_name<'a>(definitions: &'a [ContextDefinition], reference: &str) -> Option<&'a str> {
    definitions
        .iter()
        .find(|def| def.name == reference || def.aliases.iter().any(|alias| alias == reference))
        .map(|def| def.name.as_str())
}

/// Resolves definitions in passes, deferring every context whose parent is not yet
/// resolved. A pass that resolves nothing means the remaining set never will.
fn resolve_definitions(
    definitions: &[ContextDefinition],
) -> Result<BTreeMap<String, Arc<Context>>, ConfigError> {
    let mut resolved: BTreeMap<String, Arc<Context>> = BTreeMap::new();
    let mut pending: Vec<&ContextDefinition> = definitions.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|def| {
            let parent = match def.parent.as_deref() {
                None => None,
                Some(reference) => {
                    match canonical_name(definitions, reference).and_then(|name| resolved.get(name)) {
                        Some(parent) => Some(Arc::clone(parent)),
                        None => return true,
                    }
                }
            };
            let mut context = Context::new(def.name.clone())
                .with_aliases(def.aliases.iter().cloned())
                .with_allowed_by_default(def.allowed_by_default);
            if let Some(parent) = parent {
                context = context.with_parent(parent);
            }
            resolved.insert(def.name.clone(), Arc::new(context));
            false
        });

        if pending.len() == before {
            let mut names: Vec<String> = pending.iter().map(|def| def.name.clone()).collect();
            names.sort();
            log::debug!("Context resolution stalled on: {:?}", names);
            return Err(ConfigError::UnresolvableContexts { names });
        }
        log::trace!("Context pass resolved {} definitions", before - pending.len());
    }

    Ok(resolved)
}
