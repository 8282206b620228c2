// src/core/command_builder.rs

//! # Command Builders
//!
//! A `CommandBuilder` is the template of one external tool: its default arguments and
//! the contexts it requires, accepts, rejects or specialises on. Given a concrete,
//! ordered list of contexts it validates them and produces a resolved `Command`.
//!
//! A context name may belong to at most one of the four sets (required, allowed,
//! denied, specifications). Every mutation checks the new entry against the other
//! sets and is rejected at the point it would make the builder inconsistent.

use crate::{
    core::{
        context::{Context, ContextsRepository},
        errors::{ConfigError, ContextRole, InvalidCommand},
        specification::ContextSpecification,
    },
    models::Command,
};
use std::sync::Arc;

// --- Context Sets ---

/// A set of contexts with membership by name or alias.
#[derive(Debug, Clone, Default)]
pub struct ContextSet {
    contexts: Vec<Arc<Context>>,
}

impl ContextSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a member is named (or aliased) `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.contexts.iter().any(|member| member.matches(name))
    }

    /// Returns `true` if `context` or one of its ancestors is a member.
    pub fn matches_recursively(&self, context: &Context) -> bool {
        self.contexts
            .iter()
            .any(|member| context.is_matching_recursively(member.name()))
    }

    /// Inserts `context` unless a member with the same name exists. Returns whether it was added.
    pub fn insert(&mut self, context: Arc<Context>) -> bool {
        if self.contains(context.name()) {
            return false;
        }
        self.contexts.push(context);
        true
    }

    /// Removes the member named (or aliased) `name`.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Context>> {
        let position = self.contexts.iter().position(|member| member.matches(name))?;
        Some(self.contexts.remove(position))
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Context>> {
        self.contexts.iter()
    }

    /// Member names, in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.contexts
            .iter()
            .map(|member| member.name().to_string())
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Swaps every member for its current resolution in `repository`, dropping the
    /// ones that no longer exist.
    pub fn rebind(&mut self, repository: &ContextsRepository) {
        self.contexts.retain_mut(|member| match repository.rebind(member) {
            Some(current) => {
                *member = current;
                true
            }
            None => {
                log::warn!("Dropping reference to removed context '{}'", member.name());
                false
            }
        });
    }
}

impl FromIterator<Arc<Context>> for ContextSet {
    fn from_iter<T: IntoIterator<Item = Arc<Context>>>(iter: T) -> Self {
        let mut set = Self::new();
        for context in iter {
            set.insert(context);
        }
        set
    }
}

// --- Command Builder ---

/// The template of an external tool invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    name: String,
    help: String,
    default_args: Vec<String>,
    version: Option<String>,
    required: ContextSet,
    allowed: ContextSet,
    denied: ContextSet,
    specifications: Vec<(Arc<Context>, ContextSpecification)>,
}

impl CommandBuilder {
    /// A builder with no arguments and no context constraints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = help.into();
        self
    }

    /// Arguments used before any specification applies.
    pub fn with_default_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the version requirement.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// The name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The help text.
    pub fn help(&self) -> &str {
        &self.help
    }

    /// The arguments used before any specification applies.
    pub fn default_args(&self) -> &[String] {
        &self.default_args
    }

    /// The version requirement of the tool, informative only.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Contexts that must all be given.
    pub fn required(&self) -> &ContextSet {
        &self.required
    }

    /// Contexts accepted in addition to the required ones.
    pub fn allowed(&self) -> &ContextSet {
        &self.allowed
    }

    /// Contexts that reject the builder, their descendants included.
    pub fn denied(&self) -> &ContextSet {
        &self.denied
    }

    /// Per-context argument rules, in registration order.
    pub fn specifications(&self) -> impl Iterator<Item = (&Arc<Context>, &ContextSpecification)> {
        self.specifications.iter().map(|(context, spec)| (context, spec))
    }

    /// Replaces the help text.
    pub fn set_help(&mut self, help: impl Into<String>) {
        self.help = help.into();
    }

    /// Replaces the default arguments.
    pub fn set_default_args(&mut self, args: Vec<String>) {
        self.default_args = args;
    }

    /// Replaces the version requirement.
    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    /// Which of the four sets `name` belongs to, if any.
    pub fn role_of(&self, name: &str) -> Option<ContextRole> {
        if self.required.contains(name) {
            Some(ContextRole::Required)
        } else if self.allowed.contains(name) {
            Some(ContextRole::Allowed)
        } else if self.denied.contains(name) {
            Some(ContextRole::Denied)
        } else if self.specifications.iter().any(|(context, _)| context.matches(name)) {
            Some(ContextRole::Specified)
        } else {
            None
        }
    }

    fn check_overlap(&self, context: &Context, attempted: ContextRole) -> Result<(), ConfigError> {
        let names = std::iter::once(context.name()).chain(context.aliases().iter().map(String::as_str));
        for name in names {
            match self.role_of(name) {
                Some(existing) if existing != attempted => {
                    return Err(ConfigError::ContextOverlap {
                        command: self.name.clone(),
                        context: context.name().to_string(),
                        existing,
                        attempted,
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// # Errors
    /// Fails if the context is already allowed, denied or specified.
    pub fn add_required(&mut self, context: Arc<Context>) -> Result<(), ConfigError> {
        self.check_overlap(&context, ContextRole::Required)?;
        self.required.insert(context);
        Ok(())
    }

    /// # Errors
    /// Fails if the context is already required, denied or specified.
    pub fn add_allowed(&mut self, context: Arc<Context>) -> Result<(), ConfigError> {
        self.check_overlap(&context, ContextRole::Allowed)?;
        self.allowed.insert(context);
        Ok(())
    }

    /// # Errors
    /// Fails if the context is already required, allowed or specified.
    pub fn add_denied(&mut self, context: Arc<Context>) -> Result<(), ConfigError> {
        self.check_overlap(&context, ContextRole::Denied)?;
        self.denied.insert(context);
        Ok(())
    }

    /// Sets (or overwrites) the argument rewrite applied when `context` is present.
    ///
    /// # Errors
    /// Fails if the context is already required, allowed or denied.
    pub fn set_specification(
        &mut self,
        context: Arc<Context>,
        specification: ContextSpecification,
    ) -> Result<(), ConfigError> {
        self.check_overlap(&context, ContextRole::Specified)?;
        match self
            .specifications
            .iter_mut()
            .find(|(existing, _)| existing.name() == context.name())
        {
            Some((_, existing)) => *existing = specification,
            None => self.specifications.push((context, specification)),
        }
        Ok(())
    }

    /// Merges `specification` into the one already set for `context`.
    ///
    /// # Errors
    /// Fails on a context-set overlap or when the two specifications conflict.
    pub fn merge_specification(
        &mut self,
        context: Arc<Context>,
        specification: &ContextSpecification,
    ) -> Result<(), ConfigError> {
        let merged = match self.specification_of(context.name()) {
            Some(existing) => existing.merge(specification)?,
            None => specification.clone(),
        };
        self.set_specification(context, merged)
    }

    /// The specification registered exactly for `name` (no inheritance).
    pub fn specification_of(&self, name: &str) -> Option<&ContextSpecification> {
        self.specifications
            .iter()
            .find(|(context, _)| context.matches(name))
            .map(|(_, spec)| spec)
    }

    /// The specification that applies to `context`: the one registered for the context
    /// itself, else for its nearest ancestor that has one.
    pub fn specification_for(&self, context: &Context) -> Option<&ContextSpecification> {
        context
            .lineage()
            .find_map(|ancestor| self.specification_of(ancestor.name()))
    }

    /// Forgets `name` in every set. Returns `true` if it was referenced.
    pub fn remove_context(&mut self, name: &str) -> bool {
        let before = self.required.len() + self.allowed.len() + self.denied.len() + self.specifications.len();
        self.required.remove(name);
        self.allowed.remove(name);
        self.denied.remove(name);
        self.specifications.retain(|(context, _)| !context.matches(name));
        let after = self.required.len() + self.allowed.len() + self.denied.len() + self.specifications.len();
        before != after
    }

    /// Re-points every context reference at its current resolution in `repository`.
    pub fn rebind(&mut self, repository: &ContextsRepository) {
        self.required.rebind(repository);
        self.allowed.rebind(repository);
        self.denied.rebind(repository);
        self.specifications
            .retain_mut(|(context, _)| match repository.rebind(context) {
                Some(current) => {
                    *context = current;
                    true
                }
                None => false,
            });
    }

    fn accepts(&self, context: &Context) -> bool {
        if self.denied.matches_recursively(context) {
            return false;
        }
        let listed = self.required.matches_recursively(context)
            || self.allowed.matches_recursively(context)
            || self
                .specifications
                .iter()
                .any(|(specified, _)| context.is_matching_recursively(specified.name()));
        listed || context.lineage().any(Context::is_allowed_by_default)
    }

    /// Checks a concrete context list against this builder.
    ///
    /// # Errors
    /// Returns `InvalidCommand` listing every required context that no given context
    /// matches, and every given context the builder does not accept.
    pub fn validate(&self, contexts: &[Arc<Context>]) -> Result<(), InvalidCommand> {
        let missing: Vec<String> = self
            .required
            .iter()
            .filter(|required| {
                !contexts
                    .iter()
                    .any(|given| given.is_matching_recursively(required.name()))
            })
            .map(|required| required.name().to_string())
            .collect();

        let disallowed: Vec<String> = contexts
            .iter()
            .filter(|given| !self.accepts(given))
            .map(|given| given.name().to_string())
            .collect();

        if missing.is_empty() && disallowed.is_empty() {
            Ok(())
        } else {
            Err(InvalidCommand {
                command: self.name.clone(),
                missing,
                disallowed,
            })
        }
    }

    /// Returns `true` if `validate` would succeed.
    pub fn match_contexts(&self, contexts: &[Arc<Context>]) -> bool {
        self.validate(contexts).is_ok()
    }

    /// Starts from the default arguments and applies each context's specification in
    /// the order the contexts are given, so later contexts win.
    pub fn build_args(&self, contexts: &[Arc<Context>]) -> Vec<String> {
        let mut args = self.default_args.clone();
        for context in contexts {
            if let Some(specification) = self.specification_for(context) {
                log::trace!(
                    "Command '{}': applying {:?} for context '{}'",
                    self.name,
                    specification.mode(),
                    context.name()
                );
                specification.apply(&mut args);
            }
        }
        args
    }

    /// Validates the contexts, then resolves the final command.
    pub fn build_command(&self, contexts: &[Arc<Context>]) -> Result<Command, InvalidCommand> {
        self.validate(contexts)?;
        Ok(Command::new(self.name.clone(), self.build_args(contexts))
            .with_help(self.help.clone())
            .with_version(self.version.clone()))
    }
}

// --- Repository ---

/// Every configured builder, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct CommandsRepository {
    builders: Vec<CommandBuilder>,
}

impl CommandsRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Returns `DuplicateCommand` if a builder with the same name exists.
    pub fn add(&mut self, builder: CommandBuilder) -> Result<(), ConfigError> {
        if self.get(builder.name()).is_some() {
            return Err(ConfigError::DuplicateCommand {
                name: builder.name().to_string(),
            });
        }
        self.builders.push(builder);
        Ok(())
    }

    /// The builder named `name`.
    pub fn get(&self, name: &str) -> Option<&CommandBuilder> {
        self.builders.iter().find(|builder| builder.name() == name)
    }

    /// Looks a builder up for editing.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut CommandBuilder> {
        self.builders.iter_mut().find(|builder| builder.name() == name)
    }

    /// Removes and returns the builder named `name`.
    pub fn remove(&mut self, name: &str) -> Option<CommandBuilder> {
        let position = self.builders.iter().position(|builder| builder.name() == name)?;
        Some(self.builders.remove(position))
    }

    /// Builders in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &CommandBuilder> {
        self.builders.iter()
    }

    /// Iterates mutably over the entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CommandBuilder> {
        self.builders.iter_mut()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.builders.len()
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(name: &str) -> Arc<Context> {
        Arc::new(Context::new(name))
    }

    #[test]
    fn test_repository_rejects_duplicate_names() {
        let mut repo = CommandsRepository::new();
        repo.add(CommandBuilder::new("lint")).unwrap();
        assert!(matches!(
            repo.add(CommandBuilder::new("lint")),
            Err(ConfigError::DuplicateCommand { .. })
        ));
        assert!(repo.remove("lint").is_some());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_build_args_order_matters() {
        let x = ctx("x");
        let y = ctx("y");
        let mut builder = CommandBuilder::new("lint").with_default_args(["a", "b"]);
        builder
            .set_specification(Arc::clone(&x), ContextSpecification::append(["c", "d"]))
            .unwrap();
        builder
            .set_specification(Arc::clone(&y), ContextSpecification::Clear)
            .unwrap();

        assert!(builder.build_args(&[Arc::clone(&x), Arc::clone(&y)]).is_empty());
        assert_eq!(builder.build_args(&[y, x]), ["c", "d"]);
    }

    #[test]
    fn test_specification_is_inherited_from_parent() {
        let strict = ctx("strict");
        let very_strict = Arc::new(Context::new("very-strict").with_parent(Arc::clone(&strict)));
        let mut builder = CommandBuilder::new("lint").with_default_args(["--check"]);
        builder
            .set_specification(strict, ContextSpecification::append(["--strict"]))
            .unwrap();

        assert_eq!(builder.build_args(&[very_strict]), ["--check", "--strict"]);
    }

    #[test]
    fn test_nearest_specification_wins() {
        let strict = ctx("strict");
        let very_strict = Arc::new(Context::new("very-strict").with_parent(Arc::clone(&strict)));
        let mut builder = CommandBuilder::new("lint");
        builder
            .set_specification(strict, ContextSpecification::append(["--strict"]))
            .unwrap();
        builder
            .set_specification(Arc::clone(&very_strict), ContextSpecification::replace(["--pedantic"]))
            .unwrap();

        assert_eq!(builder.build_args(&[very_strict]), ["--pedantic"]);
    }

    #[test]
    fn test_context_sets_are_disjoint() {
        let shared = ctx("shared");
        let mut builder = CommandBuilder::new("lint");

        builder.add_required(Arc::clone(&shared)).unwrap();
        assert!(builder.add_allowed(Arc::clone(&shared)).is_err());
        assert!(builder.add_denied(Arc::clone(&shared)).is_err());
        assert!(
            builder
                .set_specification(Arc::clone(&shared), ContextSpecification::Clear)
                .is_err()
        );
        // Re-adding to the same set is not an overlap.
        assert!(builder.add_required(Arc::clone(&shared)).is_ok());

        let mut builder = CommandBuilder::new("lint");
        builder.add_allowed(Arc::clone(&shared)).unwrap();
        assert!(builder.add_required(Arc::clone(&shared)).is_err());
        assert!(builder.add_denied(Arc::clone(&shared)).is_err());

        let mut builder = CommandBuilder::new("lint");
        builder.add_denied(Arc::clone(&shared)).unwrap();
        assert!(builder.add_required(Arc::clone(&shared)).is_err());
        assert!(builder.add_allowed(shared).is_err());
    }

    #[test]
    fn test_overlap_is_detected_through_aliases() {
        let mut builder = CommandBuilder::new("lint");
        builder.add_allowed(Arc::new(Context::new("ci").with_aliases(["pipeline"]))).unwrap();
        let err = builder
            .add_denied(Arc::new(Context::new("pipeline")))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ContextOverlap {
                existing: ContextRole::Allowed,
                attempted: ContextRole::Denied,
                ..
            }
        ));
    }

    #[test]
    fn test_validate_reports_all_missing_and_disallowed() {
        let mut builder = CommandBuilder::new("lint");
        builder.add_required(ctx("ci")).unwrap();
        builder.add_required(ctx("python")).unwrap();
        builder.add_allowed(ctx("fast")).unwrap();

        let err = builder.validate(&[ctx("fast"), ctx("rust"), ctx("docs")]).unwrap_err();
        assert_eq!(err.missing, ["ci", "python"]);
        assert_eq!(err.disallowed, ["rust", "docs"]);
    }

    #[test]
    fn test_validate_matches_required_through_parents() {
        let ci = ctx("ci");
        let nightly = Arc::new(Context::new("nightly").with_parent(Arc::clone(&ci)));
        let mut builder = CommandBuilder::new("lint");
        builder.add_required(ci).unwrap();

        assert!(builder.validate(&[nightly]).is_ok());
        assert!(builder.validate(&[]).is_err());
    }

    #[test]
    fn test_denied_context_is_never_accepted() {
        let ci = ctx("ci");
        let fast = Arc::new(Context::new("fast").with_parent(Arc::clone(&ci)));
        let mut builder = CommandBuilder::new("lint");
        builder.add_allowed(ci).unwrap();
        builder.add_denied(Arc::clone(&fast)).unwrap();

        let err = builder.validate(&[fast]).unwrap_err();
        assert_eq!(err.disallowed, ["fast"]);
    }

    #[test]
    fn test_allowed_by_default_context_passes_unless_denied() {
        let verbose = Arc::new(Context::new("verbose").with_allowed_by_default(true));
        let builder = CommandBuilder::new("lint");
        assert!(builder.match_contexts(&[Arc::clone(&verbose)]));

        let mut denying = CommandBuilder::new("lint");
        denying.add_denied(Arc::clone(&verbose)).unwrap();
        assert!(!denying.match_contexts(&[verbose]));
    }

    #[test]
    fn test_build_command_fails_without_partial_result() {
        let mut builder = CommandBuilder::new("lint").with_default_args(["--check"]);
        builder.add_required(ctx("ci")).unwrap();
        assert!(builder.build_command(&[]).is_err());

        let command = builder.build_command(&[ctx("ci")]).unwrap();
        assert_eq!(command.name(), "lint");
        assert_eq!(command.args(), ["--check"]);
    }

    #[test]
    fn test_remove_context_from_every_set() {
        let mut builder = CommandBuilder::new("lint");
        builder.add_required(ctx("ci")).unwrap();
        builder
            .set_specification(ctx("strict"), ContextSpecification::Clear)
            .unwrap();

        assert!(builder.remove_context("ci"));
        assert!(builder.remove_context("strict"));
        assert!(!builder.remove_context("ci"));
        assert!(builder.role_of("ci").is_none());
        assert!(builder.specification_of("strict").is_none());
    }

    #[test]
    fn test_merge_specification_rejects_conflicts() {
        let strict = ctx("strict");
        let mut builder = CommandBuilder::new("lint");
        builder
            .merge_specification(Arc::clone(&strict), &ContextSpecification::append(["-s"]))
            .unwrap();
        builder
            .merge_specification(Arc::clone(&strict), &ContextSpecification::Inherit)
            .unwrap();
        assert_eq!(
            builder.specification_of("strict"),
            Some(&ContextSpecification::append(["-s"]))
        );
        assert!(
            builder
                .merge_specification(strict, &ContextSpecification::Clear)
                .is_err()
        );
    }
}
