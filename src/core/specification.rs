// src/core/specification.rs

use crate::core::errors::ConfigError;

/// How a context rewrites a command's argument list when it applies.
///
/// The three active modes are mutually exclusive by construction; raw configuration
/// goes through `from_parts`, which rejects combinations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextSpecification {
    /// Leave the arguments untouched.
    #[default]
    Inherit,
    /// Replace every argument built so far.
    Replace(Vec<String>),
    /// Append to the arguments built so far.
    Append(Vec<String>),
    /// Drop every argument built so far.
    Clear,
}

impl ContextSpecification {
    /// Builds a specification from the optional `replace`, `append` and `clear` fields
    /// of a configuration entry.
    ///
    /// # Errors
    /// Returns `ConflictingSpecification` if more than one mode is set.
    pub fn from_parts(
        replace: Option<Vec<String>>,
        append: Option<Vec<String>>,
        clear: bool,
    ) -> Result<Self, ConfigError> {
        match (replace, append, clear) {
            (Some(_), Some(_), _) => Err(ConfigError::ConflictingSpecification {
                first: "replace",
                second: "append",
            }),
            (Some(_), None, true) => Err(ConfigError::ConflictingSpecification {
                first: "replace",
                second: "clear",
            }),
            (None, Some(_), true) => Err(ConfigError::ConflictingSpecification {
                first: "append",
                second: "clear",
            }),
            (Some(args), None, false) => Ok(Self::Replace(args)),
            (None, Some(args), false) => Ok(Self::Append(args)),
            (None, None, true) => Ok(Self::Clear),
            (None, None, false) => Ok(Self::Inherit),
        }
    }

    /// Replaces the arguments with `args`.
    pub fn replace<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Replace(args.into_iter().map(Into::into).collect())
    }

    /// Appends `args` to the arguments.
    pub fn append<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Append(args.into_iter().map(Into::into).collect())
    }

    /// The active mode name, or `None` for `Inherit`.
    pub fn mode(&self) -> Option<&'static str> {
        match self {
            Self::Inherit => None,
            Self::Replace(_) => Some("replace"),
            Self::Append(_) => Some("append"),
            Self::Clear => Some("clear"),
        }
    }

    /// Whether this leaves the arguments untouched.
    pub fn is_inherit(&self) -> bool {
        matches!(self, Self::Inherit)
    }

    /// Combines two specifications for the same context.
    ///
    /// `Inherit` is neutral; identical specifications merge to themselves.
    ///
    /// # Errors
    /// Returns `ConflictingSpecification` when both sides set a different mode or payload.
    pub fn merge(&self, other: &Self) -> Result<Self, ConfigError> {
        match (self.mode(), other.mode()) {
            (None, _) => Ok(other.clone()),
            (_, None) => Ok(self.clone()),
            (Some(first), Some(second)) => {
                if self == other {
                    Ok(self.clone())
                } else {
                    Err(ConfigError::ConflictingSpecification { first, second })
                }
            }
        }
    }

    /// Rewrites `args` in place.
    pub fn apply(&self, args: &mut Vec<String>) {
        match self {
            Self::Inherit => {}
            Self::Replace(replacement) => {
                args.clear();
                args.extend(replacement.iter().cloned());
            }
            Self::Append(extra) => args.extend(extra.iter().cloned()),
            Self::Clear => args.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Option<Vec<String>> {
        Some(values.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_from_parts_rejects_every_pair() {
        assert!(ContextSpecification::from_parts(args(&["a"]), None, true).is_err());
        assert!(ContextSpecification::from_parts(args(&["a"]), args(&["b"]), false).is_err());
        assert!(ContextSpecification::from_parts(None, args(&["b"]), true).is_err());
        assert!(ContextSpecification::from_parts(args(&["a"]), args(&["b"]), true).is_err());
    }

    #[test]
    fn test_from_parts_accepts_single_modes() {
        assert_eq!(
            ContextSpecification::from_parts(args(&["a"]), None, false).unwrap(),
            ContextSpecification::replace(["a"])
        );
        assert_eq!(
            ContextSpecification::from_parts(None, args(&["b"]), false).unwrap(),
            ContextSpecification::append(["b"])
        );
        assert_eq!(
            ContextSpecification::from_parts(None, None, true).unwrap(),
            ContextSpecification::Clear
        );
        assert!(ContextSpecification::from_parts(None, None, false).unwrap().is_inherit());
    }

    #[test]
    fn test_apply_each_mode() {
        let base = vec!["--check".to_string()];

        let mut replaced = base.clone();
        ContextSpecification::replace(["--fix"]).apply(&mut replaced);
        assert_eq!(replaced, ["--fix"]);

        let mut appended = base.clone();
        ContextSpecification::append(["--strict"]).apply(&mut appended);
        assert_eq!(appended, ["--check", "--strict"]);

        let mut cleared = base.clone();
        ContextSpecification::Clear.apply(&mut cleared);
        assert!(cleared.is_empty());

        let mut untouched = base.clone();
        ContextSpecification::Inherit.apply(&mut untouched);
        assert_eq!(untouched, base);
    }

    #[test]
    fn test_merge_rules() {
        let append = ContextSpecification::append(["-v"]);
        assert_eq!(ContextSpecification::Inherit.merge(&append).unwrap(), append);
        assert_eq!(append.merge(&ContextSpecification::Inherit).unwrap(), append);
        assert_eq!(append.merge(&append).unwrap(), append);
        assert!(append.merge(&ContextSpecification::Clear).is_err());
        assert!(append.merge(&ContextSpecification::append(["-q"])).is_err());
    }
}
