// src/core/paths.rs

use crate::constants::{APP_DIR_NAME, CONFIG_FILENAME};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures locating the configuration or expanding paths.
#[derive(Error, Debug)]
pub enum PathError {
    /// No configuration file up the directory tree.
    #[error("No 'toolmesh.toml' found in '{start}' or any parent directory.")]
    ConfigNotFound { start: String },
    /// A `~` or `$VAR` could not be expanded.
    #[error("Failed to expand path template '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// The default root of the evaluation history.
///
/// `~/.cache/toolmesh` on Linux (XDG), the platform cache directory elsewhere, and a
/// project-local `.toolmesh/history` when no cache directory can be determined.
pub fn default_cache_root() -> PathBuf {
    match dirs::cache_dir() {
        Some(dir) => dir.join(APP_DIR_NAME),
        None => {
            log::warn!("Could not find the system cache directory. Using a local history.");
            PathBuf::from(".toolmesh").join("history")
        }
    }
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a configured path.
///
/// # Errors
/// Returns `PathError::Expansion` if a referenced variable is not defined.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(dunce::simplified(Path::new(expanded.as_ref())).to_path_buf())
}

/// Finds the configuration file in `start` or its nearest ancestor.
pub fn find_config_file(start: &Path) -> Result<PathBuf, PathError> {
    let start = dunce::canonicalize(start).unwrap_or_else(|_| start.to_path_buf());
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| PathError::ConfigNotFound {
            start: start.display().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_find_config_file_in_ancestor() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found.file_name().unwrap(), CONFIG_FILENAME);
        assert_eq!(
            dunce::canonicalize(found.parent().unwrap()).unwrap(),
            dunce::canonicalize(dir.path()).unwrap()
        );
    }

    #[test]
    fn test_find_config_file_missing() {
        let dir = tempdir().unwrap();
        // A nested temp dir has no configuration unless some ancestor of the temp root has one.
        let nested = dir.path().join("empty");
        fs::create_dir_all(&nested).unwrap();
        if let Ok(found) = find_config_file(&nested) {
            assert!(!found.starts_with(dir.path()));
        }
    }

    #[test]
    fn test_expand_path_template_keeps_plain_paths() {
        let expanded = expand_path_template("/var/cache/toolmesh").unwrap();
        assert_eq!(expanded, PathBuf::from("/var/cache/toolmesh"));
    }

    #[test]
    fn test_expand_path_template_unknown_variable() {
        let result = expand_path_template("$TOOLMESH_SURELY_UNDEFINED_VAR/history");
        assert!(matches!(result, Err(PathError::Expansion { .. })));
    }
}
