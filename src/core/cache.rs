// src/core/cache.rs

//! # Evaluation History
//!
//! Every saved `Evaluation` becomes an immutable JSON record under the cache root,
//! named after its creation time (`20260118-142501-000123.json`). Ordering and
//! eviction are derived from that name only, never from filesystem timestamps.
//! The history keeps at most `history_size` records; older ones are evicted first.

use crate::{
    constants::{RECORD_EXTENSION, RECORD_TIMESTAMP_FORMAT},
    core::{configuration::CacheSettings, errors::ConfigError},
    models::Evaluation,
};
use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failures of the evaluation history.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Reading, writing or deleting a record failed.
    #[error("Cache I/O error on '{}': {source}", path.display())]
    Io {
        /// The record involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// A record could not be (de)serialized.
    #[error("Invalid cache record '{}': {source}", path.display())]
    Json {
        /// The record involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
    /// No record at the requested position.
    #[error("No evaluation at index {index}: the history holds {len}.")]
    IndexOutOfRange { index: usize, len: usize },
    /// Nothing has been saved yet.
    #[error("The evaluation history is empty.")]
    EmptyHistory,
    /// Every stored evaluation succeeded.
    #[error("No failing evaluation found in the history.")]
    NoFailingRun,
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// A stored evaluation, identified by its creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// The file stem, a `%Y%m%d-%H%M%S-%6f` timestamp.
    pub id: String,
    /// When the evaluation was saved, parsed from `id`.
    pub created_at: DateTime<Utc>,
    /// The JSON file holding the evaluation.
    pub path: PathBuf,
}

impl CacheRecord {
    /// Reads a record back from `path`, or `None` if the file name is not a record id.
    fn from_path(path: PathBuf) -> Option<Self> {
        if path.extension().is_none_or(|ext| ext != RECORD_EXTENSION) {
            return None;
        }
        let id = path.file_stem()?.to_str()?.to_string();
        let created_at = NaiveDateTime::parse_from_str(&id, RECORD_TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();
        Some(Self { id, created_at, path })
    }

    /// Deserializes the stored evaluation.
    pub fn load(&self) -> Result<Evaluation, CacheError> {
        let content = fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        serde_json::from_str(&content).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })
    }
}

/// A bounded history of evaluations, one JSON file each, under `root`.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
    history_size: usize,
    enabled: bool,
}

impl Cache {
    /// # Errors
    /// Returns `ConfigError::InvalidHistorySize` if `history_size` is 0.
    pub fn new(root: impl Into<PathBuf>, history_size: usize) -> Result<Self, ConfigError> {
        if history_size == 0 {
            return Err(ConfigError::InvalidHistorySize(history_size));
        }
        Ok(Self {
            root: root.into(),
            history_size,
            enabled: true,
        })
    }

    /// Builds the cache described by `settings`.
    pub fn from_settings(settings: &CacheSettings) -> Result<Self, ConfigError> {
        Ok(Self::new(&settings.root, settings.history_size)?.with_enabled(settings.enabled))
    }

    /// A disabled cache still reads its history but never writes to it.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The directory the records are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maximum number of records kept.
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Whether `save` writes anything.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Every record, newest first.
    pub fn records(&self) -> Result<Vec<CacheRecord>, CacheError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(io_error(&self.root))? {
            let path = entry.map_err(io_error(&self.root))?.path();
            match CacheRecord::from_path(path) {
                Some(record) => records.push(record),
                None => log::trace!("Ignoring a non-record entry in '{}'", self.root.display()),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records()?.len())
    }

    /// Returns `true` if there is nothing in it.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.records()?.is_empty())
    }

    /// The `index`-th most recent record (0 is the latest).
    pub fn record(&self, index: usize) -> Result<CacheRecord, CacheError> {
        let mut records = self.records()?;
        let len = records.len();
        if index >= len {
            return Err(CacheError::IndexOutOfRange { index, len });
        }
        Ok(records.swap_remove(index))
    }

    /// The `index`-th most recent evaluation (0 is the latest).
    pub fn get(&self, index: usize) -> Result<Evaluation, CacheError> {
        self.record(index)?.load()
    }

    /// The most recent evaluation.
    pub fn latest(&self) -> Result<Evaluation, CacheError> {
        match self.get(0) {
            Err(CacheError::IndexOutOfRange { .. }) => Err(CacheError::EmptyHistory),
            other => other,
        }
    }

    /// The most recent evaluation with at least one failed command.
    pub fn latest_failed(&self) -> Result<(CacheRecord, Evaluation), CacheError> {
        let records = self.records()?;
        if records.is_empty() {
            return Err(CacheError::EmptyHistory);
        }
        for record in records {
            let evaluation = record.load()?;
            if evaluation.has_failures() {
                return Ok((record, evaluation));
            }
        }
        Err(CacheError::NoFailingRun)
    }

    /// Stores `evaluation` as a new record, then evicts records beyond the history size.
    ///
    /// Returns `None` when the cache is disabled.
    pub fn save(&self, evaluation: &Evaluation) -> Result<Option<CacheRecord>, CacheError> {
        if !self.enabled {
            debug!("Cache disabled, evaluation not saved");
            return Ok(None);
        }
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;

        let mut created_at = Utc::now();
        let (id, path) = loop {
            let id = created_at.format(RECORD_TIMESTAMP_FORMAT).to_string();
            let path = self.root.join(format!("{}.{}", id, RECORD_EXTENSION));
            if !path.exists() {
                break (id, path);
            }
            created_at += TimeDelta::microseconds(1);
        };

        let content = serde_json::to_string_pretty(evaluation).map_err(|source| CacheError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, content).map_err(io_error(&path))?;
        debug!("Saved evaluation '{}'", path.display());

        self.clear_older_than_limit()?;
        let created_at = NaiveDateTime::parse_from_str(&id, RECORD_TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .unwrap_or(created_at);
        Ok(Some(CacheRecord { id, created_at, path }))
    }

    /// Deletes the oldest records until at most `history_size` remain.
    ///
    /// Returns the number of deleted records.
    pub fn clear_older_than_limit(&self) -> Result<usize, CacheError> {
        let records = self.records()?;
        let mut evicted = 0;
        for record in records.iter().skip(self.history_size) {
            fs::remove_file(&record.path).map_err(io_error(&record.path))?;
            debug!("Evicted evaluation '{}'", record.id);
            evicted += 1;
        }
        Ok(evicted)
    }

    /// Deletes every record. Returns how many were deleted.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let records = self.records()?;
        for record in &records {
            fs::remove_file(&record.path).map_err(io_error(&record.path))?;
        }
        debug!("Cleared {} evaluations from '{}'", records.len(), self.root.display());
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Command, CommandEvaluation, SourceEvaluation};
    use std::time::Duration;
    use tempfile::tempdir;

    fn evaluation(marker: u64, success: bool) -> Evaluation {
        let mut evaluation = Evaluation {
            total_execution_duration: Duration::from_secs(marker),
            ..Evaluation::default()
        };
        evaluation.sources_evaluations.insert(
            PathBuf::from("a.py"),
            SourceEvaluation {
                commands_evaluations: vec![CommandEvaluation {
                    command: Command::new("lint", vec!["--check".to_string()]),
                    success,
                    execution_duration: Duration::from_millis(10),
                    captured_output: vec![],
                }],
                source_execution_duration: Duration::from_millis(10),
            },
        );
        evaluation
    }

    fn markers(cache: &Cache) -> Vec<u64> {
        cache
            .records()
            .unwrap()
            .iter()
            .map(|record| record.load().unwrap().total_execution_duration.as_secs())
            .collect()
    }

    #[test]
    fn test_save_and_get_newest_first() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 5).unwrap();
        for marker in 1..=3 {
            cache.save(&evaluation(marker, true)).unwrap();
        }
        assert_eq!(markers(&cache), [3, 2, 1]);
        assert_eq!(cache.get(0).unwrap().total_execution_duration, Duration::from_secs(3));
        assert_eq!(cache.get(2).unwrap().total_execution_duration, Duration::from_secs(1));
    }

    #[test]
    fn test_saving_beyond_history_size_evicts_oldest() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 3).unwrap();
        for marker in 1..=4 {
            cache.save(&evaluation(marker, true)).unwrap();
        }
        assert_eq!(cache.len().unwrap(), 3);
        assert_eq!(markers(&cache), [4, 3, 2]);
        assert!(matches!(
            cache.get(3),
            Err(CacheError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_clear_older_than_limit_on_a_shrunk_history() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 4).unwrap();
        for marker in 1..=4 {
            cache.save(&evaluation(marker, true)).unwrap();
        }
        let smaller = Cache::new(dir.path(), 2).unwrap();
        assert_eq!(smaller.clear_older_than_limit().unwrap(), 2);
        assert_eq!(markers(&smaller), [4, 3]);
    }

    #[test]
    fn test_latest_failed() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 5).unwrap();
        assert!(matches!(cache.latest_failed(), Err(CacheError::EmptyHistory)));

        cache.save(&evaluation(1, false)).unwrap();
        cache.save(&evaluation(2, true)).unwrap();
        let (_, failed) = cache.latest_failed().unwrap();
        assert_eq!(failed.total_execution_duration, Duration::from_secs(1));

        let clean = tempdir().unwrap();
        let cache = Cache::new(clean.path(), 5).unwrap();
        cache.save(&evaluation(1, true)).unwrap();
        assert!(matches!(cache.latest_failed(), Err(CacheError::NoFailingRun)));
    }

    #[test]
    fn test_empty_history() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path().join("missing"), 5).unwrap();
        assert!(cache.records().unwrap().is_empty());
        assert!(matches!(cache.latest(), Err(CacheError::EmptyHistory)));
        assert!(matches!(
            cache.get(0),
            Err(CacheError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_order_comes_from_record_names() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("20200101-000000-000001.json");
        let new = dir.path().join("20250101-000000-000001.json");
        // Written newest first so that modification times disagree with the names.
        fs::write(&new, serde_json::to_string(&evaluation(2, true)).unwrap()).unwrap();
        fs::write(&old, serde_json::to_string(&evaluation(1, true)).unwrap()).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a record").unwrap();
        fs::write(dir.path().join("garbage.json"), "{}").unwrap();

        let cache = Cache::new(dir.path(), 1).unwrap();
        assert_eq!(markers(&cache), [2, 1]);
        cache.clear_older_than_limit().unwrap();
        assert!(!old.exists());
        assert!(new.exists());
    }

    #[test]
    fn test_disabled_cache_does_not_write() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 5).unwrap().with_enabled(false);
        assert!(cache.save(&evaluation(1, true)).unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_zero_history_size_is_rejected() {
        assert!(matches!(
            Cache::new("/tmp", 0),
            Err(ConfigError::InvalidHistorySize(0))
        ));
    }

    #[test]
    fn test_clear_removes_everything() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path(), 5).unwrap();
        cache.save(&evaluation(1, true)).unwrap();
        cache.save(&evaluation(2, true)).unwrap();
        assert_eq!(cache.clear().unwrap(), 2);
        assert!(cache.is_empty().unwrap());
    }
}
