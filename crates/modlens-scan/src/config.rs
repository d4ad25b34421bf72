//! Scan configuration.
//!
//! A [`ScanConfig`] names the roots to walk, which files count as mods, which
//! detections to run, and where caches live. It can be built in code with the
//! `with_*` setters or loaded from a JSON file; missing fields take their
//! defaults.
//!
//! # Example
//!
//! ```no_run
//! use modlens_scan::ScanConfig;
//!
//! let config = ScanConfig::new(["/home/me/Mods"])
//!     .with_worker_threads(8)
//!     .with_conflict_detection(false);
//! config.validate().expect("Invalid configuration");
//! ```

use crate::cache::{DIGEST_CACHE_FILE, INDEX_CACHE_FILE};
use crate::conflict::SeverityPolicy;
use crate::error::ScanError;
use crate::pool::{DEFAULT_WORKER_THREADS, MAX_WORKER_THREADS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Extensions treated as mod files by default
pub const DEFAULT_EXTENSIONS: &[&str] = &[".package", ".ts4script"];

/// Directory names skipped by default
pub const DEFAULT_IGNORED_DIRS: &[&str] = &["__macosx", ".git"];

/// Default cache retention for files that have disappeared
pub const DEFAULT_CACHE_RETENTION_DAYS: u64 = 30;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Configuration of one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Directories to walk
    pub roots: Vec<PathBuf>,
    /// Accepted extensions, or `*` for every file
    pub extensions: Vec<String>,
    /// Directory names pruned during the walk (case-insensitive)
    pub ignored_dirs: Vec<String>,
    /// Group files by exact and normalised name
    pub detect_name_duplicates: bool,
    /// Group byte-identical files
    pub detect_content_duplicates: bool,
    /// Index packages and report shared resource keys
    pub detect_conflicts: bool,
    /// Worker pool size
    pub worker_threads: usize,
    /// Directory holding the persisted caches; `None` keeps them in memory
    pub cache_dir: Option<PathBuf>,
    /// Days a cache entry for a missing file is kept
    pub cache_retention_days: u64,
    /// Conflict ranking thresholds
    pub severity: SeverityPolicy,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
            ignored_dirs: DEFAULT_IGNORED_DIRS.iter().map(ToString::to_string).collect(),
            detect_name_duplicates: true,
            detect_content_duplicates: true,
            detect_conflicts: true,
            worker_threads: DEFAULT_WORKER_THREADS,
            cache_dir: None,
            cache_retention_days: DEFAULT_CACHE_RETENTION_DAYS,
            severity: SeverityPolicy::default(),
        }
    }
}

impl ScanConfig {
    /// Default configuration over `roots`
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ScanError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Replace the extension list
    #[must_use]
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the ignored directory names
    #[must_use]
    pub fn with_ignored_dirs<I, S>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_dirs = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle name and similar-name grouping
    #[must_use]
    pub fn with_name_detection(mut self, enabled: bool) -> Self {
        self.detect_name_duplicates = enabled;
        self
    }

    /// Toggle content grouping
    #[must_use]
    pub fn with_content_detection(mut self, enabled: bool) -> Self {
        self.detect_content_duplicates = enabled;
        self
    }

    /// Toggle resource-key conflict detection
    #[must_use]
    pub fn with_conflict_detection(mut self, enabled: bool) -> Self {
        self.detect_conflicts = enabled;
        self
    }

    /// Set the worker pool size
    #[must_use]
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Persist caches under `dir`
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Set cache retention for missing files
    #[must_use]
    pub fn with_cache_retention_days(mut self, days: u64) -> Self {
        self.cache_retention_days = days;
        self
    }

    /// Set conflict ranking thresholds
    #[must_use]
    pub fn with_severity(mut self, severity: SeverityPolicy) -> Self {
        self.severity = severity;
        self
    }

    /// Check that a scan can start with this configuration
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.roots.is_empty() {
            return Err(ScanError::NoRoots);
        }
        if !(self.detect_name_duplicates || self.detect_content_duplicates || self.detect_conflicts)
        {
            return Err(ScanError::NoDetectionMode);
        }
        if self.worker_threads == 0 || self.worker_threads > MAX_WORKER_THREADS {
            return Err(ScanError::InvalidWorkerCount(self.worker_threads));
        }
        Ok(())
    }

    /// Retention window for cache pruning
    pub const fn cache_retention(&self) -> Duration {
        Duration::from_secs(self.cache_retention_days.saturating_mul(SECONDS_PER_DAY))
    }

    /// Location of the digest cache, if caches persist
    pub fn digest_cache_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|d| d.join(DIGEST_CACHE_FILE))
    }

    /// Location of the package-index cache, if caches persist
    pub fn index_cache_path(&self) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|d| d.join(INDEX_CACHE_FILE))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ScanConfig::new(["/mods"]);
        assert_eq!(config.extensions, vec![".package", ".ts4script"]);
        assert_eq!(config.ignored_dirs, vec!["__macosx", ".git"]);
        assert_eq!(config.worker_threads, 6);
        assert_eq!(config.severity.harmless_max_shared, 2);
        assert_eq!(config.severity.tuning_name_limit, 8);
        assert_eq!(config.cache_retention(), Duration::from_secs(30 * 86_400));
        assert!(config.digest_cache_path().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            ScanConfig::default().validate(),
            Err(ScanError::NoRoots)
        ));
        let none = ScanConfig::new(["/m"])
            .with_name_detection(false)
            .with_content_detection(false)
            .with_conflict_detection(false);
        assert!(matches!(none.validate(), Err(ScanError::NoDetectionMode)));
        assert!(matches!(
            ScanConfig::new(["/m"]).with_worker_threads(0).validate(),
            Err(ScanError::InvalidWorkerCount(0))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(
            &path,
            r#"{
                "roots": ["/a", "/b"],
                "detect_conflicts": false,
                "severity": {"harmless_max_shared": 5}
            }"#,
        )
        .unwrap();

        let config = ScanConfig::load(&path).unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(!config.detect_conflicts);
        assert!(config.detect_name_duplicates);
        assert_eq!(config.severity.harmless_max_shared, 5);
        assert_eq!(config.severity.tuning_name_limit, 8);
    }

    #[test]
    fn test_cache_paths() {
        let config = ScanConfig::new(["/m"]).with_cache_dir("/cache");
        assert_eq!(
            config.index_cache_path(),
            Some(PathBuf::from("/cache/index_cache.json"))
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ScanConfig::load("/definitely/not/here.json"),
            Err(ScanError::ConfigRead { .. })
        ));
    }
}
