//! Error types for scanning.
//!
//! Only caller-level problems surface as errors. Per-file failures are
//! recorded in the report or logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that prevent a scan from starting.
#[derive(Debug, Error)]
pub enum ScanError {
    /// No root directories were configured
    #[error("No root directories given")]
    NoRoots,

    /// Every detection mode is disabled
    #[error("No detection mode selected (enable name, content or conflict detection)")]
    NoDetectionMode,

    /// Worker pool size out of range
    #[error("Invalid worker thread count: {0} (must be between 1 and 256)")]
    InvalidWorkerCount(usize),

    /// Worker pool could not be created
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Configuration file could not be read
    #[error("Failed to read configuration from {path}: {source}")]
    ConfigRead {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON
    #[error("Invalid configuration JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),
}

/// Errors while loading or persisting an on-disk cache.
///
/// The scanner downgrades these to warnings: a cache that cannot be read is
/// treated as empty, and one that cannot be written is simply not saved.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Cache file could not be read or written
    #[error("Cache I/O error on {path}: {source}")]
    Io {
        /// Cache file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Cache file is not valid JSON
    #[error("Invalid cache JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Cache written by an incompatible schema
    #[error("Unsupported cache schema version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Version this build understands
        expected: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_messages() {
        assert_eq!(ScanError::NoRoots.to_string(), "No root directories given");
        assert!(ScanError::InvalidWorkerCount(0).to_string().contains('0'));
    }

    #[test]
    fn test_cache_error_messages() {
        let err = CacheError::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported cache schema version 9 (expected 1)"
        );
    }
}
