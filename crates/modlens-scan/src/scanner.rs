//! The scan pipeline
//!
//! ```text
//! collect ─► name / content grouping ─► integrity ─► conflicts ─► report
//! ```
//!
//! Caches are loaded when the scan starts and written once after the stage
//! that fills them. Per-file failures never abort the scan.

use crate::cache::{DigestCache, IndexCache};
use crate::collector::{ExtensionFilter, FileCollector};
use crate::config::ScanConfig;
use crate::conflict::{ConflictEngine, ConflictEntry, ContainmentEntry};
use crate::dedup::{DuplicateGroup, find_duplicates};
use crate::error::ScanError;
use crate::package_file::{PackageFile, is_package_path};
use crate::pool::WorkerPool;
use crate::progress::{Phase, Progress, ProgressReporter};
use modlens_formats::IntegrityStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// A package that failed header validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorruptFile {
    /// Package path
    pub path: PathBuf,
    /// Why it failed
    pub status: IntegrityStatus,
}

/// Counters describing one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Every regular file found under the roots
    pub files_scanned: usize,
    /// Files with an accepted extension
    pub mod_files: usize,
    /// Packages whose headers were checked
    pub packages_checked: usize,
    /// Packages whose key sets were compared
    pub packages_indexed: usize,
    /// Digests served from the cache
    pub digest_cache_hits: u64,
    /// Digests computed
    pub digest_cache_misses: u64,
    /// Key lists served from the cache
    pub index_cache_hits: u64,
    /// Key lists read from packages
    pub index_cache_misses: u64,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

/// Everything a scan found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Mod files considered
    pub files: Vec<PathBuf>,
    /// Exact filename duplicates
    pub name_groups: Vec<DuplicateGroup>,
    /// Byte-identical files
    pub content_groups: Vec<DuplicateGroup>,
    /// Files whose normalised names match
    pub similar_groups: Vec<DuplicateGroup>,
    /// Packages failing header validation
    pub corrupt_files: Vec<CorruptFile>,
    /// Ranked resource-key conflicts
    pub conflicts: Vec<ConflictEntry>,
    /// Mod and addon overlaps
    pub addon_pairs: Vec<ConflictEntry>,
    /// Subset and identical key-set relationships
    pub containments: Vec<ContainmentEntry>,
    /// Files without an accepted extension
    pub non_mod_paths: Vec<PathBuf>,
    /// Counters
    pub stats: ScanStats,
}

impl ScanReport {
    /// Whether nothing worth reporting was found
    pub fn is_clean(&self) -> bool {
        self.name_groups.is_empty()
            && self.content_groups.is_empty()
            && self.similar_groups.is_empty()
            && self.corrupt_files.is_empty()
            && self.conflicts.is_empty()
            && self.addon_pairs.is_empty()
            && self.containments.is_empty()
    }
}

/// Runs a configured scan
#[derive(Debug)]
pub struct Scanner {
    config: ScanConfig,
    progress: ProgressReporter,
}

impl Scanner {
    /// Validate `config` and prepare a scanner
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: ProgressReporter::silent(),
        })
    }

    /// Receive progress notifications
    #[must_use]
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Progress) + Send + Sync + 'static,
    {
        self.progress = ProgressReporter::new(Arc::new(callback));
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Run every enabled stage and build the report
    pub fn run(&self) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let config = &self.config;
        let pool = WorkerPool::new(config.worker_threads)?;
        let digest_cache = config
            .digest_cache_path()
            .map_or_else(DigestCache::in_memory, DigestCache::load);
        let index_cache = config
            .index_cache_path()
            .map_or_else(IndexCache::in_memory, IndexCache::load);

        info!(
            "Scanning {} roots with {} workers",
            config.roots.len(),
            pool.threads()
        );

        self.progress
            .report_now(Phase::Collect, None, None, "Collecting files");
        let filter = ExtensionFilter::new(&config.extensions);
        let collected = FileCollector::new(filter, &config.ignored_dirs)
            .with_progress(self.progress.clone())
            .collect(&config.roots);

        let duplicates = find_duplicates(
            &collected.mod_files,
            config.detect_name_duplicates,
            config.detect_content_duplicates,
            &pool,
            &digest_cache,
            &self.progress,
        );
        if config.detect_content_duplicates {
            digest_cache.prune(config.cache_retention());
            if let Err(e) = digest_cache.persist() {
                warn!("Failed to save digest cache: {e}");
            }
        }

        let packages: Vec<PackageFile> = collected
            .mod_files
            .iter()
            .filter(|p| is_package_path(p))
            .map(PackageFile::new)
            .collect();
        let corrupt_files = self.check_integrity(&pool, &packages);

        let mut report = ScanReport {
            name_groups: duplicates.name_groups,
            content_groups: duplicates.content_groups,
            similar_groups: duplicates.similar_groups,
            ..ScanReport::default()
        };

        if config.detect_conflicts {
            let valid: Vec<PathBuf> = packages
                .iter()
                .filter(|p| p.integrity().is_ok())
                .map(|p| p.path().to_path_buf())
                .collect();
            let conflicts = ConflictEngine::new(&pool, &index_cache, config.severity)
                .with_progress(self.progress.clone())
                .find_conflicts(&valid);
            index_cache.prune(config.cache_retention());
            if let Err(e) = index_cache.persist() {
                warn!("Failed to save package index cache: {e}");
            }

            report.stats.packages_indexed = conflicts.packages_indexed;
            report.conflicts = conflicts.conflicts;
            report.addon_pairs = conflicts.addon_pairs;
            report.containments = conflicts.containments;
        }

        report.stats.files_scanned = collected.len();
        report.stats.mod_files = collected.mod_files.len();
        report.stats.packages_checked = packages.len();
        report.stats.digest_cache_hits = digest_cache.hits();
        report.stats.digest_cache_misses = digest_cache.misses();
        report.stats.index_cache_hits = index_cache.hits();
        report.stats.index_cache_misses = index_cache.misses();
        report.stats.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        report.corrupt_files = corrupt_files;
        report.files = collected.mod_files;
        report.non_mod_paths = collected.other_files;

        self.progress.report_now(
            Phase::Done,
            None,
            None,
            format!("Scan finished in {} ms", report.stats.elapsed_ms),
        );
        info!(
            "Scan finished in {} ms: {} files, {} conflicts",
            report.stats.elapsed_ms,
            report.stats.files_scanned,
            report.conflicts.len()
        );
        Ok(report)
    }

    fn check_integrity(&self, pool: &WorkerPool, packages: &[PackageFile]) -> Vec<CorruptFile> {
        let total = packages.len() as u64;
        self.progress
            .report_now(Phase::Integrity, Some(0), Some(total), "Checking packages");

        let done = AtomicU64::new(0);
        let statuses = pool.map(packages, |package| {
            let status = package.integrity();
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            self.progress
                .report(Phase::Integrity, Some(current), Some(total), || {
                    format!("Checking {}", package.path().display())
                });
            status
        });

        let corrupt: Vec<CorruptFile> = packages
            .iter()
            .zip(statuses)
            .filter(|(_, status)| !status.is_ok())
            .map(|(package, status)| CorruptFile {
                path: package.path().to_path_buf(),
                status,
            })
            .collect();
        if !corrupt.is_empty() {
            info!("{} of {total} packages failed validation", corrupt.len());
        }
        corrupt
    }
}
