//! Duplicate, variant and resource-conflict detection for mod folders
//!
#![allow(clippy::doc_markdown)] // Format-specific terms don't need backticks
//! This crate walks one or more mod folders and reports:
//!
//! - **Name duplicates**: the same filename in several places
//! - **Similar names**: revisions of one mod (`hair_v2`, `hair (copy)`)
//! - **Content duplicates**: byte-identical files, found with SHA-256
//! - **Corrupt packages**: files failing header validation
//! - **Resource conflicts**: packages overriding each other's resources,
//!   ranked by severity, plus addon pairs and contained packages
//!
//! # Example
//!
//! ```no_run
//! use modlens_scan::{ScanConfig, Scanner};
//!
//! let config = ScanConfig::new(["/home/me/Mods"]).with_cache_dir("/tmp/modlens");
//! let report = Scanner::new(config)?
//!     .with_progress(|p| println!("{}: {}", p.phase, p.message))
//!     .run()?;
//!
//! for conflict in &report.conflicts {
//!     println!("{} {:?}", conflict.severity, conflict.member_paths);
//! }
//! # Ok::<(), modlens_scan::ScanError>(())
//! ```
//!
//! # Caching
//!
//! Content digests and package key lists are cached on disk by
//! `(path, size, mtime)`; a second scan of an unchanged folder reads no file
//! contents for those stages.

#![warn(missing_docs)]

pub mod cache;
pub mod collector;
pub mod config;
pub mod conflict;
pub mod dedup;
pub mod error;
pub mod names;
pub mod package_file;
pub mod pool;
pub mod progress;
pub mod scanner;

pub use cache::{DigestCache, FileStamp, IndexCache, StampedCache};
pub use collector::{CollectedFiles, ExtensionFilter, FileCollector, collect};
pub use config::ScanConfig;
pub use conflict::{
    ConflictEngine, ConflictEntry, ConflictReport, ContainmentEntry, Severity, SeverityPolicy,
};
pub use dedup::{DuplicateGroup, DuplicateReport, find_duplicates};
pub use error::{CacheError, ScanError};
pub use modlens_formats::IntegrityStatus;
pub use names::{is_addon_pair, normalize_name};
pub use package_file::PackageFile;
pub use pool::WorkerPool;
pub use progress::{Phase, Progress, ProgressCallback, ProgressReporter};
pub use scanner::{CorruptFile, ScanReport, ScanStats, Scanner};
