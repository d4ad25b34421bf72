//! Command-line arguments.
//!
//! Every option can also be given through a `MODLENS_*` environment variable.
//! When `--config` names a JSON file it is loaded first and the flags given on
//! the command line override it.

use anyhow::{Context, Result};
use clap::Parser;
use modlens_scan::ScanConfig;
use std::path::PathBuf;

/// Name of the cache directory created under the platform cache dir
const CACHE_DIR_NAME: &str = "modlens";

/// Scan mod folders for duplicates, corrupt packages and resource conflicts.
#[derive(Debug, Clone, Parser)]
#[command(name = "modlens", version, about)]
pub struct Args {
    /// Mod folders to scan
    #[arg(required_unless_present = "config")]
    pub roots: Vec<PathBuf>,

    /// JSON scan configuration to start from
    #[arg(long, env = "MODLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Accepted file extensions, comma-separated (`*` accepts every file)
    #[arg(long, env = "MODLENS_EXTENSIONS", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// Directory names to skip, comma-separated
    #[arg(long = "ignore-dir", env = "MODLENS_IGNORE_DIRS", value_delimiter = ',')]
    pub ignore_dirs: Vec<String>,

    /// Skip name and similar-name grouping
    #[arg(long)]
    pub no_name: bool,

    /// Skip content hashing
    #[arg(long)]
    pub no_content: bool,

    /// Skip resource conflict detection
    #[arg(long)]
    pub no_conflicts: bool,

    /// Worker threads for hashing and indexing
    #[arg(long, env = "MODLENS_THREADS")]
    pub threads: Option<usize>,

    /// Directory for the digest and package-index caches
    #[arg(long, env = "MODLENS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Keep caches in memory only
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,

    /// Print the full report as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Platform cache directory for modlens, if the platform has one
pub fn default_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join(CACHE_DIR_NAME))
}

impl Args {
    /// Build the scan configuration these arguments describe
    pub fn to_scan_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ScanConfig::default(),
        };

        if !self.roots.is_empty() {
            config.roots.clone_from(&self.roots);
        }
        if !self.extensions.is_empty() {
            config.extensions.clone_from(&self.extensions);
        }
        if !self.ignore_dirs.is_empty() {
            config.ignored_dirs.clone_from(&self.ignore_dirs);
        }
        if self.no_name {
            config.detect_name_duplicates = false;
        }
        if self.no_content {
            config.detect_content_duplicates = false;
        }
        if self.no_conflicts {
            config.detect_conflicts = false;
        }
        if let Some(threads) = self.threads {
            config.worker_threads = threads;
        }

        if self.no_cache {
            config.cache_dir = None;
        } else if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        } else if config.cache_dir.is_none() {
            config.cache_dir = default_cache_dir();
        }

        Ok(config)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("modlens").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_map_onto_config() {
        let args = parse(&[
            "/mods",
            "/more",
            "--extensions",
            ".package,*",
            "--ignore-dir",
            "backup",
            "--no-content",
            "--threads",
            "3",
            "--cache-dir",
            "/tmp/c",
        ]);
        let config = args.to_scan_config().unwrap();
        assert_eq!(config.roots, vec![PathBuf::from("/mods"), PathBuf::from("/more")]);
        assert_eq!(config.extensions, vec![".package", "*"]);
        assert_eq!(config.ignored_dirs, vec!["backup"]);
        assert!(config.detect_name_duplicates);
        assert!(!config.detect_content_duplicates);
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/c")));
    }

    #[test]
    fn test_defaults_keep_library_defaults() {
        let config = parse(&["/mods", "--no-cache"]).to_scan_config().unwrap();
        assert_eq!(config.extensions, vec![".package", ".ts4script"]);
        assert_eq!(config.worker_threads, 6);
        assert_eq!(config.cache_dir, None);
    }

    #[test]
    fn test_roots_required_without_config() {
        assert!(Args::try_parse_from(["modlens"]).is_err());
        assert!(
            Args::try_parse_from(["modlens", "/m", "--no-cache", "--cache-dir", "/c"]).is_err()
        );
    }

    #[test]
    fn test_verify_command() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
