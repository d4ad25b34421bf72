//! Name, similar-name and content duplicate detection
//!
//! Name grouping is purely in-memory. Content grouping stats every file,
//! hashes only files whose size collides with another file, and consults the
//! digest cache before reading anything.

use crate::cache::{DigestCache, DigestRecord, FileStamp};
use crate::names::normalize_name;
use crate::pool::WorkerPool;
use crate::progress::{Phase, ProgressReporter};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Read buffer used while hashing
const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// Files grouped under a shared key
///
/// Always holds at least two paths, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Lowercased filename, normalised stem or hex digest
    pub key: String,
    /// Member paths
    pub paths: Vec<PathBuf>,
}

impl DuplicateGroup {
    fn from_map(map: BTreeMap<String, Vec<PathBuf>>) -> Vec<Self> {
        map.into_iter()
            .filter(|(_, paths)| paths.len() >= 2)
            .map(|(key, mut paths)| {
                paths.sort();
                paths.dedup();
                Self { key, paths }
            })
            .filter(|group| group.paths.len() >= 2)
            .collect()
    }
}

/// Result of [`find_duplicates`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Exact (case-insensitive) filename matches
    pub name_groups: Vec<DuplicateGroup>,
    /// Byte-identical files
    pub content_groups: Vec<DuplicateGroup>,
    /// Files whose normalised names match
    pub similar_groups: Vec<DuplicateGroup>,
}

fn lower_file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_lowercase())
}

/// Group files by case-insensitive filename
pub fn name_groups(files: &[PathBuf]) -> Vec<DuplicateGroup> {
    let mut by_name: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(name) = lower_file_name(path) {
            by_name.entry(name).or_default().push(path.clone());
        }
    }
    DuplicateGroup::from_map(by_name)
}

/// Group files by normalised stem
///
/// A group is kept only when its members differ in filename and in stem;
/// groups that only repeat a filename are already exact-name groups.
pub fn similar_groups(files: &[PathBuf]) -> Vec<DuplicateGroup> {
    let mut by_norm: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        if let Some(name) = lower_file_name(path) {
            by_norm
                .entry(normalize_name(&name))
                .or_default()
                .push(path.clone());
        }
    }

    DuplicateGroup::from_map(by_norm)
        .into_iter()
        .filter(|group| {
            let names: BTreeSet<_> = group
                .paths
                .iter()
                .filter_map(|p| lower_file_name(p))
                .collect();
            let stems: BTreeSet<_> = group
                .paths
                .iter()
                .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_lowercase()))
                .collect();
            names.len() > 1 && stems.len() > 1
        })
        .collect()
}

/// Drop exact-name groups whose members all sit inside one similar group
pub fn prune_redundant_name_groups(
    name_groups: Vec<DuplicateGroup>,
    similar: &[DuplicateGroup],
) -> Vec<DuplicateGroup> {
    let similar_sets: Vec<BTreeSet<&PathBuf>> =
        similar.iter().map(|g| g.paths.iter().collect()).collect();
    name_groups
        .into_iter()
        .filter(|group| {
            !similar_sets
                .iter()
                .any(|set| group.paths.iter().all(|p| set.contains(p)))
        })
        .collect()
}

/// SHA-256 of a file's contents as lowercase hex
pub fn digest_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn cached_digest(path: &Path, stamp: FileStamp, cache: &DigestCache) -> Option<String> {
    if let Some(record) = cache.get(path, &stamp) {
        return Some(record.hash);
    }
    match digest_file(path) {
        Ok(hash) => {
            cache.insert(
                path.to_path_buf(),
                stamp,
                DigestRecord { hash: hash.clone() },
            );
            Some(hash)
        }
        Err(e) => {
            debug!("Failed to hash {}: {e}", path.display());
            None
        }
    }
}

/// Digest of zero-length content
fn empty_digest() -> String {
    hex::encode(Sha256::digest(b""))
}

/// Group byte-identical files
///
/// Zero-length files share the empty-input digest without being opened.
pub fn content_groups(
    files: &[PathBuf],
    pool: &WorkerPool,
    cache: &DigestCache,
    progress: &ProgressReporter,
) -> Vec<DuplicateGroup> {
    let total = files.len() as u64;
    progress.report_now(
        Phase::HashingInit,
        Some(0),
        Some(total),
        "Comparing file sizes",
    );

    let stamps = pool.map(files, |path| match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Some(FileStamp::from_metadata(&metadata)),
        Ok(_) => None,
        Err(e) => {
            debug!("Failed to stat {}: {e}", path.display());
            None
        }
    });

    let mut by_size: BTreeMap<u64, Vec<(PathBuf, FileStamp)>> = BTreeMap::new();
    for (path, stamp) in files.iter().zip(stamps) {
        if let Some(stamp) = stamp {
            by_size.entry(stamp.size).or_default().push((path.clone(), stamp));
        }
    }
    let candidates: Vec<(PathBuf, FileStamp)> = by_size
        .into_values()
        .filter(|same_size| same_size.len() >= 2)
        .flatten()
        .collect();

    let to_hash = candidates.len() as u64;
    info!("Hashing {to_hash} of {total} files with colliding sizes");

    let done = AtomicU64::new(0);
    let digests = pool.map(&candidates, |(path, stamp)| {
        let hash = if stamp.size == 0 {
            Some(empty_digest())
        } else {
            cached_digest(path, *stamp, cache)
        };
        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
        progress.report(Phase::Hashing, Some(current), Some(to_hash), || {
            format!("Hashing {}", path.display())
        });
        hash
    });

    let mut by_hash: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for ((path, _), hash) in candidates.into_iter().zip(digests) {
        if let Some(hash) = hash {
            by_hash.entry(hash).or_default().push(path);
        }
    }
    DuplicateGroup::from_map(by_hash)
}

/// Run the enabled duplicate detections over `files`
pub fn find_duplicates(
    files: &[PathBuf],
    detect_names: bool,
    detect_content: bool,
    pool: &WorkerPool,
    cache: &DigestCache,
    progress: &ProgressReporter,
) -> DuplicateReport {
    let mut report = DuplicateReport::default();

    if detect_names {
        progress.report_now(
            Phase::Name,
            Some(0),
            Some(files.len() as u64),
            "Grouping by name",
        );
        let similar = similar_groups(files);
        report.name_groups = prune_redundant_name_groups(name_groups(files), &similar);
        report.similar_groups = similar;
        info!(
            "Found {} name groups and {} similar groups",
            report.name_groups.len(),
            report.similar_groups.len()
        );
    }

    if detect_content {
        report.content_groups = content_groups(files, pool, cache, progress);
        info!("Found {} content groups", report.content_groups.len());
    }

    report
}
