//! Persisted per-file caches keyed by `(path, size, mtime)`
//!
//! A cache is loaded once when a scan starts, consulted and filled by the
//! workers, and written once when the stage that owns it completes. An entry
//! is only trusted while the file's size and modification time still match;
//! anything else is a miss and the value is recomputed.
//!
//! On-disk layout (JSON):
//!
//! ```text
//! {
//!   "version": 1,
//!   "entries": {
//!     "/abs/path/mod.package": { "mtime": 1700000000.25, "size": 4096,
//!                                "written": 1700000100.0, ...value fields }
//!   }
//! }
//! ```

use crate::error::CacheError;
use modlens_formats::ResourceKey;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Schema version written to and expected from cache files
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// Allowed drift between cached and current modification times, in seconds
pub const MTIME_TOLERANCE: f64 = 0.01;

/// Default retention for entries whose file has disappeared
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// File name of the content digest cache
pub const DIGEST_CACHE_FILE: &str = "hash_cache.json";

/// File name of the package index cache
pub const INDEX_CACHE_FILE: &str = "index_cache.json";

/// Size and modification time of a file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FileStamp {
    /// Modification time in seconds since the Unix epoch
    pub mtime: f64,
    /// Size in bytes
    pub size: u64,
}

impl FileStamp {
    /// Stamp from already fetched metadata
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0.0, |d| d.as_secs_f64());
        Self {
            mtime,
            size: metadata.len(),
        }
    }

    /// Stamp of a file on disk
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_metadata(&std::fs::metadata(path)?))
    }

    /// Whether a cached stamp still describes the same file contents
    pub fn matches(&self, other: &Self) -> bool {
        self.size == other.size && (self.mtime - other.mtime).abs() <= MTIME_TOLERANCE
    }
}

/// Cached content digest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestRecord {
    /// Lowercase hex SHA-256
    pub hash: String,
}

/// Cached resource-key list of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyIndexRecord {
    /// Sorted, deduplicated keys
    #[serde(rename = "value")]
    pub keys: Vec<ResourceKey>,
}

/// One cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// Modification time the value was computed for
    pub mtime: f64,
    /// Size the value was computed for
    pub size: u64,
    /// When the entry was last written, seconds since the Unix epoch
    #[serde(default)]
    pub written: f64,
    /// Cached value
    #[serde(flatten)]
    pub value: V,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

#[derive(Serialize, Deserialize)]
#[serde(bound(deserialize = "V: DeserializeOwned"))]
struct CacheFile<V> {
    version: u32,
    entries: BTreeMap<PathBuf, CacheEntry<V>>,
}

/// Cache of per-file values validated by [`FileStamp`]
pub struct StampedCache<V> {
    location: Option<PathBuf>,
    entries: Mutex<HashMap<PathBuf, CacheEntry<V>>>,
    dirty: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> std::fmt::Debug for StampedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StampedCache")
            .field("location", &self.location)
            .field("entries", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

/// Cache of content digests
pub type DigestCache = StampedCache<DigestRecord>;

/// Cache of package resource keys
pub type IndexCache = StampedCache<KeyIndexRecord>;

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

impl<V> StampedCache<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Cache that lives only for this process
    pub fn in_memory() -> Self {
        Self {
            location: None,
            entries: Mutex::new(HashMap::new()),
            dirty: AtomicBool::new(false),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Load a cache file; a missing file yields an empty cache
    pub fn try_load(location: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let location = location.into();
        let mut cache = Self::in_memory();
        cache.location = Some(location.clone());

        let text = match std::fs::read_to_string(&location) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
            Err(source) => {
                return Err(CacheError::Io {
                    path: location,
                    source,
                });
            }
        };

        let probe: VersionProbe = serde_json::from_str(&text)?;
        if probe.version != CACHE_SCHEMA_VERSION {
            return Err(CacheError::UnsupportedVersion {
                found: probe.version,
                expected: CACHE_SCHEMA_VERSION,
            });
        }

        let file: CacheFile<V> = serde_json::from_str(&text)?;
        *cache.entries.get_mut() = file.entries.into_iter().collect();
        debug!(
            "Loaded {} cache entries from {}",
            cache.entries.get_mut().len(),
            location.display()
        );
        Ok(cache)
    }

    /// Load a cache file, starting empty on any failure
    pub fn load(location: impl Into<PathBuf>) -> Self {
        let location = location.into();
        match Self::try_load(&location) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("Ignoring cache {}: {e}", location.display());
                let mut cache = Self::in_memory();
                cache.location = Some(location);
                cache
            }
        }
    }

    /// Where the cache persists, if anywhere
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Cached value for `path` if its stamp still matches
    pub fn get(&self, path: &Path, stamp: &FileStamp) -> Option<V> {
        let found = self.entries.lock().get(path).and_then(|entry| {
            let cached = FileStamp {
                mtime: entry.mtime,
                size: entry.size,
            };
            cached.matches(stamp).then(|| entry.value.clone())
        });

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a freshly computed value
    pub fn insert(&self, path: PathBuf, stamp: FileStamp, value: V) {
        let entry = CacheEntry {
            mtime: stamp.mtime,
            size: stamp.size,
            written: now_secs(),
            value,
        };
        self.entries.lock().insert(path, entry);
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Drop entries whose file is gone and that were not written within `retention`
    pub fn prune(&self, retention: Duration) -> usize {
        let cutoff = now_secs() - retention.as_secs_f64();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|path, entry| entry.written >= cutoff || path.exists());
        let removed = before - entries.len();
        if removed > 0 {
            self.dirty.store(true, Ordering::Relaxed);
            debug!("Pruned {removed} stale cache entries");
        }
        removed
    }

    /// Write the cache if it changed since loading
    pub fn persist(&self) -> Result<(), CacheError> {
        let Some(location) = &self.location else {
            return Ok(());
        };
        if !self.dirty.load(Ordering::Relaxed) {
            return Ok(());
        }

        let file = CacheFile {
            version: CACHE_SCHEMA_VERSION,
            entries: self
                .entries
                .lock()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        let json = serde_json::to_vec(&file)?;

        let io_err = |source| CacheError::Io {
            path: location.clone(),
            source,
        };
        if let Some(parent) = location.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        // Write-then-rename so a crash never leaves a half-written cache
        let tmp = location.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, location).map_err(io_err)?;

        self.dirty.store(false, Ordering::Relaxed);
        debug!(
            "Persisted {} cache entries to {}",
            file.entries.len(),
            location.display()
        );
        Ok(())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to be recomputed
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn digest(hash: &str) -> DigestRecord {
        DigestRecord {
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_stamp_tolerance() {
        let a = FileStamp {
            mtime: 100.0,
            size: 10,
        };
        assert!(a.matches(&FileStamp {
            mtime: 100.005,
            size: 10
        }));
        assert!(!a.matches(&FileStamp {
            mtime: 100.5,
            size: 10
        }));
        assert!(!a.matches(&FileStamp {
            mtime: 100.0,
            size: 11
        }));
    }

    #[test]
    fn test_hit_requires_matching_stamp() {
        let cache = DigestCache::in_memory();
        let stamp = FileStamp {
            mtime: 5.0,
            size: 3,
        };
        cache.insert(PathBuf::from("/mods/a.package"), stamp, digest("ab"));

        assert_eq!(
            cache.get(Path::new("/mods/a.package"), &stamp),
            Some(digest("ab"))
        );
        let touched = FileStamp {
            mtime: 6.0,
            size: 3,
        };
        assert_eq!(cache.get(Path::new("/mods/a.package"), &touched), None);
        assert_eq!(cache.get(Path::new("/mods/b.package"), &stamp), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join("nested").join(DIGEST_CACHE_FILE);
        let stamp = FileStamp {
            mtime: 1.5,
            size: 42,
        };

        let cache = DigestCache::load(&location);
        assert!(cache.is_empty());
        cache.insert(dir.path().join("x.package"), stamp, digest("ff00"));
        cache.persist().unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&location).unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        let entry = &json["entries"][dir.path().join("x.package").to_string_lossy().as_ref()];
        assert_eq!(entry["hash"], "ff00");
        assert_eq!(entry["size"], 42);

        let reloaded = DigestCache::try_load(&location).unwrap();
        assert_eq!(
            reloaded.get(&dir.path().join("x.package"), &stamp),
            Some(digest("ff00"))
        );
    }

    #[test]
    fn test_unknown_schema_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let location = dir.path().join(INDEX_CACHE_FILE);
        std::fs::write(&location, r#"{"version": 99, "entries": {"x": 1}}"#).unwrap();

        assert!(matches!(
            IndexCache::try_load(&location),
            Err(CacheError::UnsupportedVersion { found: 99, .. })
        ));
        assert!(IndexCache::load(&location).is_empty());

        std::fs::write(&location, "not json").unwrap();
        assert!(IndexCache::load(&location).is_empty());
    }

    #[test]
    fn test_prune_keeps_existing_and_recent() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.package");
        std::fs::write(&present, b"x").unwrap();
        let stamp = FileStamp::of(&present).unwrap();

        let cache = DigestCache::in_memory();
        cache.insert(present.clone(), stamp, digest("1"));
        cache.insert(dir.path().join("gone.package"), stamp, digest("2"));
        cache.entries.lock().insert(
            dir.path().join("old.package"),
            CacheEntry {
                mtime: 0.0,
                size: 1,
                written: 0.0,
                value: digest("3"),
            },
        );

        assert_eq!(cache.prune(DEFAULT_RETENTION), 1);
        assert_eq!(cache.len(), 2);

        // With zero retention only files that still exist survive
        assert_eq!(cache.prune(Duration::ZERO), 1);
        assert!(cache.get(&present, &stamp).is_some());
    }

    #[test]
    fn test_in_memory_persist_is_noop() {
        let cache = IndexCache::in_memory();
        cache.insert(
            PathBuf::from("/p"),
            FileStamp {
                mtime: 0.0,
                size: 0,
            },
            KeyIndexRecord { keys: Vec::new() },
        );
        assert!(cache.persist().is_ok());
        assert!(cache.location().is_none());
    }
}
