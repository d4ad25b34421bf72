//! Recursive file collection under the configured roots

use crate::progress::{Phase, ProgressReporter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Extension list entry that accepts every file
pub const WILDCARD_EXTENSION: &str = "*";

/// Set of accepted file extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: BTreeSet<String>,
    accept_all: bool,
}

impl ExtensionFilter {
    /// Build from entries such as `.package`, `package` or `*`
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self {
            extensions: BTreeSet::new(),
            accept_all: false,
        };
        for ext in extensions {
            let ext = ext.as_ref().trim().to_lowercase();
            if ext == WILDCARD_EXTENSION {
                filter.accept_all = true;
            } else if let Some(bare) = ext.strip_prefix('.') {
                if !bare.is_empty() {
                    filter.extensions.insert(bare.to_string());
                }
            } else if !ext.is_empty() {
                filter.extensions.insert(ext);
            }
        }
        filter
    }

    /// Whether `path` has an accepted extension
    pub fn matches(&self, path: &Path) -> bool {
        self.accept_all
            || path
                .extension()
                .is_some_and(|ext| self.extensions.contains(&ext.to_string_lossy().to_lowercase()))
    }
}

/// Files found by a walk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedFiles {
    /// Files with an accepted extension, sorted
    pub mod_files: Vec<PathBuf>,
    /// Every other regular file, sorted
    pub other_files: Vec<PathBuf>,
}

impl CollectedFiles {
    /// Total number of files found
    pub fn len(&self) -> usize {
        self.mod_files.len() + self.other_files.len()
    }

    /// Whether nothing was found
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(unix)]
fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

#[cfg(windows)]
fn is_hidden(entry: &DirEntry) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    entry
        .metadata()
        .is_ok_and(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
}

#[cfg(not(any(unix, windows)))]
fn is_hidden(_entry: &DirEntry) -> bool {
    false
}

#[cfg(unix)]
fn file_identity(entry: &DirEntry) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    entry.metadata().ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn file_identity(_entry: &DirEntry) -> Option<(u64, u64)> {
    None
}

/// Absolute form of `root`; `..` components are resolved through the filesystem
fn absolute_root(root: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(root)?;
    if absolute.components().any(|c| c == Component::ParentDir) {
        absolute.canonicalize()
    } else {
        Ok(absolute)
    }
}

/// Walks root directories and splits files into mod and other files
#[derive(Debug, Clone)]
pub struct FileCollector {
    extensions: ExtensionFilter,
    ignored_dirs: HashSet<String>,
    progress: ProgressReporter,
}

impl FileCollector {
    /// Create a collector; ignored directory names compare case-insensitively
    pub fn new<S: AsRef<str>>(extensions: ExtensionFilter, ignored_dirs: &[S]) -> Self {
        Self {
            extensions,
            ignored_dirs: ignored_dirs
                .iter()
                .map(|d| d.as_ref().to_lowercase())
                .collect(),
            progress: ProgressReporter::silent(),
        }
    }

    /// Report walk progress
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    fn descend_into(&self, entry: &DirEntry) -> bool {
        // Roots are always walked, even when hidden or named like an ignored dir
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        !self.ignored_dirs.contains(&name) && !is_hidden(entry)
    }

    /// Walk every root
    ///
    /// Relative roots are resolved against the working directory, so every
    /// collected path is absolute. Missing roots are logged and skipped.
    /// Symlinks are never followed, and a file reachable through several hard
    /// links is reported once.
    pub fn collect(&self, roots: &[PathBuf]) -> CollectedFiles {
        let mut collected = CollectedFiles::default();
        let mut seen_ids: HashSet<(u64, u64)> = HashSet::new();
        let mut seen_paths: HashSet<PathBuf> = HashSet::new();

        for root in roots {
            let root = match absolute_root(root) {
                Ok(root) => root,
                Err(e) => {
                    warn!("Skipping root {}: {e}", root.display());
                    continue;
                }
            };
            if !root.exists() {
                warn!("Skipping missing root {}", root.display());
                continue;
            }
            debug!("Walking {}", root.display());

            let walker = WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| self.descend_into(e));

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("Walk error: {e}");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Some(id) = file_identity(&entry)
                    && !seen_ids.insert(id)
                {
                    continue;
                }
                let path = entry.into_path();
                if !seen_paths.insert(path.clone()) {
                    continue;
                }

                if self.extensions.matches(&path) {
                    collected.mod_files.push(path);
                } else {
                    collected.other_files.push(path);
                }

                let found = collected.len() as u64;
                self.progress
                    .report(Phase::Collect, Some(found), None, || format!("Found {found} files"));
            }
        }

        collected.mod_files.sort();
        collected.other_files.sort();
        info!(
            "Collected {} mod files and {} other files",
            collected.mod_files.len(),
            collected.other_files.len()
        );
        collected
    }
}

/// Walk `roots` with the given extension list and ignored directory names
pub fn collect<E: AsRef<str>, D: AsRef<str>>(
    roots: &[PathBuf],
    allowed_extensions: &[E],
    ignored_dir_names: &[D],
) -> CollectedFiles {
    FileCollector::new(ExtensionFilter::new(allowed_extensions), ignored_dir_names).collect(roots)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_extension_filter_normalisation() {
        let filter = ExtensionFilter::new([".Package", "ts4script", " "]);
        assert!(filter.matches(Path::new("a.package")));
        assert!(filter.matches(Path::new("a.PACKAGE")));
        assert!(filter.matches(Path::new("b.ts4script")));
        assert!(!filter.matches(Path::new("c.txt")));
        assert!(!filter.matches(Path::new("package")));

        let all = ExtensionFilter::new(["*"]);
        assert!(all.matches(Path::new("anything")));
    }

    #[test]
    fn test_walk_prunes_ignored_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("Sub/Deeper")).unwrap();
        fs::create_dir_all(root.join("__MACOSX")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("a.package"), b"a").unwrap();
        fs::write(root.join("Sub/Deeper/b.package"), b"b").unwrap();
        fs::write(root.join("Sub/readme.txt"), b"r").unwrap();
        fs::write(root.join("__MACOSX/c.package"), b"c").unwrap();
        fs::write(root.join(".git/d.package"), b"d").unwrap();

        let collected = collect(
            &[root.to_path_buf()],
            &[".package", ".ts4script"],
            &["__macosx", ".git"],
        );
        assert_eq!(
            collected.mod_files,
            vec![root.join("Sub/Deeper/b.package"), root.join("a.package")]
        );
        assert_eq!(collected.other_files, vec![root.join("Sub/readme.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_hidden_directories_and_symlinks_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mods");
        let outside = dir.path().join("outside");
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::create_dir_all(&outside).unwrap();
        fs::write(root.join(".hidden/x.package"), b"x").unwrap();
        fs::write(outside.join("y.package"), b"y").unwrap();
        fs::write(root.join("z.package"), b"z").unwrap();
        std::os::unix::fs::symlink(&outside, root.join("linked")).unwrap();
        std::os::unix::fs::symlink(root.join("z.package"), root.join("alias.package")).unwrap();
        fs::hard_link(root.join("z.package"), root.join("z2.package")).unwrap();

        let collected = collect(&[root.clone()], &[".package"], &[] as &[&str]);
        assert_eq!(collected.mod_files.len(), 1);
        assert!(collected.other_files.is_empty());
    }

    #[test]
    fn test_missing_root_and_overlapping_roots() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("inner")).unwrap();
        fs::write(dir.path().join("inner/a.package"), b"a").unwrap();

        let collected = collect(
            &[
                dir.path().join("missing"),
                dir.path().to_path_buf(),
                dir.path().join("inner"),
            ],
            &["package"],
            &[] as &[&str],
        );
        assert_eq!(collected.mod_files, vec![dir.path().join("inner/a.package")]);
    }

    #[test]
    fn test_relative_root_yields_absolute_paths() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.package"), b"a").unwrap();
        let relative = relative_to_cwd(dir.path());
        assert!(relative.is_relative());

        let collected = collect(&[relative], &["package"], &[] as &[&str]);
        assert_eq!(collected.mod_files.len(), 1);
        assert_eq!(
            collected.mod_files,
            vec![dir.path().canonicalize().unwrap().join("a.package")]
        );
    }

    /// `target` spelled relative to the working directory
    fn relative_to_cwd(target: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let mut relative: PathBuf = cwd.components().skip(1).map(|_| "..").collect();
        relative.extend(target.components().skip(1));
        relative
    }
}
