//! A package on disk with lazily computed integrity and index

use modlens_formats::{IntegrityStatus, PackageReader, ResourceDescriptor, ResourceKey, classify};
use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Extension identifying package files
pub const PACKAGE_EXTENSION: &str = "package";

/// Whether `path` names a package (case-insensitive `.package`)
pub fn is_package_path(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
}

/// A package file whose header and index are read at most once
#[derive(Debug)]
pub struct PackageFile {
    path: PathBuf,
    integrity: OnceLock<IntegrityStatus>,
    descriptors: OnceLock<Option<Vec<ResourceDescriptor>>>,
}

impl PackageFile {
    /// Wrap a path without touching the disk
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            integrity: OnceLock::new(),
            descriptors: OnceLock::new(),
        }
    }

    /// Path on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header classification, computed on first use
    pub fn integrity(&self) -> IntegrityStatus {
        *self.integrity.get_or_init(|| classify(&self.path))
    }

    /// Full index, or `None` when the package cannot be parsed
    pub fn descriptors(&self) -> Option<&[ResourceDescriptor]> {
        self.descriptors
            .get_or_init(|| {
                if !self.integrity().is_ok() {
                    return None;
                }
                match modlens_formats::read_index(&self.path) {
                    Ok(descriptors) => Some(descriptors),
                    Err(e) => {
                        debug!("Failed to read index of {}: {e}", self.path.display());
                        None
                    }
                }
            })
            .as_deref()
    }

    /// Visit decoded payloads of the `wanted` resources in index order
    ///
    /// Payloads that fail to read or decode are skipped. The visitor can stop
    /// early by returning [`ControlFlow::Break`].
    pub fn visit_payloads<F>(&self, wanted: &BTreeSet<ResourceKey>, mut visit: F)
    where
        F: FnMut(&ResourceKey, &[u8]) -> ControlFlow<()>,
    {
        let Some(descriptors) = self.descriptors() else {
            return;
        };
        let mut reader = match PackageReader::open(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                debug!("Failed to reopen {}: {e}", self.path.display());
                return;
            }
        };

        let mut seen = BTreeSet::new();
        for descriptor in descriptors {
            if !wanted.contains(&descriptor.key) || !seen.insert(descriptor.key) {
                continue;
            }
            if let Some(payload) = reader.read_payload(descriptor)
                && visit(&descriptor.key, &payload).is_break()
            {
                return;
            }
        }
    }
}
