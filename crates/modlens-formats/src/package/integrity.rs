//! Header-level integrity classification

use super::header::{HEADER_SIZE, PACKAGE_MAGIC, SUPPORTED_MAJOR_VERSION};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Validity of a package as judged from its size and header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityStatus {
    /// Header is valid
    Ok,
    /// Zero-byte file
    Empty,
    /// Shorter than the fixed header
    TooSmall,
    /// Signature mismatch
    BadMagic,
    /// Major version other than 2
    WrongVersion,
    /// Could not be opened or read
    Unreadable,
}

impl IntegrityStatus {
    /// Whether the package can be indexed
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short human-readable description
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Ok => "valid package",
            Self::Empty => "file is empty",
            Self::TooSmall => "file is smaller than a package header",
            Self::BadMagic => "not a package (bad signature)",
            Self::WrongVersion => "unsupported package version",
            Self::Unreadable => "file could not be read",
        }
    }
}

/// Classify header bytes of a file whose total size is `file_size`
///
/// Size checks precede content checks.
pub fn classify_header(header: &[u8], file_size: u64) -> IntegrityStatus {
    if file_size == 0 {
        return IntegrityStatus::Empty;
    }
    if file_size < HEADER_SIZE as u64 || header.len() < 8 {
        return IntegrityStatus::TooSmall;
    }
    if header[0..4] != PACKAGE_MAGIC {
        return IntegrityStatus::BadMagic;
    }
    let major = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if major != SUPPORTED_MAJOR_VERSION {
        return IntegrityStatus::WrongVersion;
    }
    IntegrityStatus::Ok
}

/// Classify a package on disk
pub fn classify<P: AsRef<Path>>(path: P) -> IntegrityStatus {
    let path = path.as_ref();
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::debug!("cannot stat {}: {e}", path.display());
            return IntegrityStatus::Unreadable;
        }
    };
    if size < HEADER_SIZE as u64 {
        return classify_header(&[], size);
    }

    let mut header = [0u8; 8];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => classify_header(&header, size),
        Err(e) => {
            tracing::debug!("cannot read header of {}: {e}", path.display());
            IntegrityStatus::Unreadable
        }
    }
}
