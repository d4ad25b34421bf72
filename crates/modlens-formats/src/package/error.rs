//! Error types for package operations

use super::integrity::IntegrityStatus;
use thiserror::Error;

/// Package operation result type
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors raised while reading or building packages
#[derive(Debug, Error)]
pub enum PackageError {
    /// File contains no bytes at all
    #[error("Package is empty")]
    Empty,

    /// File is shorter than the fixed header
    #[error("Package too small: {size} bytes (header needs {minimum})")]
    TooSmall {
        /// Actual file size
        size: u64,
        /// Minimum acceptable size
        minimum: u64,
    },

    /// Header signature mismatch
    #[error("Invalid package magic: expected {expected:02x?}, got {actual:02x?}")]
    BadMagic {
        /// Expected signature bytes
        expected: [u8; 4],
        /// Signature bytes found
        actual: [u8; 4],
    },

    /// Unsupported major version
    #[error("Unsupported package major version: {0} (expected 2)")]
    WrongVersion(u32),

    /// Declared entry count exceeds the sanity ceiling
    #[error("Entry count {count} exceeds limit of {limit}")]
    TooManyEntries {
        /// Declared entry count
        count: u32,
        /// Sanity ceiling
        limit: u32,
    },

    /// Index region ends before the declared data
    #[error("Truncated index: need {needed} bytes, got {available} bytes")]
    TruncatedIndex {
        /// Bytes needed
        needed: usize,
        /// Bytes available
        available: usize,
    },

    /// Index structure is inconsistent
    #[error("Malformed index: {reason}")]
    MalformedIndex {
        /// Description of the inconsistency
        reason: String,
    },

    /// Builder received data it cannot encode
    #[error("Cannot build package: {0}")]
    Build(String),

    /// Binary read/write error
    #[error("Binary format error: {0}")]
    BinRead(binrw::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    /// Create a malformed index error with a reason
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::MalformedIndex {
            reason: reason.into(),
        }
    }

    /// The file is not a container of the expected kind
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::BadMagic { .. }
                | Self::WrongVersion(_)
                | Self::TruncatedIndex { .. }
                | Self::MalformedIndex { .. }
                | Self::TooManyEntries { .. }
                | Self::BinRead(_)
        )
    }

    /// The file is too short to be any container
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Empty | Self::TooSmall { .. })
    }

    /// Permission or read failure, possibly transient
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Map the error onto the status reported for a scanned file
    pub fn integrity_status(&self) -> IntegrityStatus {
        match self {
            Self::Empty => IntegrityStatus::Empty,
            Self::TooSmall { .. } => IntegrityStatus::TooSmall,
            Self::BadMagic { .. } => IntegrityStatus::BadMagic,
            Self::WrongVersion(_) => IntegrityStatus::WrongVersion,
            Self::Io(_) | Self::BinRead(_) => IntegrityStatus::Unreadable,
            // Header was fine; the index is what failed
            Self::TooManyEntries { .. }
            | Self::TruncatedIndex { .. }
            | Self::MalformedIndex { .. }
            | Self::Build(_) => IntegrityStatus::Ok,
        }
    }
}

impl From<binrw::Error> for PackageError {
    fn from(error: binrw::Error) -> Self {
        if error.is_eof() {
            return Self::malformed(format!("unexpected end of data: {error}"));
        }
        match error {
            binrw::Error::Io(io) => Self::Io(io),
            other => Self::BinRead(other),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let format_errors = vec![
            PackageError::BadMagic {
                expected: *b"DBPF",
                actual: *b"PK\x03\x04",
            },
            PackageError::WrongVersion(1),
            PackageError::malformed("stride"),
            PackageError::TruncatedIndex {
                needed: 40,
                available: 10,
            },
        ];
        for error in &format_errors {
            assert!(error.is_format_error(), "{error:?} should be a format error");
            assert!(!error.is_corruption());
        }

        assert!(PackageError::Empty.is_corruption());
        assert!(
            PackageError::TooSmall {
                size: 10,
                minimum: 96
            }
            .is_corruption()
        );
        assert!(PackageError::Io(std::io::Error::other("denied")).is_io());
    }

    #[test]
    fn test_integrity_mapping() {
        assert_eq!(
            PackageError::WrongVersion(3).integrity_status(),
            IntegrityStatus::WrongVersion
        );
        assert_eq!(
            PackageError::Io(std::io::Error::other("denied")).integrity_status(),
            IntegrityStatus::Unreadable
        );
        assert_eq!(
            PackageError::malformed("bad").integrity_status(),
            IntegrityStatus::Ok
        );
    }

    #[test]
    fn test_error_display() {
        let error = PackageError::TooManyEntries {
            count: 9_000_000,
            limit: 500_000,
        };
        let message = error.to_string();
        assert!(message.contains("9000000"));
        assert!(message.contains("500000"));
    }
}
