//! Package header structure and validation
//!
//! The header is a fixed 96-byte little-endian structure:
//!
//! ```text
//! 0x00  magic "DBPF"          0x24  index entry count
//! 0x04  major version (2)     0x28  index offset (legacy, 32-bit)
//! 0x08  minor version         0x2C  index size in bytes
//! 0x0C  user major version    0x30  hole count
//! 0x10  user minor version    0x34  hole offset
//! 0x14  flags                 0x38  hole size
//! 0x18  created timestamp     0x3C  index minor version
//! 0x1C  modified timestamp    0x40  index offset (64-bit)
//! 0x20  index major version   0x48  reserved (24 bytes)
//! ```

use super::error::{PackageError, PackageResult};
use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek};

/// Package signature
pub const PACKAGE_MAGIC: [u8; 4] = *b"DBPF";

/// Only supported major version
pub const SUPPORTED_MAJOR_VERSION: u32 = 2;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 96;

/// Sanity ceiling on the declared entry count
pub const MAX_ENTRY_COUNT: u32 = 500_000;

/// Package header (96 bytes, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[br(little)]
#[bw(little)]
pub struct PackageHeader {
    /// Signature, must equal [`PACKAGE_MAGIC`]
    pub magic: [u8; 4],
    /// Major format version
    pub major_version: u32,
    /// Minor format version
    pub minor_version: u32,
    /// Producer-defined major version
    pub user_major_version: u32,
    /// Producer-defined minor version
    pub user_minor_version: u32,
    /// Header flags (unused by readers)
    pub flags: u32,
    /// Creation timestamp (usually zero)
    pub created: u32,
    /// Modification timestamp (usually zero)
    pub modified: u32,
    /// Index major version (legacy)
    pub index_major_version: u32,
    /// Number of index entries
    pub entry_count: u32,
    /// 32-bit index offset used by older producers
    pub index_offset_short: u32,
    /// Size of the index region in bytes
    pub index_size: u32,
    /// Number of free-space holes
    pub hole_count: u32,
    /// Offset of the hole table
    pub hole_offset: u32,
    /// Size of the hole table
    pub hole_size: u32,
    /// Index minor version (3 for current producers)
    pub index_minor_version: u32,
    /// 64-bit index offset
    pub index_offset: u64,
    /// Reserved padding up to 96 bytes
    pub reserved: [u8; 24],
}

impl PackageHeader {
    /// Create a version 2.1 header describing an index
    pub fn new(entry_count: u32, index_offset: u64, index_size: u32) -> Self {
        Self {
            magic: PACKAGE_MAGIC,
            major_version: SUPPORTED_MAJOR_VERSION,
            minor_version: 1,
            user_major_version: 0,
            user_minor_version: 0,
            flags: 0,
            created: 0,
            modified: 0,
            index_major_version: 0,
            entry_count,
            index_offset_short: 0,
            index_size,
            hole_count: 0,
            hole_offset: 0,
            hole_size: 0,
            index_minor_version: 3,
            index_offset,
            reserved: [0; 24],
        }
    }

    /// Read the raw header without validating it
    pub fn read_raw<R: Read + Seek>(reader: &mut R) -> PackageResult<Self> {
        Ok(Self::read(reader)?)
    }

    /// Read and validate the header
    pub fn read_validated<R: Read + Seek>(reader: &mut R) -> PackageResult<Self> {
        let header = Self::read_raw(reader)?;
        header.validate()?;
        Ok(header)
    }

    /// Check signature and major version
    pub fn validate(&self) -> PackageResult<()> {
        if self.magic != PACKAGE_MAGIC {
            return Err(PackageError::BadMagic {
                expected: PACKAGE_MAGIC,
                actual: self.magic,
            });
        }

        if self.major_version != SUPPORTED_MAJOR_VERSION {
            return Err(PackageError::WrongVersion(self.major_version));
        }

        Ok(())
    }

    /// Effective index offset, falling back to the legacy 32-bit field
    pub fn effective_index_offset(&self) -> u64 {
        if self.index_offset == 0 {
            u64::from(self.index_offset_short)
        } else {
            self.index_offset
        }
    }

    /// Whether the header declares an index with no resources
    pub fn is_empty_index(&self) -> bool {
        self.entry_count == 0 || self.index_size < 4
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header_bytes(header: &PackageHeader) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        header.write(&mut cursor).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn test_header_is_96_bytes() {
        let bytes = header_bytes(&PackageHeader::new(3, 96, 64));
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[0..4], b"DBPF");
        assert_eq!(u32::from_le_bytes(bytes[36..40].try_into().unwrap()), 3);
        assert_eq!(u32::from_le_bytes(bytes[44..48].try_into().unwrap()), 64);
        assert_eq!(u64::from_le_bytes(bytes[64..72].try_into().unwrap()), 96);
    }

    #[test]
    fn test_header_round_trip() {
        let header = PackageHeader::new(12, 4096, 300);
        let bytes = header_bytes(&header);
        let parsed = PackageHeader::read_validated(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut header = PackageHeader::new(0, 0, 0);
        header.magic = *b"DBPP";
        let bytes = header_bytes(&header);
        let err = PackageHeader::read_validated(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, PackageError::BadMagic { .. }));
    }

    #[test]
    fn test_wrong_version_rejected() {
        let mut header = PackageHeader::new(0, 0, 0);
        header.major_version = 1;
        let bytes = header_bytes(&header);
        let err = PackageHeader::read_validated(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, PackageError::WrongVersion(1)));
    }

    #[test]
    fn test_legacy_index_offset_fallback() {
        let mut header = PackageHeader::new(1, 0, 20);
        header.index_offset_short = 200;
        assert_eq!(header.effective_index_offset(), 200);

        header.index_offset = 512;
        assert_eq!(header.effective_index_offset(), 512);
    }

    #[test]
    fn test_short_input_is_error() {
        let err = PackageHeader::read_raw(&mut Cursor::new(vec![0u8; 40])).unwrap_err();
        assert!(err.is_format_error());
    }
}
