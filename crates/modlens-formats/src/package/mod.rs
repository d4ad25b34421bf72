//! DBPF package container
//!
//! A package is a single file holding many typed, optionally compressed
//! resources plus an index describing where each one lives.
//!
//! ```text
//! Package File:
//! ├── Header (96 bytes, little-endian, magic "DBPF", major version 2)
//! ├── Payloads (raw or zlib-compressed resource data)
//! └── Index
//!     ├── Flags (4 bytes, one bit per constant key field)
//!     ├── Constant key fields (4 bytes each)
//!     └── Entries (uniform stride: key fields + payload location)
//! ```
//!
//! # Usage Examples
//!
//! ## Read an Index
//!
//! ```rust,no_run
//! use modlens_formats::package;
//!
//! let descriptors = package::read_index("Mods/example.package")?;
//! for descriptor in &descriptors {
//!     println!("{} at {}", descriptor.key, descriptor.byte_offset);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Build and Read Back
//!
//! ```rust
//! use modlens_formats::package::{PackageBuilder, PackageReader, ResourceKey};
//! use std::io::Cursor;
//!
//! let mut builder = PackageBuilder::new();
//! builder.add_compressed_resource(ResourceKey::new(0x0333_406C, 0, 7), b"<I n=\"x\"/>")?;
//! let bytes = builder.build()?;
//!
//! let mut reader = PackageReader::new(Cursor::new(bytes))?;
//! let descriptors = reader.descriptors()?;
//! let payload = reader.read_payload(&descriptors[0]);
//! assert_eq!(payload.as_deref(), Some(&b"<I n=\"x\"/>"[..]));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod error;
mod extract;
mod header;
mod index;
mod integrity;
mod key;

pub use builder::PackageBuilder;
pub use error::{PackageError, PackageResult};
pub use extract::{
    COMPRESSION_INTERNAL, COMPRESSION_NONE, COMPRESSION_ZLIB, MAX_DECOMPRESSED_SIZE,
    decode_payload, inflate,
};
pub use header::{
    HEADER_SIZE, MAX_ENTRY_COUNT, PACKAGE_MAGIC, PackageHeader, SUPPORTED_MAJOR_VERSION,
};
pub use index::{
    DESCRIPTOR_TAIL_SIZE, FLAG_CONST_GROUP, FLAG_CONST_INSTANCE_HIGH, FLAG_CONST_INSTANCE_LOW,
    FLAG_CONST_TYPE, IndexSchema, SIZE_RESERVED_BIT,
};
pub use integrity::{IntegrityStatus, classify, classify_header};
pub use key::{ResourceDescriptor, ResourceKey};

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Reader over one package
///
/// The header is validated on construction; the index is only read when
/// keys or descriptors are requested.
pub struct PackageReader<R> {
    inner: R,
    header: PackageHeader,
    len: u64,
}

impl PackageReader<BufReader<File>> {
    /// Open a package on disk
    pub fn open<P: AsRef<Path>>(path: P) -> PackageResult<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> PackageReader<R> {
    /// Validate the header of `inner`
    pub fn new(mut inner: R) -> PackageResult<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        if len == 0 {
            return Err(PackageError::Empty);
        }
        if len < HEADER_SIZE as u64 {
            return Err(PackageError::TooSmall {
                size: len,
                minimum: HEADER_SIZE as u64,
            });
        }
        inner.seek(SeekFrom::Start(0))?;
        let header = PackageHeader::read_validated(&mut inner)?;
        Ok(Self { inner, header, len })
    }

    /// Parsed header
    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Load the raw index region; `None` when the package holds no resources
    fn index_bytes(&mut self) -> PackageResult<Option<Vec<u8>>> {
        if self.header.is_empty_index() {
            return Ok(None);
        }
        if self.header.entry_count > MAX_ENTRY_COUNT {
            return Err(PackageError::TooManyEntries {
                count: self.header.entry_count,
                limit: MAX_ENTRY_COUNT,
            });
        }

        let offset = self.header.effective_index_offset();
        let size = u64::from(self.header.index_size);
        if offset < HEADER_SIZE as u64 {
            return Err(PackageError::malformed(format!(
                "index offset {offset} overlaps the header"
            )));
        }
        let end = offset.saturating_add(size);
        if end > self.len {
            return Err(PackageError::TruncatedIndex {
                needed: usize::try_from(end).unwrap_or(usize::MAX),
                available: usize::try_from(self.len).unwrap_or(usize::MAX),
            });
        }

        self.inner.seek(SeekFrom::Start(offset))?;
        let mut index = vec![0u8; self.header.index_size as usize];
        self.inner.read_exact(&mut index)?;
        Ok(Some(index))
    }

    /// Read every resource key, skipping payload metadata
    pub fn keys(&mut self) -> PackageResult<Vec<ResourceKey>> {
        let Some(index) = self.index_bytes()? else {
            return Ok(Vec::new());
        };
        IndexSchema::parse(&index, self.header.entry_count)?.decode_keys(&index)
    }

    /// Read every resource descriptor
    pub fn descriptors(&mut self) -> PackageResult<Vec<ResourceDescriptor>> {
        let Some(index) = self.index_bytes()? else {
            return Ok(Vec::new());
        };
        IndexSchema::parse(&index, self.header.entry_count)?.decode_descriptors(&index)
    }

    /// Read and decode one payload; `None` on any I/O or decode failure
    pub fn read_payload(&mut self, descriptor: &ResourceDescriptor) -> Option<Vec<u8>> {
        let len = descriptor.stored_len() as usize;
        if descriptor.byte_offset.saturating_add(len as u64) > self.len {
            tracing::debug!(
                "payload {} extends past end of package ({} + {len} > {})",
                descriptor.key,
                descriptor.byte_offset,
                self.len
            );
            return None;
        }

        let mut raw = vec![0u8; len];
        let read = self
            .inner
            .seek(SeekFrom::Start(descriptor.byte_offset))
            .and_then(|_| self.inner.read_exact(&mut raw));
        if let Err(e) = read {
            tracing::debug!("failed to read payload {}: {e}", descriptor.key);
            return None;
        }

        decode_payload(raw, descriptor.compression_tag)
    }
}

/// Read the full descriptor list of a package on disk
pub fn read_index<P: AsRef<Path>>(path: P) -> PackageResult<Vec<ResourceDescriptor>> {
    PackageReader::open(path)?.descriptors()
}

/// Read only the resource keys of a package on disk
pub fn read_keys<P: AsRef<Path>>(path: P) -> PackageResult<Vec<ResourceKey>> {
    PackageReader::open(path)?.keys()
}

/// Read and decode one payload from a package on disk
pub fn read_payload<P: AsRef<Path>>(path: P, descriptor: &ResourceDescriptor) -> Option<Vec<u8>> {
    let path = path.as_ref();
    match PackageReader::open(path) {
        Ok(mut reader) => reader.read_payload(descriptor),
        Err(e) => {
            tracing::debug!("cannot open {}: {e}", path.display());
            None
        }
    }
}
