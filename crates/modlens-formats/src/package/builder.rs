//! Package builder
//!
//! Writes `header | payloads | index`. Key fields shared by every entry are
//! hoisted into the index header, mirroring what game tools produce.

use super::error::{PackageError, PackageResult};
use super::extract::{COMPRESSION_NONE, COMPRESSION_ZLIB};
use super::header::{HEADER_SIZE, PackageHeader};
use super::index::{KEY_FIELD_COUNT, SIZE_RESERVED_BIT};
use super::key::ResourceKey;
use binrw::BinWrite;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::{Cursor, Write};
use std::path::Path;

/// Resource queued for writing
#[derive(Debug, Clone)]
struct PendingResource {
    key: ResourceKey,
    stored: Vec<u8>,
    uncompressed_size: u32,
    compression_tag: u16,
}

/// Builder for package files
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    resources: Vec<PendingResource>,
    hoist_constant_fields: bool,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            resources: Vec::new(),
            hoist_constant_fields: true,
        }
    }

    /// Enable or disable hoisting of constant key fields into the index header
    pub fn with_constant_fields(mut self, enable: bool) -> Self {
        self.hoist_constant_fields = enable;
        self
    }

    /// Number of queued resources
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources are queued
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add an uncompressed resource
    pub fn add_resource(&mut self, key: ResourceKey, data: impl Into<Vec<u8>>) -> &mut Self {
        let stored = data.into();
        self.resources.push(PendingResource {
            key,
            uncompressed_size: stored.len() as u32,
            stored,
            compression_tag: COMPRESSION_NONE,
        });
        self
    }

    /// Add a resource stored zlib-compressed
    pub fn add_compressed_resource(
        &mut self,
        key: ResourceKey,
        data: &[u8],
    ) -> PackageResult<&mut Self> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data)?;
        let stored = encoder.finish()?;
        self.resources.push(PendingResource {
            key,
            stored,
            uncompressed_size: data.len() as u32,
            compression_tag: COMPRESSION_ZLIB,
        });
        Ok(self)
    }

    /// Add a resource with pre-encoded bytes and an explicit tag
    pub fn add_raw_resource(
        &mut self,
        key: ResourceKey,
        stored: Vec<u8>,
        uncompressed_size: u32,
        compression_tag: u16,
    ) -> &mut Self {
        self.resources.push(PendingResource {
            key,
            stored,
            uncompressed_size,
            compression_tag,
        });
        self
    }

    /// Which key fields are shared by every resource
    fn constant_fields(&self) -> [Option<u32>; KEY_FIELD_COUNT] {
        let mut constant = [None; KEY_FIELD_COUNT];
        let Some(first) = self.resources.first() else {
            return constant;
        };
        if !self.hoist_constant_fields {
            return constant;
        }

        let first = key_fields(&first.key);
        for (i, slot) in constant.iter_mut().enumerate() {
            if self
                .resources
                .iter()
                .all(|r| key_fields(&r.key)[i] == first[i])
            {
                *slot = Some(first[i]);
            }
        }
        constant
    }

    /// Serialise the package
    pub fn build(&self) -> PackageResult<Vec<u8>> {
        let mut payloads = Vec::new();
        let mut offsets = Vec::with_capacity(self.resources.len());
        for resource in &self.resources {
            let offset = HEADER_SIZE + payloads.len();
            offsets.push(u32::try_from(offset).map_err(|_| {
                PackageError::Build(format!("payload offset {offset} exceeds 32 bits"))
            })?);
            payloads.extend_from_slice(&resource.stored);
        }

        let constant = self.constant_fields();
        let mut index = Vec::new();
        if !self.resources.is_empty() {
            let flags = constant
                .iter()
                .enumerate()
                .filter(|(_, c)| c.is_some())
                .fold(0u32, |acc, (bit, _)| acc | (1 << bit));
            index.extend_from_slice(&flags.to_le_bytes());
            for value in constant.iter().flatten() {
                index.extend_from_slice(&value.to_le_bytes());
            }

            for (resource, offset) in self.resources.iter().zip(&offsets) {
                for (value, c) in key_fields(&resource.key).iter().zip(&constant) {
                    if c.is_none() {
                        index.extend_from_slice(&value.to_le_bytes());
                    }
                }
                let stored_len = u32::try_from(resource.stored.len()).map_err(|_| {
                    PackageError::Build("payload larger than 2 GiB".to_string())
                })?;
                if stored_len & SIZE_RESERVED_BIT != 0 {
                    return Err(PackageError::Build("payload larger than 2 GiB".to_string()));
                }
                index.extend_from_slice(&offset.to_le_bytes());
                index.extend_from_slice(&(stored_len | SIZE_RESERVED_BIT).to_le_bytes());
                index.extend_from_slice(&resource.uncompressed_size.to_le_bytes());
                index.extend_from_slice(&resource.compression_tag.to_le_bytes());
                // Committed flag
                index.extend_from_slice(&1u16.to_le_bytes());
            }
        }

        let index_offset = (HEADER_SIZE + payloads.len()) as u64;
        let header = PackageHeader::new(
            self.resources.len() as u32,
            if index.is_empty() { 0 } else { index_offset },
            index.len() as u32,
        );

        let mut cursor = Cursor::new(Vec::with_capacity(
            HEADER_SIZE + payloads.len() + index.len(),
        ));
        header.write(&mut cursor).map_err(PackageError::from)?;
        let mut out = cursor.into_inner();
        out.extend_from_slice(&payloads);
        out.extend_from_slice(&index);
        Ok(out)
    }

    /// Serialise the package to a file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> PackageResult<()> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }
}

fn key_fields(key: &ResourceKey) -> [u32; KEY_FIELD_COUNT] {
    [key.type_id, key.group, key.instance_high(), key.instance_low()]
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::package::PackageReader;

    #[test]
    fn test_empty_package() {
        let bytes = PackageBuilder::new().build().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);

        let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.descriptors().unwrap().is_empty());
    }

    #[test]
    fn test_constant_fields_hoisted() {
        let mut builder = PackageBuilder::new();
        builder
            .add_resource(ResourceKey::new(0x0333_406C, 0, 1), b"one".to_vec())
            .add_resource(ResourceKey::new(0x0333_406C, 0, 2), b"two".to_vec());
        let constant = builder.constant_fields();
        assert_eq!(constant[0], Some(0x0333_406C));
        assert_eq!(constant[1], Some(0));
        assert_eq!(constant[2], Some(0));
        assert_eq!(constant[3], None);

        let bytes = builder.build().unwrap();
        let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
        let keys = reader.keys().unwrap();
        assert_eq!(
            keys,
            vec![
                ResourceKey::new(0x0333_406C, 0, 1),
                ResourceKey::new(0x0333_406C, 0, 2)
            ]
        );
    }

    #[test]
    fn test_reserved_bit_is_masked_on_read() {
        let mut builder = PackageBuilder::new().with_constant_fields(false);
        builder.add_resource(ResourceKey::new(1, 2, 3), vec![0xAB; 33]);
        let bytes = builder.build().unwrap();

        let mut reader = PackageReader::new(Cursor::new(bytes)).unwrap();
        let descriptors = reader.descriptors().unwrap();
        assert_eq!(descriptors[0].compressed_size, 33);
        assert_eq!(descriptors[0].byte_offset, HEADER_SIZE as u64);
    }
}
