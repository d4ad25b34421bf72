//! Package index table parsing
//!
//! The index starts with a 4-byte flags word. Each of the low four bits marks
//! one key field as constant across every entry; constant fields are stored
//! once, right after the flags, in field order:
//!
//! ```text
//! bit 0  type id
//! bit 1  group id
//! bit 2  instance high 32 bits
//! bit 3  instance low 32 bits
//! ```
//!
//! Entries follow with a uniform stride. Each entry holds the non-constant
//! key fields (4 bytes each, in the same order) and then the payload
//! location:
//!
//! ```text
//! offset            u32
//! stored size       u32  (top bit reserved, masked off)
//! uncompressed size u32
//! compression tag   u16
//! ... remaining stride bytes are skipped
//! ```

use super::error::{PackageError, PackageResult};
use super::key::{ResourceDescriptor, ResourceKey};

/// Number of key fields that can be hoisted into the index header
pub const KEY_FIELD_COUNT: usize = 4;

/// Bytes of payload location that follow the key fields in a full entry
pub const DESCRIPTOR_TAIL_SIZE: usize = 14;

/// Reserved bit in the raw stored-size field
pub const SIZE_RESERVED_BIT: u32 = 0x8000_0000;

/// Flag bit marking the type id as constant
pub const FLAG_CONST_TYPE: u32 = 1 << 0;
/// Flag bit marking the group id as constant
pub const FLAG_CONST_GROUP: u32 = 1 << 1;
/// Flag bit marking the instance high half as constant
pub const FLAG_CONST_INSTANCE_HIGH: u32 = 1 << 2;
/// Flag bit marking the instance low half as constant
pub const FLAG_CONST_INSTANCE_LOW: u32 = 1 << 3;

/// Decoding plan for one index table
///
/// Built once per package from the flags word, then applied uniformly to
/// every entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSchema {
    /// Constant value per key field, `None` when stored per entry
    pub const_fields: [Option<u32>; KEY_FIELD_COUNT],
    /// Bytes per entry
    pub entry_stride: usize,
    /// Offset of the first entry within the index region
    pub entries_offset: usize,
    /// Number of entries
    pub entry_count: usize,
}

impl IndexSchema {
    /// Parse the flags word and constant fields from the index region
    pub fn parse(index: &[u8], entry_count: u32) -> PackageResult<Self> {
        if entry_count == 0 {
            return Err(PackageError::malformed("schema requested for empty index"));
        }

        let flags = read_u32(index, 0)?;
        let mut pos = 4;
        let mut const_fields = [None; KEY_FIELD_COUNT];
        for (bit, field) in const_fields.iter_mut().enumerate() {
            if flags & (1 << bit) != 0 {
                *field = Some(read_u32(index, pos)?);
                pos += 4;
            }
        }

        let entry_count = entry_count as usize;
        let entry_stride = (index.len() - pos) / entry_count;
        let schema = Self {
            const_fields,
            entry_stride,
            entries_offset: pos,
            entry_count,
        };

        if entry_stride < schema.key_bytes() {
            return Err(PackageError::malformed(format!(
                "entry stride {entry_stride} smaller than key width {}",
                schema.key_bytes()
            )));
        }

        Ok(schema)
    }

    /// Bytes of per-entry key data
    pub fn key_bytes(&self) -> usize {
        self.const_fields.iter().filter(|f| f.is_none()).count() * 4
    }

    /// Bytes per entry that follow the key fields
    pub fn skip_bytes(&self) -> usize {
        self.entry_stride - self.key_bytes()
    }

    /// Slice of one entry
    fn entry<'a>(&self, index: &'a [u8], n: usize) -> PackageResult<&'a [u8]> {
        let start = self.entries_offset + n * self.entry_stride;
        let end = start + self.entry_stride;
        index.get(start..end).ok_or(PackageError::TruncatedIndex {
            needed: end,
            available: index.len(),
        })
    }

    /// Decode the key of one entry, returning the bytes consumed
    fn decode_key(&self, entry: &[u8]) -> PackageResult<(ResourceKey, usize)> {
        let mut fields = [0u32; KEY_FIELD_COUNT];
        let mut pos = 0;
        for (slot, constant) in fields.iter_mut().zip(self.const_fields) {
            *slot = match constant {
                Some(value) => value,
                None => {
                    let value = read_u32(entry, pos)?;
                    pos += 4;
                    value
                }
            };
        }
        let [type_id, group, high, low] = fields;
        Ok((ResourceKey::from_parts(type_id, group, high, low), pos))
    }

    /// Decode only the keys, skipping payload metadata
    pub fn decode_keys(&self, index: &[u8]) -> PackageResult<Vec<ResourceKey>> {
        let mut keys = Vec::with_capacity(self.entry_count);
        for n in 0..self.entry_count {
            let (key, _) = self.decode_key(self.entry(index, n)?)?;
            keys.push(key);
        }
        Ok(keys)
    }

    /// Decode full descriptors
    pub fn decode_descriptors(&self, index: &[u8]) -> PackageResult<Vec<ResourceDescriptor>> {
        if self.skip_bytes() < DESCRIPTOR_TAIL_SIZE {
            return Err(PackageError::malformed(format!(
                "entry stride {} too small for {} key bytes + {DESCRIPTOR_TAIL_SIZE}",
                self.entry_stride,
                self.key_bytes()
            )));
        }

        let mut descriptors = Vec::with_capacity(self.entry_count);
        for n in 0..self.entry_count {
            let entry = self.entry(index, n)?;
            let (key, pos) = self.decode_key(entry)?;
            let offset = read_u32(entry, pos)?;
            let raw_size = read_u32(entry, pos + 4)?;
            let uncompressed_size = read_u32(entry, pos + 8)?;
            let compression_tag = read_u16(entry, pos + 12)?;

            descriptors.push(ResourceDescriptor {
                key,
                byte_offset: u64::from(offset),
                compressed_size: raw_size & !SIZE_RESERVED_BIT,
                uncompressed_size,
                compression_tag,
            });
        }
        Ok(descriptors)
    }
}

fn read_u32(data: &[u8], pos: usize) -> PackageResult<u32> {
    data.get(pos..pos + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or(PackageError::TruncatedIndex {
            needed: pos + 4,
            available: data.len(),
        })
}

fn read_u16(data: &[u8], pos: usize) -> PackageResult<u16> {
    data.get(pos..pos + 2)
        .and_then(|b| b.try_into().ok())
        .map(u16::from_le_bytes)
        .ok_or(PackageError::TruncatedIndex {
            needed: pos + 2,
            available: data.len(),
        })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn push_entry(out: &mut Vec<u8>, fields: &[u32], offset: u32, size: u32, mem: u32, tag: u16) {
        for f in fields {
            out.extend_from_slice(&f.to_le_bytes());
        }
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&mem.to_le_bytes());
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
    }

    #[test]
    fn test_no_constant_fields() {
        let mut index = 0u32.to_le_bytes().to_vec();
        push_entry(&mut index, &[1, 2, 3, 4], 96, 10, 10, 0);
        push_entry(&mut index, &[5, 6, 7, 8], 106, 0x8000_0020, 64, 0x5A42);

        let schema = IndexSchema::parse(&index, 2).unwrap();
        assert_eq!(schema.key_bytes(), 16);
        assert_eq!(schema.entry_stride, 32);
        assert_eq!(schema.skip_bytes(), 16);

        let descriptors = schema.decode_descriptors(&index).unwrap();
        assert_eq!(descriptors[0].key, ResourceKey::from_parts(1, 2, 3, 4));
        assert_eq!(descriptors[1].key.instance, (7u64 << 32) | 8);
        assert_eq!(descriptors[1].compressed_size, 0x20);
        assert_eq!(descriptors[1].uncompressed_size, 64);
        assert_eq!(descriptors[1].compression_tag, 0x5A42);
    }

    #[test]
    fn test_constant_type_and_group() {
        let mut index = (FLAG_CONST_TYPE | FLAG_CONST_GROUP).to_le_bytes().to_vec();
        index.extend_from_slice(&0x0333_406Cu32.to_le_bytes());
        index.extend_from_slice(&0x0080_0000u32.to_le_bytes());
        push_entry(&mut index, &[0, 11], 96, 5, 5, 0);
        push_entry(&mut index, &[1, 12], 101, 5, 5, 0);

        let schema = IndexSchema::parse(&index, 2).unwrap();
        assert_eq!(schema.const_fields[0], Some(0x0333_406C));
        assert_eq!(schema.const_fields[1], Some(0x0080_0000));
        assert_eq!(schema.key_bytes(), 8);

        let keys = schema.decode_keys(&index).unwrap();
        assert_eq!(keys[0], ResourceKey::new(0x0333_406C, 0x0080_0000, 11));
        assert_eq!(keys[1], ResourceKey::new(0x0333_406C, 0x0080_0000, (1u64 << 32) | 12));
    }

    #[test]
    fn test_short_stride_keys_ok_descriptors_fail() {
        // Entries carry only key fields
        let mut index = 0u32.to_le_bytes().to_vec();
        for f in [9u32, 8, 7, 6] {
            index.extend_from_slice(&f.to_le_bytes());
        }
        let schema = IndexSchema::parse(&index, 1).unwrap();
        assert_eq!(schema.decode_keys(&index).unwrap().len(), 1);
        assert!(matches!(
            schema.decode_descriptors(&index),
            Err(PackageError::MalformedIndex { .. })
        ));
    }

    #[test]
    fn test_stride_smaller_than_key_is_malformed() {
        let mut index = 0u32.to_le_bytes().to_vec();
        index.extend_from_slice(&[0u8; 20]);
        // 20 bytes over 2 entries = 10-byte stride, keys need 16
        let err = IndexSchema::parse(&index, 2).unwrap_err();
        assert!(matches!(err, PackageError::MalformedIndex { .. }));
    }

    #[test]
    fn test_truncated_constant_fields() {
        let mut index = (FLAG_CONST_TYPE | FLAG_CONST_INSTANCE_LOW).to_le_bytes().to_vec();
        index.extend_from_slice(&[1, 2]);
        let err = IndexSchema::parse(&index, 1).unwrap_err();
        assert!(matches!(err, PackageError::TruncatedIndex { .. }));
    }
}
