//! Resource keys and index descriptors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one logical resource across all packages
///
/// Two packages containing the same `(type, group, instance)` triple carry
/// "the same resource" and will shadow each other when loaded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource type id
    pub type_id: u32,
    /// Group id
    pub group: u32,
    /// 64-bit instance id
    pub instance: u64,
}

impl ResourceKey {
    /// Create a new key
    pub const fn new(type_id: u32, group: u32, instance: u64) -> Self {
        Self {
            type_id,
            group,
            instance,
        }
    }

    /// Rebuild a key from the split instance halves stored in the index
    pub const fn from_parts(
        type_id: u32,
        group: u32,
        instance_high: u32,
        instance_low: u32,
    ) -> Self {
        Self {
            type_id,
            group,
            instance: ((instance_high as u64) << 32) | instance_low as u64,
        }
    }

    /// Upper 32 bits of the instance id
    pub const fn instance_high(&self) -> u32 {
        (self.instance >> 32) as u32
    }

    /// Lower 32 bits of the instance id
    pub const fn instance_low(&self) -> u32 {
        self.instance as u32
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}:{:08X}:{:016X}",
            self.type_id, self.group, self.instance
        )
    }
}

/// Where a resource's payload lives inside its package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource identity
    pub key: ResourceKey,
    /// Absolute offset of the payload within the package
    pub byte_offset: u64,
    /// Stored size, with the reserved top bit already masked off
    pub compressed_size: u32,
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Compression tag (`0x0000` raw, `0x5A42` zlib, `0xFFFF` internal)
    pub compression_tag: u16,
}

impl ResourceDescriptor {
    /// Number of bytes to read for the stored payload
    pub fn stored_len(&self) -> u32 {
        if self.compressed_size == 0 {
            self.uncompressed_size
        } else {
            self.compressed_size
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_reconstruction() {
        let key = ResourceKey::from_parts(0x0333_406C, 0, 0xDEAD_BEEF, 0x0123_4567);
        assert_eq!(key.instance, 0xDEAD_BEEF_0123_4567);
        assert_eq!(key.instance_high(), 0xDEAD_BEEF);
        assert_eq!(key.instance_low(), 0x0123_4567);
    }

    #[test]
    fn test_display() {
        let key = ResourceKey::new(0x545A_C67A, 0x0080_0000, 42);
        assert_eq!(key.to_string(), "545AC67A:00800000:000000000000002A");
    }

    #[test]
    fn test_ordering_is_type_major() {
        let mut keys = vec![
            ResourceKey::new(2, 0, 0),
            ResourceKey::new(1, 5, 9),
            ResourceKey::new(1, 5, 1),
        ];
        keys.sort();
        assert_eq!(keys[0], ResourceKey::new(1, 5, 1));
        assert_eq!(keys[2], ResourceKey::new(2, 0, 0));
    }

    #[test]
    fn test_stored_len_falls_back_to_uncompressed() {
        let mut descriptor = ResourceDescriptor {
            key: ResourceKey::new(1, 2, 3),
            byte_offset: 96,
            compressed_size: 0,
            uncompressed_size: 128,
            compression_tag: 0,
        };
        assert_eq!(descriptor.stored_len(), 128);
        descriptor.compressed_size = 40;
        assert_eq!(descriptor.stored_len(), 40);
    }
}
