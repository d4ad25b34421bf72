//! Resource type ids, display names and risk categories
//!
//! Only types that matter for conflict triage are listed; anything else is
//! displayed as its hex id and treated as [`ResourceCategory::Other`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// How risky a collision on a resource type is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceCategory {
    /// Gameplay tuning; collisions change game behaviour
    Tuning,
    /// Sim data and sim info records
    SimData,
    /// Thumbnails, textures, meshes and bone deltas
    Visual,
    /// Everything else
    Other,
}

/// A known resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceType {
    /// Numeric type id
    pub id: u32,
    /// Display name
    pub name: &'static str,
    /// Risk category
    pub category: ResourceCategory,
}

macro_rules! resource_types {
    ($($id:literal => $name:literal, $category:ident;)*) => {
        /// Table of known resource types, sorted by id
        pub const KNOWN_TYPES: &[ResourceType] = &[
            $(ResourceType { id: $id, name: $name, category: ResourceCategory::$category },)*
        ];
    };
}

resource_types! {
    0x00B2D882 => "DDS Image", Visual;
    0x015A1849 => "Geometry", Visual;
    0x01661233 => "Model", Visual;
    0x01D10F34 => "Model LOD", Visual;
    0x025ED6F4 => "Sim Info", SimData;
    0x0333406C => "XML Tuning", Tuning;
    0x034AEECB => "CAS Part", Other;
    0x0355E0A6 => "Bone Delta", Visual;
    0x03B33DDF => "Instance Tuning", Tuning;
    0x0C772E27 => "Loot Tuning", Tuning;
    0x220557DA => "String Table", Other;
    0x2F7D0004 => "PNG Image", Visual;
    0x319E4F1D => "Object Catalog", Other;
    0x3453CF95 => "RLE2 Image", Visual;
    0x3C1AF1F2 => "CAS Part Thumbnail", Visual;
    0x3C2A8647 => "Buy/Build Thumbnail", Visual;
    0x545AC67A => "SimData", SimData;
    0x5B282D45 => "Body Part Thumbnail", Visual;
    0x6017E896 => "Buff Tuning", Tuning;
    0x62E94D38 => "Combined Tuning", Tuning;
    0xBA856C78 => "RLES Image", Visual;
    0xC0DB5AE7 => "Object Definition", Other;
    0xCB5FDDC7 => "Trait Tuning", Tuning;
    0xE882D22F => "Interaction Tuning", Tuning;
}

impl ResourceType {
    /// Look up a known type
    pub fn lookup(id: u32) -> Option<&'static ResourceType> {
        KNOWN_TYPES
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &KNOWN_TYPES[i])
    }

    /// Category of any type id
    pub fn category_of(id: u32) -> ResourceCategory {
        Self::lookup(id).map_or(ResourceCategory::Other, |t| t.category)
    }

    /// Display name of any type id
    pub fn name_of(id: u32) -> String {
        Self::lookup(id).map_or_else(|| format!("0x{id:08X}"), |t| t.name.to_string())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_sorted() {
        assert!(KNOWN_TYPES.windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(ResourceType::category_of(0x0333_406C), ResourceCategory::Tuning);
        assert_eq!(ResourceType::category_of(0x545A_C67A), ResourceCategory::SimData);
        assert_eq!(ResourceType::category_of(0x00B2_D882), ResourceCategory::Visual);
        assert_eq!(ResourceType::category_of(0x1234_5678), ResourceCategory::Other);
        assert_eq!(ResourceType::name_of(0x220557DA), "String Table");
        assert_eq!(ResourceType::name_of(0x1234_5678), "0x12345678");
    }
}
