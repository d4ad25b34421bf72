//! File format parsers and builders for DBPF game-asset packages
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::doc_markdown)] // Format-specific terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::use_self)] // Type clarity
//! This crate reads the indexed binary container used by game mods
//! ("packages", signature `DBPF`, major version 2) and provides a symmetric
//! builder for producing them.
//!
//! # Supported Operations
//!
//! - **Index reading**: Header validation and the bitmask-compressed index
//!   table, producing [`ResourceDescriptor`](package::ResourceDescriptor)s
//! - **Key-only reading**: A fast path producing only
//!   [`ResourceKey`](package::ResourceKey)s for cross-package indexing
//! - **Payload extraction**: Seek, read and inflate a single resource
//! - **Integrity classification**: Cheap header-level validity checks
//! - **Building**: Write packages with constant-field index compression,
//!   used by tooling and test fixtures
//!
//! # Design Principles
//!
//! - **Lazy payloads**: Descriptors describe where data lives, never the data
//! - **All-or-nothing parsing**: A malformed index fails, it never yields a
//!   partial key list
//! - **Never panic on input**: Arbitrary bytes produce errors, not panics

#![warn(missing_docs)]

/// DBPF package container: header, index, payloads and integrity checks
///
/// Key features:
/// - **96-byte header**: Little-endian header parsed with binrw
/// - **Bitmask index schema**: Constant key fields stored once per index
/// - **Zlib payloads**: Tag `0x5A42` and `0xFFFF` resources are inflated
/// - **Builder**: Round-trippable writer for fixtures and tooling
///
/// See the [`package`] module for detailed usage examples.
pub mod package;

/// Resource type names and risk categories
pub mod resource_type;

pub use package::{
    IntegrityStatus, PackageBuilder, PackageError, PackageReader, PackageResult,
    ResourceDescriptor, ResourceKey, classify, classify_header, read_index, read_keys,
    read_payload,
};
pub use resource_type::{ResourceCategory, ResourceType};
