//! Pack storage reading: index lookup, entry decoding, delta resolution.
//!
//! Packs aggregate many objects into one file, storing some of them as
//! deltas against others. A companion index file maps fingerprints to byte
//! offsets inside the pack. This crate reads both index formats (v1 and
//! v2), decompresses entries, and reassembles delta chains.

pub mod delta;
pub mod entry;
pub mod index;
mod lock;
pub mod pack;

use std::path::PathBuf;

use gitro_hash::ObjectId;
use gitro_object::ObjectType;

/// Errors that can occur while reading packs and their indexes.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack index: {0}")]
    InvalidIndex(String),

    #[error("unsupported pack index version {0}")]
    UnsupportedIndex(u32),

    #[error("unsupported pack file: {0}")]
    UnsupportedPack(String),

    #[error("pack offset word {raw:#010x} requires 64-bit offsets (packs over 2 GiB are not supported)")]
    UnsupportedLargePack { raw: u32 },

    #[error("unknown object type {type_num} at offset {offset}")]
    UnknownObjectType { type_num: u8, offset: u64 },

    #[error("malformed delta: {0}")]
    MalformedDelta(String),

    #[error("truncated pack data at offset {offset}")]
    Truncated { offset: u64 },

    #[error("corrupt pack entry at offset {offset}: {reason}")]
    CorruptEntry { offset: u64, reason: String },

    #[error("pack file missing for index: {0}")]
    MissingPack(PathBuf),

    #[error("delta base not found: {0}")]
    MissingBase(ObjectId),

    #[error("delta chain deeper than {max} entries at offset {offset}")]
    DeltaChainTooDeep { offset: u64, max: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] gitro_hash::HashError),
}

/// Type of a packed entry, before delta resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackEntryType {
    Commit,
    Tree,
    Blob,
    Tag,
    /// Delta whose base lives earlier in the same pack.
    OfsDelta { base_offset: u64 },
    /// Delta whose base is named by fingerprint (any pack or loose).
    RefDelta { base_oid: ObjectId },
}

impl PackEntryType {
    /// Convert a non-delta entry type to an ObjectType.
    pub fn to_object_type(self) -> Option<ObjectType> {
        match self {
            Self::Commit => Some(ObjectType::Commit),
            Self::Tree => Some(ObjectType::Tree),
            Self::Blob => Some(ObjectType::Blob),
            Self::Tag => Some(ObjectType::Tag),
            Self::OfsDelta { .. } | Self::RefDelta { .. } => None,
        }
    }

    /// Type number as used in pack entry headers.
    pub fn type_number(&self) -> u8 {
        match self {
            Self::Commit => 1,
            Self::Tree => 2,
            Self::Blob => 3,
            Self::Tag => 4,
            Self::OfsDelta { .. } => 6,
            Self::RefDelta { .. } => 7,
        }
    }
}

/// A fully resolved object read from a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedObject {
    pub kind: ObjectType,
    pub data: Vec<u8>,
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;
pub const PACK_HEADER_SIZE: usize = 12;

/// Pack index v2 constants. A v1 index has no signature; it starts
/// directly with the fanout table.
pub const IDX_V2_SIGNATURE: [u8; 4] = [0xff, 0x74, 0x4f, 0x63]; // "\377tOc"
pub const IDX_V2_VERSION: u32 = 2;

/// Maximum delta chain depth before we bail out. Real repositories keep
/// chains well under 50 entries.
pub const MAX_DELTA_CHAIN_DEPTH: usize = 64;
