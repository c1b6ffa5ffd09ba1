//! Pack file reading.
//!
//! A pack holds a 12-byte header (`"PACK"`, version, object count), a
//! sequence of compressed entries, and a trailing checksum (not verified
//! here). Entries may be deltas; chains are resolved against bases in the
//! same pack or, for reference deltas, through an external resolver.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use gitro_hash::ObjectId;
use gitro_object::ObjectType;
use memmap2::Mmap;

use crate::entry::{parse_entry_header, PackEntry};
use crate::index::PackIndex;
use crate::lock::SharedLock;
use crate::{
    PackEntryType, PackError, PackedObject, MAX_DELTA_CHAIN_DEPTH, PACK_HEADER_SIZE,
    PACK_SIGNATURE, PACK_VERSION,
};

/// A memory-mapped pack file with its index.
#[derive(Debug)]
pub struct PackFile {
    file: File,
    data: Mmap,
    index: PackIndex,
    pack_path: PathBuf,
    num_objects: u32,
}

impl PackFile {
    /// Open a pack and its companion `.idx`.
    ///
    /// The index is opened first: an index whose pack file has vanished is
    /// a hard error ([`PackError::MissingPack`]), while a vanished index is
    /// a plain not-found I/O error the caller may treat as "this pack no
    /// longer exists".
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let pack_path = pack_path.as_ref().to_path_buf();
        let idx_path = pack_path.with_extension("idx");

        let index = PackIndex::open(&idx_path)?;

        let file = match File::open(&pack_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PackError::MissingPack(pack_path));
            }
            Err(e) => return Err(PackError::Io(e)),
        };
        let data = unsafe { Mmap::map(&file)? };

        if data.len() < PACK_HEADER_SIZE {
            return Err(PackError::UnsupportedPack("file too small".into()));
        }
        if &data[0..4] != PACK_SIGNATURE {
            return Err(PackError::UnsupportedPack("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if version != PACK_VERSION {
            return Err(PackError::UnsupportedPack(format!(
                "unsupported version {version}"
            )));
        }
        let num_objects = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        if index.num_objects() != num_objects {
            return Err(PackError::UnsupportedPack(format!(
                "pack has {} objects but index has {}",
                num_objects,
                index.num_objects()
            )));
        }

        Ok(Self {
            file,
            data,
            index,
            pack_path,
            num_objects,
        })
    }

    /// Read an object by fingerprint. `None` when not in this pack.
    pub fn read_object(&self, oid: &ObjectId) -> Result<Option<PackedObject>, PackError> {
        self.read_object_with_resolver(oid, |_| None)
    }

    /// Read an object at a known pack offset.
    pub fn read_at_offset(&self, offset: u64) -> Result<PackedObject, PackError> {
        self.read_at_offset_with_resolver(offset, |_| None)
    }

    /// Read by fingerprint with an external resolver for reference-delta
    /// bases that live outside this pack (other packs or loose storage).
    pub fn read_object_with_resolver(
        &self,
        oid: &ObjectId,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<Option<PackedObject>, PackError> {
        match self.index.lookup(oid)? {
            Some(offset) => self.read_at_offset_with_resolver(offset, resolver).map(Some),
            None => Ok(None),
        }
    }

    /// Read at a known offset with an external reference-delta resolver.
    pub fn read_at_offset_with_resolver(
        &self,
        offset: u64,
        resolver: impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        let _lock = SharedLock::acquire(&self.file)?;
        self.resolve_chain(offset, &resolver)
    }

    /// Walk a delta chain iteratively: deltas pile up innermost-first until
    /// a full object (or an externally resolved base) is reached, then the
    /// collected deltas are applied in reverse.
    fn resolve_chain(
        &self,
        offset: u64,
        resolver: &impl Fn(&ObjectId) -> Option<(ObjectType, Vec<u8>)>,
    ) -> Result<PackedObject, PackError> {
        let mut chain: Vec<Vec<u8>> = Vec::new();
        let mut current_offset = offset;

        while chain.len() <= MAX_DELTA_CHAIN_DEPTH {
            let entry = self.entry_at(current_offset)?;
            let payload = self.decompress_payload(&entry, current_offset)?;

            match entry.entry_type {
                PackEntryType::Commit
                | PackEntryType::Tree
                | PackEntryType::Blob
                | PackEntryType::Tag => {
                    let kind = entry.entry_type.to_object_type().expect("non-delta type");
                    return apply_chain(kind, payload, &chain);
                }
                PackEntryType::OfsDelta { base_offset } => {
                    chain.push(payload);
                    current_offset = base_offset;
                }
                PackEntryType::RefDelta { base_oid } => {
                    chain.push(payload);
                    if let Some(base_offset) = self.index.lookup(&base_oid)? {
                        current_offset = base_offset;
                    } else if let Some((kind, base_data)) = resolver(&base_oid) {
                        return apply_chain(kind, base_data, &chain);
                    } else {
                        return Err(PackError::MissingBase(base_oid));
                    }
                }
            }
        }

        Err(PackError::DeltaChainTooDeep {
            offset,
            max: MAX_DELTA_CHAIN_DEPTH,
        })
    }

    fn entry_at(&self, offset: u64) -> Result<PackEntry, PackError> {
        let start = offset as usize;
        if start >= self.data.len() {
            return Err(PackError::Truncated { offset });
        }
        parse_entry_header(&self.data[start..], offset)
    }

    /// Decompress exactly the entry's declared size starting at its payload
    /// offset. The compressed length is not recorded in the pack, so the
    /// decoder is bounded by the output size, never by a guessed input
    /// window.
    fn decompress_payload(&self, entry: &PackEntry, offset: u64) -> Result<Vec<u8>, PackError> {
        let start = entry.data_offset as usize;
        if start > self.data.len() {
            return Err(PackError::Truncated { offset });
        }
        let mut decoder = ZlibDecoder::new(&self.data[start..]);
        let mut buf = vec![0u8; entry.uncompressed_size];
        decoder
            .read_exact(&mut buf)
            .map_err(|_| PackError::Truncated { offset })?;
        Ok(buf)
    }

    /// Does this pack contain the fingerprint?
    pub fn contains(&self, oid: &ObjectId) -> Result<bool, PackError> {
        Ok(self.index.lookup(oid)?.is_some())
    }

    /// Number of objects in this pack.
    pub fn num_objects(&self) -> u32 {
        self.num_objects
    }

    /// The companion index.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Path to the `.pack` file.
    pub fn path(&self) -> &Path {
        &self.pack_path
    }
}

fn apply_chain(
    kind: ObjectType,
    base: Vec<u8>,
    chain: &[Vec<u8>],
) -> Result<PackedObject, PackError> {
    let mut data = base;
    for delta in chain.iter().rev() {
        data = crate::delta::apply_delta(&data, delta)?;
    }
    Ok(PackedObject { kind, data })
}
