//! Unified object database: loose storage, packs, and memoization.
//!
//! `get`-style reads consult the cache, then loose storage, then every
//! pack. Delta entries are resolved transparently; callers only ever see
//! the four concrete object types.

mod loose;

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gitro_hash::hasher::Hasher;
use gitro_hash::ObjectId;
use gitro_object::{Object, ObjectType};
use gitro_pack::pack::PackFile;
use gitro_pack::PackError;

/// Errors from object database reads.
#[derive(Debug, thiserror::Error)]
pub enum OdbError {
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Pack(#[from] PackError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] gitro_hash::HashError),
}

/// An object's concrete type and payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawObject {
    pub kind: ObjectType,
    pub data: Vec<u8>,
}

/// Object database rooted at an `objects/` directory.
///
/// Pack descriptors are recorded at open; the pack files themselves open
/// lazily at the first read and stay open for the database lifetime. The
/// raw-object cache is unbounded and lives as long as the database; a
/// database is single-threaded by construction.
pub struct ObjectDatabase {
    objects_dir: PathBuf,
    pack_paths: Vec<PathBuf>,
    packs: RefCell<Option<Vec<PackFile>>>,
    cache: RefCell<HashMap<ObjectId, RawObject>>,
}

impl ObjectDatabase {
    /// Open the object database at the given objects directory.
    pub fn open(objects_dir: impl AsRef<Path>) -> Result<Self, OdbError> {
        let objects_dir = objects_dir.as_ref().to_path_buf();
        let pack_paths = discover_pack_paths(&objects_dir)?;
        Ok(Self {
            objects_dir,
            pack_paths,
            packs: RefCell::new(None),
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Path to the objects directory.
    pub fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }

    /// Fetch an object's type and payload by fingerprint.
    ///
    /// Search order: cache, loose storage, then each pack. Results are
    /// memoized for the lifetime of the database.
    pub fn read_raw(&self, oid: &ObjectId) -> Result<RawObject, OdbError> {
        if let Some(hit) = self.cache.borrow().get(oid) {
            return Ok(hit.clone());
        }

        let raw = self.find_raw(oid)?.ok_or(OdbError::NotFound(*oid))?;
        self.cache.borrow_mut().insert(*oid, raw.clone());
        Ok(raw)
    }

    /// Fetch and decode an object.
    pub fn read(&self, oid: &ObjectId) -> Result<Object, OdbError> {
        let raw = self.read_raw(oid)?;
        Object::parse_content(raw.kind, &raw.data).map_err(|e| OdbError::Corrupt {
            oid: *oid,
            reason: e.to_string(),
        })
    }

    /// Fetch an object and verify its framing fingerprint:
    /// `sha1("<type> <len>\0<payload>")` must equal the requested name.
    pub fn read_verified(&self, oid: &ObjectId) -> Result<RawObject, OdbError> {
        let raw = self.read_raw(oid)?;
        let actual = Hasher::hash_object(raw.kind.as_str(), &raw.data)?;
        if actual != *oid {
            return Err(OdbError::Corrupt {
                oid: *oid,
                reason: format!("content hashes to {actual}"),
            });
        }
        Ok(raw)
    }

    /// Existence check without decompression.
    pub fn contains(&self, oid: &ObjectId) -> Result<bool, OdbError> {
        if self.cache.borrow().contains_key(oid) {
            return Ok(true);
        }
        if loose::contains_loose(&self.objects_dir, oid) {
            return Ok(true);
        }
        self.ensure_packs()?;
        let packs = self.packs.borrow();
        for pack in packs.as_ref().expect("packs opened").iter() {
            if pack.contains(oid)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn find_raw(&self, oid: &ObjectId) -> Result<Option<RawObject>, OdbError> {
        if let Some(raw) = loose::read_loose(&self.objects_dir, oid)? {
            return Ok(Some(raw));
        }

        self.ensure_packs()?;
        let packs = self.packs.borrow();
        let packs = packs.as_ref().expect("packs opened");

        for pack in packs.iter() {
            // Reference-delta bases may live in loose storage or any other
            // pack; hand the pack reader a way to reach both.
            let resolver = |base_oid: &ObjectId| -> Option<(ObjectType, Vec<u8>)> {
                if let Ok(Some(raw)) = loose::read_loose(&self.objects_dir, base_oid) {
                    return Some((raw.kind, raw.data));
                }
                for other in packs.iter() {
                    if std::ptr::eq(other, pack) {
                        continue;
                    }
                    if let Ok(Some(obj)) = other.read_object(base_oid) {
                        return Some((obj.kind, obj.data));
                    }
                }
                None
            };

            match pack.read_object_with_resolver(oid, resolver)? {
                Some(obj) => {
                    return Ok(Some(RawObject {
                        kind: obj.kind,
                        data: obj.data,
                    }))
                }
                None => continue,
            }
        }

        Ok(None)
    }

    /// Open every recorded pack, once.
    ///
    /// An index that vanished since discovery (concurrent repack replaced
    /// the pair) contributes no matches; an index whose pack file is gone
    /// is a hard error.
    fn ensure_packs(&self) -> Result<(), OdbError> {
        if self.packs.borrow().is_some() {
            return Ok(());
        }

        let mut opened = Vec::new();
        for pack_path in &self.pack_paths {
            match PackFile::open(pack_path) {
                Ok(pack) => opened.push(pack),
                Err(PackError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        *self.packs.borrow_mut() = Some(opened);
        Ok(())
    }
}

/// Scan `objects/pack/` for `pack-<40 hex>.idx` files, recording the
/// companion `.pack` paths. Traversal order is unspecified.
fn discover_pack_paths(objects_dir: &Path) -> Result<Vec<PathBuf>, OdbError> {
    let pack_dir = objects_dir.join("pack");
    if !pack_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&pack_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_pack_index_name(name) {
            paths.push(path.with_extension("pack"));
        }
    }
    Ok(paths)
}

fn is_pack_index_name(name: &str) -> bool {
    name.strip_prefix("pack-")
        .and_then(|rest| rest.strip_suffix(".idx"))
        .is_some_and(|hex| hex.len() == 40 && gitro_hash::hex::is_valid_hex(hex))
}
