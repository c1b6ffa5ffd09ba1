//! Repository discovery and the high-level read API.
//!
//! A [`Repository`] ties the object database and the reference store
//! together behind one façade: open a repository path, resolve refs and
//! `HEAD`, fetch typed objects, and name commits after nearby tags.

mod describe;
mod discover;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gitro_hash::ObjectId;
use gitro_object::Object;
use gitro_odb::{ObjectDatabase, OdbError, RawObject};
use gitro_ref::{Head, RefError, RefStore};

/// Default number of hex digits when abbreviating fingerprints.
pub const DEFAULT_ABBREV: usize = 7;

/// Errors from repository-level operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("not a repository: {0}")]
    NotARepository(PathBuf),

    #[error(transparent)]
    Odb(#[from] OdbError),

    #[error(transparent)]
    Ref(#[from] RefError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A read-only view of an on-disk repository.
pub struct Repository {
    git_dir: PathBuf,
    odb: ObjectDatabase,
    refs: RefStore,
}

impl Repository {
    /// Open a repository.
    ///
    /// `path` may be the repository root itself, a working tree containing
    /// `.git`, or a `gitdir:` pointer file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepoError> {
        let git_dir = discover::resolve_repo_root(path.as_ref())?;
        let odb = ObjectDatabase::open(git_dir.join("objects"))?;
        let refs = RefStore::new(&git_dir);
        Ok(Self { git_dir, odb, refs })
    }

    /// Path to the repository root.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Access the object database.
    pub fn odb(&self) -> &ObjectDatabase {
        &self.odb
    }

    /// Access the reference store.
    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    /// Fetch and decode an object by fingerprint.
    pub fn object(&self, oid: &ObjectId) -> Result<Object, RepoError> {
        Ok(self.odb.read(oid)?)
    }

    /// Fetch an object's type and payload without decoding.
    pub fn raw_object(&self, oid: &ObjectId) -> Result<RawObject, RepoError> {
        Ok(self.odb.read_raw(oid)?)
    }

    /// Fetch an object and check its framing fingerprint.
    pub fn verify_object(&self, oid: &ObjectId) -> Result<RawObject, RepoError> {
        Ok(self.odb.read_verified(oid)?)
    }

    /// Does the repository contain this object?
    pub fn contains(&self, oid: &ObjectId) -> Result<bool, RepoError> {
        Ok(self.odb.contains(oid)?)
    }

    /// Resolve a branch or tag name to a fingerprint.
    pub fn tip(&self, name: &str) -> Result<ObjectId, RepoError> {
        Ok(self.refs.tip(name)?)
    }

    /// Read `HEAD` without resolving.
    pub fn head(&self) -> Result<Option<Head>, RepoError> {
        Ok(self.refs.head()?)
    }

    /// Resolve `HEAD` to a fingerprint (`None` when absent or unborn).
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RepoError> {
        Ok(self.refs.head_oid()?)
    }

    /// All refs, loose entries shadowing packed ones.
    pub fn list_refs(&self) -> Result<BTreeMap<String, ObjectId>, RepoError> {
        Ok(self.refs.list()?)
    }

    /// Tags keyed by short name.
    pub fn list_tags(&self) -> Result<BTreeMap<String, ObjectId>, RepoError> {
        Ok(self.refs.tags()?)
    }

    /// Name a commit after the closest reachable annotated tag, using the
    /// default abbreviation width.
    pub fn describe(&self, commit: &ObjectId) -> Result<String, RepoError> {
        self.describe_abbrev(commit, DEFAULT_ABBREV)
    }

    /// Name a commit after the closest reachable annotated tag.
    pub fn describe_abbrev(&self, commit: &ObjectId, abbrev: usize) -> Result<String, RepoError> {
        describe::describe(self, commit, abbrev)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("git_dir", &self.git_dir)
            .finish_non_exhaustive()
    }
}
