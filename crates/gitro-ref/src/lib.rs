//! Read-only reference resolution.
//!
//! Refs bind human-readable names to object fingerprints. They live either
//! as individual files under `refs/` or as lines in `packed-refs`; a loose
//! file shadows a packed entry of the same name. `HEAD` is either a
//! symbolic pointer (`ref: refs/heads/main`) or a detached fingerprint.

mod loose;
mod packed;

pub use packed::PackedRefs;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gitro_hash::ObjectId;

use loose::LooseRef;

/// Symbolic ref chains longer than this are treated as loops.
const MAX_SYMREF_DEPTH: usize = 10;

/// Errors from reference resolution.
#[derive(Debug, thiserror::Error)]
pub enum RefError {
    #[error("ref not found: {0}")]
    NotFound(String),

    #[error("symbolic ref chain too deep at {0}")]
    SymrefLoop(String),

    #[error("ref parse error: {0}")]
    Parse(String),

    #[error("I/O error on {path}: {source}")]
    IoPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Hash(#[from] gitro_hash::HashError),
}

/// The state of `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// `HEAD` names another ref.
    Symbolic(String),
    /// `HEAD` holds a bare fingerprint.
    Detached(ObjectId),
}

/// Read-only view over a repository's references.
pub struct RefStore {
    git_dir: PathBuf,
}

impl RefStore {
    pub fn new(git_dir: impl AsRef<Path>) -> Self {
        Self {
            git_dir: git_dir.as_ref().to_path_buf(),
        }
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Resolve a branch or tag name to a fingerprint.
    ///
    /// A name containing `/` is looked up verbatim; a short name is tried
    /// as `refs/heads/<name>`, then `refs/tags/<name>`. Loose files win
    /// over `packed-refs`; among packed entries the first line matching any
    /// candidate wins.
    pub fn tip(&self, name: &str) -> Result<ObjectId, RefError> {
        self.tip_at_depth(name, 0)
    }

    fn tip_at_depth(&self, name: &str, depth: usize) -> Result<ObjectId, RefError> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(RefError::SymrefLoop(name.to_string()));
        }

        let candidates: Vec<String> = if name.contains('/') {
            vec![name.to_string()]
        } else {
            vec![format!("refs/heads/{name}"), format!("refs/tags/{name}")]
        };

        for candidate in &candidates {
            match loose::read_ref_file(&self.git_dir, candidate)? {
                Some(LooseRef::Direct(oid)) => return Ok(oid),
                Some(LooseRef::Symbolic(target)) => {
                    return self.tip_at_depth(&target, depth + 1)
                }
                None => {}
            }
        }

        let packed = PackedRefs::load(&self.git_dir)?;
        for (refname, oid) in packed.refs() {
            if candidates.iter().any(|c| c == refname) {
                return Ok(*oid);
            }
        }

        Err(RefError::NotFound(name.to_string()))
    }

    /// Read `HEAD` without resolving. `None` when the file is absent.
    pub fn head(&self) -> Result<Option<Head>, RefError> {
        match loose::read_ref_file(&self.git_dir, "HEAD")? {
            None => Ok(None),
            Some(LooseRef::Symbolic(target)) => Ok(Some(Head::Symbolic(target))),
            Some(LooseRef::Direct(oid)) => Ok(Some(Head::Detached(oid))),
        }
    }

    /// Resolve `HEAD` to a fingerprint.
    ///
    /// `None` when `HEAD` is absent or points at an unborn branch.
    pub fn head_oid(&self) -> Result<Option<ObjectId>, RefError> {
        match self.head()? {
            None => Ok(None),
            Some(Head::Detached(oid)) => Ok(Some(oid)),
            Some(Head::Symbolic(name)) => match self.tip(&name) {
                Ok(oid) => Ok(Some(oid)),
                Err(RefError::NotFound(_)) => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    /// All refs under `refs/heads` and `refs/tags` plus every entry of
    /// `packed-refs`, loose entries shadowing packed ones.
    pub fn list(&self) -> Result<BTreeMap<String, ObjectId>, RefError> {
        let mut refs = BTreeMap::new();
        for (name, oid) in PackedRefs::load(&self.git_dir)?.refs() {
            refs.insert(name.clone(), *oid);
        }
        loose::collect_refs(&self.git_dir, "refs/heads", &mut refs)?;
        loose::collect_refs(&self.git_dir, "refs/tags", &mut refs)?;
        Ok(refs)
    }

    /// Tags keyed by short name (the part after `refs/tags/`).
    pub fn tags(&self) -> Result<BTreeMap<String, ObjectId>, RefError> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|(name, oid)| {
                name.strip_prefix("refs/tags/")
                    .map(|short| (short.to_string(), oid))
            })
            .collect())
    }
}
