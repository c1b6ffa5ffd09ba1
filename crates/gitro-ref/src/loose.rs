use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bstr::ByteSlice;
use gitro_hash::ObjectId;

use crate::RefError;

/// Contents of a single loose ref file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LooseRef {
    /// A bare fingerprint.
    Direct(ObjectId),
    /// `ref: <target>` — points at another ref by name.
    Symbolic(String),
}

/// Read one loose ref file (a path under the repository root such as
/// `refs/heads/main` or `HEAD`). Returns `None` when no regular file
/// exists at that path.
pub(crate) fn read_ref_file(git_dir: &Path, name: &str) -> Result<Option<LooseRef>, RefError> {
    let path = git_dir.join(name);
    if !path.is_file() {
        return Ok(None);
    }

    let contents = fs::read(&path).map_err(|e| RefError::IoPath {
        path: path.clone(),
        source: e,
    })?;
    let trimmed = contents.trim();

    if let Some(target) = trimmed.strip_prefix(b"ref: ") {
        let target = std::str::from_utf8(target.trim())
            .map_err(|_| RefError::Parse(format!("non-UTF-8 symbolic target in {name}")))?;
        return Ok(Some(LooseRef::Symbolic(target.to_string())));
    }

    let hex = std::str::from_utf8(trimmed)
        .map_err(|_| RefError::Parse(format!("non-UTF-8 fingerprint in {name}")))?;
    let oid = ObjectId::from_hex(hex)?;
    Ok(Some(LooseRef::Direct(oid)))
}

/// Collect every regular file under `<git_dir>/<prefix>` into `out`, keyed
/// by ref name relative to the repository root. Files that do not hold a
/// bare fingerprint (lock files, symbolic refs) are skipped.
pub(crate) fn collect_refs(
    git_dir: &Path,
    prefix: &str,
    out: &mut BTreeMap<String, ObjectId>,
) -> Result<(), RefError> {
    let dir = git_dir.join(prefix);
    if !dir.is_dir() {
        return Ok(());
    }
    collect_dir(git_dir, &dir, out)
}

fn collect_dir(
    git_dir: &Path,
    dir: &Path,
    out: &mut BTreeMap<String, ObjectId>,
) -> Result<(), RefError> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(RefError::IoPath {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    for entry in entries {
        let entry = entry.map_err(|e| RefError::IoPath {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();

        if path.is_dir() {
            collect_dir(git_dir, &path, out)?;
        } else if path.is_file() {
            let rel = path
                .strip_prefix(git_dir)
                .map_err(|_| RefError::Parse("ref path escapes repository root".into()))?;
            let Some(name) = rel.to_str() else { continue };
            if name.ends_with(".lock") {
                continue;
            }
            if let Ok(Some(LooseRef::Direct(oid))) = read_ref_file(git_dir, name) {
                out.insert(name.to_string(), oid);
            }
        }
    }

    Ok(())
}
