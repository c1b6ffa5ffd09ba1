use std::path::{Path, PathBuf};

use crate::RepoError;

/// Resolve the supplied path to a repository root.
///
/// Accepted inputs:
/// - a repository root itself (a directory holding a `HEAD` file and an
///   `objects/` directory);
/// - a working-tree directory containing `.git` (directory or pointer
///   file);
/// - a pointer file whose first line is `gitdir: <path>`.
pub(crate) fn resolve_repo_root(path: &Path) -> Result<PathBuf, RepoError> {
    if path.is_file() {
        return resolve_pointer_file(path);
    }

    if path.is_dir() {
        if is_repo_root(path) {
            return Ok(path.to_path_buf());
        }
        let dot_git = path.join(".git");
        if dot_git.is_dir() {
            return Ok(dot_git);
        }
        if dot_git.is_file() {
            return resolve_pointer_file(&dot_git);
        }
    }

    Err(RepoError::NotARepository(path.to_path_buf()))
}

/// Does this directory look like a repository root?
pub(crate) fn is_repo_root(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

/// Resolve a `gitdir: <path>` pointer file.
///
/// An absolute target is used as-is. A relative target resolves against
/// the pointer's parent directory — or the grandparent when the pointer
/// file is itself named `.git`. The result must be an existing directory.
fn resolve_pointer_file(pointer: &Path) -> Result<PathBuf, RepoError> {
    let content = std::fs::read_to_string(pointer)
        .map_err(|_| RepoError::NotARepository(pointer.to_path_buf()))?;

    let first_line = content.lines().next().unwrap_or("");
    let Some(target) = first_line.strip_prefix("gitdir: ") else {
        return Err(RepoError::NotARepository(pointer.to_path_buf()));
    };
    let target = PathBuf::from(target.trim());

    let resolved = if target.is_absolute() {
        target
    } else {
        let base = if pointer.file_name().is_some_and(|n| n == ".git") {
            pointer.parent().and_then(|p| p.parent())
        } else {
            pointer.parent()
        };
        match base {
            Some(base) => base.join(target),
            None => target,
        }
    };

    if !resolved.is_dir() {
        return Err(RepoError::NotARepository(pointer.to_path_buf()));
    }
    Ok(resolved)
}
