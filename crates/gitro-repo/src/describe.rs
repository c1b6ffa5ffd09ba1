//! Nearest-tag naming for commits.

use std::collections::{HashMap, HashSet, VecDeque};

use gitro_hash::ObjectId;
use gitro_object::Object;

use crate::{RepoError, Repository};

/// Name a commit after the closest reachable annotated tag.
///
/// Breadth-first search from the commit through its parents. An exact
/// match yields the tag name alone; a match at depth `n` yields
/// `"<tag>-<n>-g<abbrev>"`; when no tag is reachable, the abbreviated
/// fingerprint of the starting commit is returned.
pub(crate) fn describe(
    repo: &Repository,
    commit: &ObjectId,
    abbrev: usize,
) -> Result<String, RepoError> {
    let tag_targets = annotated_tag_targets(repo)?;

    let mut queue: VecDeque<(ObjectId, usize)> = VecDeque::new();
    let mut seen: HashSet<ObjectId> = HashSet::new();
    queue.push_back((*commit, 0));
    seen.insert(*commit);

    while let Some((oid, depth)) = queue.pop_front() {
        if let Some(tag_name) = tag_targets.get(&oid) {
            return Ok(if depth == 0 {
                tag_name.clone()
            } else {
                format!("{}-{}-g{}", tag_name, depth, commit.abbrev(abbrev))
            });
        }

        if let Object::Commit(c) = repo.object(&oid)? {
            for parent in &c.parents {
                if seen.insert(*parent) {
                    queue.push_back((*parent, depth + 1));
                }
            }
        }
    }

    Ok(commit.abbrev(abbrev))
}

/// Map from tagged fingerprint to tag short name, built by loading every
/// `refs/tags/*` object. Only annotated tags participate; when several
/// tags share a target the alphabetically first name wins.
fn annotated_tag_targets(repo: &Repository) -> Result<HashMap<ObjectId, String>, RepoError> {
    let mut targets = HashMap::new();
    for (short_name, oid) in repo.list_tags()? {
        if let Object::Tag(tag) = repo.object(&oid)? {
            for target in &tag.targets {
                targets.entry(*target).or_insert_with(|| short_name.clone());
            }
        }
    }
    Ok(targets)
}
