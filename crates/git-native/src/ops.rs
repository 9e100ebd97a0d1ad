use std::collections::BTreeMap;
use std::path::Path;

use gix::{ObjectId, Repository};

use crate::error::{GitPublishError, Result};

/// Wrap any gix-compatible error into [`GitPublishError::Gix`].
pub fn gix_err(e: impl std::error::Error + Send + Sync + 'static) -> GitPublishError {
    GitPublishError::Gix(Box::new(e))
}

/// Open a git repository (work tree or bare) at `repo_path`.
///
/// Returns [`GitPublishError::NotARepo`] when neither `.git` nor a bare
/// layout is present.
pub fn open_repo(repo_path: &Path) -> Result<Repository> {
    gix::open(repo_path).map_err(|e| {
        if repo_path.join(".git").exists() || repo_path.join("HEAD").exists() {
            gix_err(e)
        } else {
            GitPublishError::NotARepo(repo_path.to_path_buf())
        }
    })
}

/// Find the tip commit of a ref, returning `None` if the ref doesn't exist.
pub fn find_ref_tip<'r>(repo: &'r Repository, ref_name: &str) -> Result<Option<gix::Id<'r>>> {
    match repo.try_find_reference(ref_name).map_err(gix_err)? {
        Some(reference) => {
            let id = reference.into_fully_peeled_id().map_err(gix_err)?;
            Ok(Some(id))
        }
        None => Ok(None),
    }
}

/// Get the tree [`ObjectId`] from a commit.
pub fn commit_tree_id(repo: &Repository, commit_id: ObjectId) -> Result<ObjectId> {
    let commit = repo
        .find_object(commit_id)
        .map_err(gix_err)?
        .try_into_commit()
        .map_err(gix_err)?;
    let tree_id = commit.tree_id().map_err(gix_err)?;
    Ok(tree_id.detach())
}

/// Commit `HEAD` points at.
pub fn head_commit_id(repo: &Repository) -> Result<ObjectId> {
    Ok(repo.head_id().map_err(gix_err)?.detach())
}

/// Every non-tree entry of `tree_id`, recursively, as `/`-separated paths.
pub fn list_tree_files(repo: &Repository, tree_id: ObjectId) -> Result<Vec<(String, ObjectId)>> {
    let tree = repo
        .find_object(tree_id)
        .map_err(gix_err)?
        .try_into_tree()
        .map_err(gix_err)?;
    let mut recorder = gix::traverse::tree::Recorder::default();
    tree.traverse().breadthfirst(&mut recorder).map_err(gix_err)?;

    Ok(recorder
        .records
        .into_iter()
        .filter(|entry| !entry.mode.is_tree())
        .map(|entry| (entry.filepath.to_string(), entry.oid))
        .collect())
}

/// Read every file on `branch` into memory, keyed by path.
///
/// Works on bare repositories, so it can inspect what a push delivered.
pub fn read_branch_files(repo_path: &Path, branch: &str) -> Result<BTreeMap<String, Vec<u8>>> {
    let repo = open_repo(repo_path)?;
    let ref_name = format!("refs/heads/{branch}");
    let tip = find_ref_tip(&repo, &ref_name)?
        .ok_or_else(|| GitPublishError::Gix(format!("ref {ref_name} not found").into()))?
        .detach();
    let tree_id = commit_tree_id(&repo, tip)?;

    let mut files = BTreeMap::new();
    for (path, oid) in list_tree_files(&repo, tree_id)? {
        let blob = repo.find_object(oid).map_err(gix_err)?.detach();
        files.insert(path, blob.data);
    }
    Ok(files)
}
