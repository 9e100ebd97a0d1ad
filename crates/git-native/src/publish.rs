use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gix::ObjectId;
use tracing::info;

use crate::cli::GitCli;
use crate::error::{GitPublishError, Result};
use crate::ops;
use crate::url::AuthenticatedRemote;

/// Name of the remote registered in the staging repository.
pub const REMOTE_NAME: &str = "origin";

/// Repository-local attributes that win over any uploaded `.gitattributes`,
/// so `git add` stores every file exactly as staged.
const VERBATIM_ATTRIBUTES: &str = "* -text -eol -filter -ident -working-tree-encoding\n";

/// One step of [`publish_directory`], in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Init,
    Configure,
    Branch,
    AddRemote,
    Stage,
    Commit,
    Verify,
    Push,
}

impl PublishStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Configure => "configure",
            Self::Branch => "branch",
            Self::AddRemote => "add-remote",
            Self::Stage => "add",
            Self::Commit => "commit",
            Self::Verify => "verify",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author and committer of the published commit.
#[derive(Debug, Clone)]
pub struct Committer {
    pub name: String,
    pub email: String,
}

/// Everything needed to turn a staged directory into a pushed branch.
pub struct PublishRequest<'a> {
    pub workdir: &'a Path,
    pub remote: &'a AuthenticatedRemote,
    pub branch: &'a str,
    pub message: &'a str,
    pub committer: &'a Committer,
    /// Relative `/`-separated paths of the staged files. The commit must hold
    /// exactly these, with the bytes found in `workdir`.
    pub expected_files: &'a [String],
    /// Upper bound for each git invocation.
    pub step_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub commit_id: ObjectId,
}

/// Initialize a repository in `workdir`, commit everything in it, and push
/// the branch to the remote.
///
/// Steps run strictly in order; the first failure aborts with the failing
/// [`PublishStep`]. Nothing is retried or rolled back.
pub async fn publish_directory(req: &PublishRequest<'_>) -> Result<PublishOutcome> {
    let git = GitCli::new(req.workdir, req.step_timeout).with_redactions(req.remote.secrets());
    let branch_ref = format!("refs/heads/{}", req.branch);

    git.run(
        PublishStep::Init,
        &["init", "--quiet", &format!("--initial-branch={}", req.branch)],
    )
    .await?;
    info!(workdir = %req.workdir.display(), "git repository initialized");

    for (key, value) in [
        ("user.name", req.committer.name.as_str()),
        ("user.email", req.committer.email.as_str()),
        ("commit.gpgsign", "false"),
        ("core.autocrlf", "false"),
    ] {
        git.run(PublishStep::Configure, &["config", key, value]).await?;
    }
    write_verbatim_attributes(req.workdir).await?;

    git.run(PublishStep::Branch, &["symbolic-ref", "HEAD", &branch_ref])
        .await?;
    info!(branch = %req.branch, "branch checked out");

    git.run(
        PublishStep::AddRemote,
        &["remote", "add", REMOTE_NAME, req.remote.expose_url()],
    )
    .await?;
    info!(remote = %req.remote, "remote added");

    git.run(PublishStep::Stage, &["add", "--all", "--force", "."])
        .await?;
    git.run(
        PublishStep::Commit,
        &["commit", "--quiet", "--no-verify", "-m", req.message],
    )
    .await?;

    let commit_id =
        verify_commit(req.workdir.to_path_buf(), req.expected_files.to_vec()).await?;
    info!(commit = %commit_id, files = req.expected_files.len(), "commit created");

    git.run(
        PublishStep::Push,
        &["push", "--quiet", "--no-verify", REMOTE_NAME, &format!("{branch_ref}:{branch_ref}")],
    )
    .await?;
    info!(remote = %req.remote, branch = %req.branch, "branch pushed");

    Ok(PublishOutcome { commit_id })
}

/// Disable every attribute that rewrites content on `git add`.
async fn write_verbatim_attributes(workdir: &Path) -> Result<()> {
    let info_dir = workdir.join(".git").join("info");
    let path = info_dir.join("attributes");
    let written = match tokio::fs::create_dir_all(&info_dir).await {
        Ok(()) => tokio::fs::write(&path, VERBATIM_ATTRIBUTES).await,
        Err(e) => Err(e),
    };
    written.map_err(|source| GitPublishError::WriteConfig { path, source })
}

/// Read the fresh commit back and check it holds exactly the staged files,
/// byte for byte.
async fn verify_commit(workdir: PathBuf, expected: Vec<String>) -> Result<ObjectId> {
    tokio::task::spawn_blocking(move || {
        let repo = ops::open_repo(&workdir)?;
        let head = ops::head_commit_id(&repo)?;
        let tree = ops::commit_tree_id(&repo, head)?;
        let committed: HashMap<String, ObjectId> =
            ops::list_tree_files(&repo, tree)?.into_iter().collect();
        if committed.len() != expected.len() {
            return Err(GitPublishError::TreeMismatch {
                expected: expected.len(),
                committed: committed.len(),
            });
        }

        for path in expected {
            let Some(oid) = committed.get(&path) else {
                return Err(GitPublishError::ContentMismatch { path });
            };
            let blob = repo.find_object(*oid).map_err(ops::gix_err)?;
            let staged = std::fs::read(workdir.join(&path))?;
            if blob.data != staged {
                return Err(GitPublishError::ContentMismatch { path });
            }
        }
        Ok(head)
    })
    .await
    .map_err(ops::gix_err)?
}
