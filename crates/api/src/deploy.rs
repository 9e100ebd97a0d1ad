//! Deployment naming and upload path rules shared by the pipeline stages.

use crate::ServiceError;

/// Branch that is pushed and served by GitHub Pages.
pub const DEPLOY_BRANCH: &str = "main";

/// Directory within the branch that Pages serves.
pub const PAGES_PATH: &str = "/";

/// Message of the single commit pushed to a fresh repository.
pub const COMMIT_MESSAGE: &str = "Initial commit";

/// Prefix of every generated repository name.
pub const REPO_PREFIX: &str = "deployhub";

/// Build a repository name from the request start time.
///
/// `deployhub-<unix-millis>` on its own collides when two requests start in
/// the same millisecond; callers pass a random `suffix` to rule that out.
pub fn generate_repo_name(started_at_millis: i64, suffix: Option<&str>) -> String {
    match suffix.filter(|s| !s.is_empty()) {
        Some(suffix) => format!("{REPO_PREFIX}-{started_at_millis}-{suffix}"),
        None => format!("{REPO_PREFIX}-{started_at_millis}"),
    }
}

/// Short random suffix for [`generate_repo_name`].
pub fn random_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Public URL of a Pages site for a project repository.
pub fn pages_url(owner: &str, repo: &str) -> String {
    format!("https://{owner}.github.io/{repo}/")
}

/// Normalize a client-supplied upload path into a relative `/`-separated path.
///
/// Rejects anything that could escape the staging directory (`..`, absolute
/// paths, drive prefixes) and paths touching a `.git` directory, which would
/// corrupt the repository created in the staging directory.
pub fn normalize_upload_path(raw: &str) -> Result<String, ServiceError> {
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') {
        return Err(ServiceError::BadRequest(format!(
            "absolute upload path not allowed: {raw}"
        )));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(ServiceError::BadRequest(format!(
                    "upload path escapes the upload root: {raw}"
                )));
            }
            s if is_git_dir_alias(s) => {
                return Err(ServiceError::BadRequest(format!(
                    "upload path may not contain a .git directory: {raw}"
                )));
            }
            s if s.contains(':') || s.contains('\0') => {
                return Err(ServiceError::BadRequest(format!(
                    "invalid character in upload path: {raw}"
                )));
            }
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(ServiceError::BadRequest("upload file has no name".into()));
    }
    Ok(segments.join("/"))
}

/// `.git` and the names git refuses because NTFS resolves them to `.git`:
/// trailing dots or spaces, and the 8.3 short name `git~1`.
fn is_git_dir_alias(segment: &str) -> bool {
    let name = segment.trim_end_matches(['.', ' ']);
    if name.eq_ignore_ascii_case(".git") {
        return true;
    }
    name.get(..4).is_some_and(|head| head.eq_ignore_ascii_case("git~"))
        && name.len() > 4
        && name[4..].bytes().all(|b| b.is_ascii_digit())
}
