use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Per-request directory holding uploaded files until they are pushed.
///
/// The directory is created exclusively, so two requests can never share
/// one. Dropping the guard (success, failure, or a cancelled request)
/// schedules its removal after the cleanup delay.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    cleanup_delay: Duration,
}

impl StagingDir {
    /// Create `root/name`. Fails if it already exists.
    pub async fn create(root: &Path, name: &str, cleanup_delay: Duration) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;
        let path = root.join(name);
        tokio::fs::create_dir(&path).await?;
        tracing::debug!("staging directory created: {}", path.display());
        Ok(Self {
            path,
            cleanup_delay,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        let path = std::mem::take(&mut self.path);
        let delay = self.cleanup_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(remove_after(path, delay));
            }
            // Outside a runtime there is nothing to wait on.
            Err(_) => {
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    tracing::warn!("failed to remove staging directory {}: {e}", path.display());
                }
            }
        }
    }
}

async fn remove_after(path: PathBuf, delay: Duration) {
    tokio::time::sleep(delay).await;
    match tokio::fs::remove_dir_all(&path).await {
        Ok(()) => tracing::debug!("staging directory removed: {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!("failed to remove staging directory {}: {e}", path.display())
        }
    }
}
