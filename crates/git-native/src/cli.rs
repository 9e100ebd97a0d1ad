use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::{GitPublishError, Result};
use crate::publish::PublishStep;

/// Runs `git` subcommands in one working directory.
///
/// Each invocation is bounded by `timeout` and killed if the caller's future
/// is dropped.
pub struct GitCli {
    workdir: PathBuf,
    timeout: Duration,
    redactions: Vec<String>,
}

impl GitCli {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
            redactions: Vec::new(),
        }
    }

    /// Strings masked in logged arguments and captured stderr.
    pub fn with_redactions(mut self, secrets: &[String]) -> Self {
        self.redactions
            .extend(secrets.iter().filter(|s| !s.is_empty()).cloned());
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.redactions {
            out = out.replace(secret.as_str(), "***");
        }
        out
    }

    /// Run `git <args>` for `step`, returning trimmed stdout.
    pub async fn run(&self, step: PublishStep, args: &[&str]) -> Result<String> {
        debug!(%step, args = %self.scrub(&args.join(" ")), "git");

        let child = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| GitPublishError::Timeout {
                step,
                timeout: self.timeout,
            })?
            .map_err(|source| GitPublishError::Spawn { step, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = self.scrub(stderr.trim());
            return Err(GitPublishError::Failed {
                step,
                status: output
                    .status
                    .code()
                    .map(|c| format!("exit code {c}"))
                    .unwrap_or_else(|| "terminated by signal".into()),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
