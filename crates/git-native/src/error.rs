use std::path::PathBuf;
use std::time::Duration;

use crate::publish::PublishStep;

#[derive(Debug, thiserror::Error)]
pub enum GitPublishError {
    #[error("could not run git for {step}: {source}")]
    Spawn {
        step: PublishStep,
        #[source]
        source: std::io::Error,
    },

    #[error("git {step} failed ({status}): {stderr}")]
    Failed {
        step: PublishStep,
        status: String,
        stderr: String,
    },

    #[error("git {step} timed out after {}s", .timeout.as_secs())]
    Timeout { step: PublishStep, timeout: Duration },

    #[error("could not write {}: {source}", .path.display())]
    WriteConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("committed tree holds {committed} files, expected {expected}")]
    TreeMismatch { expected: usize, committed: usize },

    #[error("committed content of {path} differs from the staged file")]
    ContentMismatch { path: String },

    #[error("not a git repository: {0}")]
    NotARepo(PathBuf),

    #[error("git error: {0}")]
    Gix(Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GitPublishError {
    /// The publish step this error belongs to. Read-back failures count as
    /// [`PublishStep::Verify`].
    pub fn step(&self) -> PublishStep {
        match self {
            Self::Spawn { step, .. } | Self::Failed { step, .. } | Self::Timeout { step, .. } => {
                *step
            }
            Self::WriteConfig { .. } => PublishStep::Configure,
            Self::TreeMismatch { .. }
            | Self::ContentMismatch { .. }
            | Self::NotARepo(_)
            | Self::Gix(_)
            | Self::Io(_) => PublishStep::Verify,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, GitPublishError>;
