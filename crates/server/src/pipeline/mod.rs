//! Upload to Pages: stage files, create the repository, push, enable Pages.

mod error;

pub use error::DeployError;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use deployhub_api::deploy;
use deployhub_git_native::{
    AuthenticatedRemote, Committer, GitPublishError, PublishRequest, publish_directory,
};
use deployhub_github::{CreatedRepository, HostingPlatform, PagesSource, PlatformError};
use deployhub_runtime_config::ServerConfig;

use crate::staging::StagingDir;
use crate::upload::{self, UploadBatch};

/// Tunables of [`DeployPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub staging_root: PathBuf,
    pub cleanup_delay: Duration,
    pub request_timeout: Duration,
    pub git_timeout: Duration,
    pub repo_suffix: bool,
    pub committer: Committer,
}

impl PipelineSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        let deploy = &config.deploy;
        Self {
            staging_root: deploy.staging_dir.clone(),
            cleanup_delay: deploy.cleanup_delay(),
            request_timeout: deploy.request_timeout(),
            git_timeout: deploy.git_timeout(),
            repo_suffix: deploy.repo_suffix,
            committer: Committer {
                name: deploy.committer_name.clone(),
                email: deploy.committer_email.clone(),
            },
        }
    }
}

/// Result of a successful deploy.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub url: String,
    pub repository: CreatedRepository,
    pub commit_id: String,
}

pub struct DeployPipeline {
    platform: Arc<dyn HostingPlatform>,
    settings: PipelineSettings,
}

impl DeployPipeline {
    pub fn new(platform: Arc<dyn HostingPlatform>, settings: PipelineSettings) -> Self {
        Self { platform, settings }
    }

    /// Publish `batch` as a new repository owned by `token`'s account and
    /// return its Pages URL.
    ///
    /// Stages run in order and stop at the first failure. Nothing created
    /// remotely is rolled back. The staging directory is removed after the
    /// cleanup delay however this returns, including when the request is
    /// dropped mid-flight.
    pub async fn deploy(&self, token: &str, batch: UploadBatch) -> Result<Deployment, DeployError> {
        let started_at = Utc::now().timestamp_millis();
        let suffix = self.settings.repo_suffix.then(deploy::random_suffix);
        let repo_name = deploy::generate_repo_name(started_at, suffix.as_deref());

        let staging = StagingDir::create(
            &self.settings.staging_root,
            &repo_name,
            self.settings.cleanup_delay,
        )
        .await
        .map_err(|e| DeployError::Upload(format!("staging directory for {repo_name}: {e}")))?;
        upload::stage_batch(staging.path(), &batch).await?;
        info!(
            repo = %repo_name,
            files = batch.len(),
            bytes = batch.total_bytes(),
            "upload staged"
        );

        let repository = self
            .bounded(
                "repository creation",
                self.platform.create_repository(token, &repo_name),
            )
            .await?
            .map_err(|e| platform_failure(e, "repository creation", |cause| {
                DeployError::Publish {
                    step: "create-repository",
                    cause,
                }
            }))?;
        info!(repo = %repository.name, owner = %repository.owner.login, "repository created");

        let remote = AuthenticatedRemote::new(&repository.clone_url, token);
        let staged_paths: Vec<String> = batch.files().iter().map(|f| f.path.clone()).collect();
        let outcome = publish_directory(&PublishRequest {
            workdir: staging.path(),
            remote: &remote,
            branch: deploy::DEPLOY_BRANCH,
            message: deploy::COMMIT_MESSAGE,
            committer: &self.settings.committer,
            expected_files: &staged_paths,
            step_timeout: self.settings.git_timeout,
        })
        .await
        .map_err(publish_failure)?;

        let source = PagesSource::new(deploy::DEPLOY_BRANCH, deploy::PAGES_PATH);
        let activated = self
            .bounded(
                "pages activation",
                self.platform.enable_pages(
                    token,
                    &repository.owner.login,
                    &repository.name,
                    &source,
                ),
            )
            .await;
        let cause = match activated {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        if let Some(cause) = cause {
            return Err(DeployError::Activation {
                repository: repository.html_url,
                cause,
            });
        }

        let url = deploy::pages_url(&repository.owner.login, &repository.name);
        info!(repo = %repository.name, url = %url, "pages enabled");

        Ok(Deployment {
            url,
            commit_id: outcome.commit_id.to_string(),
            repository,
        })
    }

    /// Run a platform call under the request timeout.
    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T, PlatformError>>,
    ) -> Result<Result<T, PlatformError>, DeployError> {
        tokio::time::timeout(self.settings.request_timeout, call)
            .await
            .map_err(|_| DeployError::Timeout {
                operation: operation.into(),
            })
    }
}

fn platform_failure(
    e: PlatformError,
    operation: &'static str,
    wrap: impl FnOnce(String) -> DeployError,
) -> DeployError {
    if e.is_timeout() {
        DeployError::Timeout {
            operation: operation.into(),
        }
    } else {
        wrap(e.to_string())
    }
}

fn publish_failure(e: GitPublishError) -> DeployError {
    let step = e.step().as_str();
    if e.is_timeout() {
        DeployError::Timeout {
            operation: format!("git {step}"),
        }
    } else {
        DeployError::Publish {
            step,
            cause: e.to_string(),
        }
    }
}
