use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

/// Repository returned by `POST /user/repos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRepository {
    pub name: String,
    pub clone_url: String,
    pub html_url: String,
    pub owner: RepositoryOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

/// Branch and directory GitHub Pages should serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesSource {
    pub branch: String,
    pub path: String,
}

impl PagesSource {
    pub fn new(branch: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            path: path.into(),
        }
    }
}

/// The external platform the deploy pipeline talks to: OAuth plus the
/// repository and Pages REST endpoints.
///
/// `GitHubClient` is the production implementation; tests substitute stubs.
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    /// Exchange an authorization code for a bearer token.
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, PlatformError>;

    /// Login of the account owning `token`.
    async fn current_login(&self, token: &str) -> Result<String, PlatformError>;

    /// Create a public repository named `name` for the token's account.
    async fn create_repository(
        &self,
        token: &str,
        name: &str,
    ) -> Result<CreatedRepository, PlatformError>;

    /// Turn on Pages hosting for an already pushed branch.
    async fn enable_pages(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        source: &PagesSource,
    ) -> Result<(), PlatformError>;
}
