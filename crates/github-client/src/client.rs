use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use deployhub_api::oauth::{self, OAuthProviderConfig};

use crate::error::PlatformError;
use crate::platform::{CreatedRepository, HostingPlatform, PagesSource};

const USER_AGENT: &str = concat!("deployhub/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Typed HTTP client for the GitHub OAuth and REST endpoints DeployHub uses.
///
/// Every request is bounded by the timeout given to [`GitHubClient::new`].
pub struct GitHubClient {
    client: reqwest::Client,
    provider: OAuthProviderConfig,
    api_url: String,
}

impl GitHubClient {
    /// Create a new client for `api_url` (e.g. `https://api.github.com`).
    pub fn new(
        provider: OAuthProviderConfig,
        api_url: &str,
        timeout: Duration,
    ) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PlatformError::from_reqwest("client setup", e))?;
        Ok(Self::with_client(client, provider, api_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, provider: OAuthProviderConfig, api_url: &str) -> Self {
        Self {
            client,
            provider,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn rest(&self, method: reqwest::Method, url: String, token: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", GITHUB_JSON)
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

#[async_trait]
impl HostingPlatform for GitHubClient {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, PlatformError> {
        const ENDPOINT: &str = "token exchange";
        let body = oauth::build_token_request_body(&self.provider, code, redirect_uri);
        let resp = self
            .client
            .post(&self.provider.token_url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;
        if !status.is_success() {
            return Err(PlatformError::Status {
                endpoint: ENDPOINT,
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        oauth::parse_access_token_response(&text)
            .map_err(|e| PlatformError::Rejected(e.message().to_string()))
    }

    async fn current_login(&self, token: &str) -> Result<String, PlatformError> {
        const ENDPOINT: &str = "GET /user";
        let resp = self
            .rest(reqwest::Method::GET, self.provider.userinfo_url.clone(), token)
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;
        let userinfo: serde_json::Value = parse_response(ENDPOINT, resp).await?;
        oauth::extract_login(&userinfo).map_err(|e| PlatformError::Decode {
            endpoint: ENDPOINT,
            message: e.message().to_string(),
        })
    }

    async fn create_repository(
        &self,
        token: &str,
        name: &str,
    ) -> Result<CreatedRepository, PlatformError> {
        const ENDPOINT: &str = "POST /user/repos";
        let resp = self
            .rest(reqwest::Method::POST, self.url("/user/repos"), token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;
        let repo: CreatedRepository = parse_response(ENDPOINT, resp).await?;
        tracing::info!(repo = %repo.name, owner = %repo.owner.login, "repository created");
        Ok(repo)
    }

    async fn enable_pages(
        &self,
        token: &str,
        owner: &str,
        repo: &str,
        source: &PagesSource,
    ) -> Result<(), PlatformError> {
        const ENDPOINT: &str = "POST /repos/{owner}/{repo}/pages";
        let path = format!(
            "/repos/{}/{}/pages",
            urlencoding::encode(owner),
            urlencoding::encode(repo)
        );
        let resp = self
            .rest(reqwest::Method::POST, self.url(&path), token)
            .json(&serde_json::json!({ "source": source }))
            .send()
            .await
            .map_err(|e| PlatformError::from_reqwest(ENDPOINT, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Status {
                endpoint: ENDPOINT,
                status: status.as_u16(),
                message: error_message(&body),
            });
        }
        tracing::info!(%owner, %repo, branch = %source.branch, "pages enabled");
        Ok(())
    }
}

async fn parse_response<T: DeserializeOwned>(
    endpoint: &'static str,
    resp: reqwest::Response,
) -> Result<T, PlatformError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(PlatformError::Status {
            endpoint,
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    resp.json().await.map_err(|e| PlatformError::Decode {
        endpoint,
        message: e.without_url().to_string(),
    })
}

/// GitHub error bodies look like `{"message": "...", ...}`; fall back to a
/// truncated raw body.
fn error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = json["message"].as_str().or_else(|| json["error"].as_str()) {
            return msg.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    trimmed.chars().take(200).collect()
}
