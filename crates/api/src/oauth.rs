//! GitHub OAuth2 support.
//!
//! This module contains only types, URL builders, and response parsing.
//! No HTTP calls; those live in `deployhub-github`.

use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// Scope requested at authorize time. `repo` is needed to create
/// repositories, push to them, and enable Pages.
pub const DEFAULT_SCOPES: &str = "repo";

// ── Provider Configuration ──────────────────────────────────────────────────

/// OAuth2 provider configuration, built once at startup from `ServerConfig`.
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,

    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub scopes: String,
}

impl std::fmt::Debug for OAuthProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProviderConfig")
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

// ── URL Builders (pure functions, no HTTP) ──────────────────────────────────

/// Build the authorize URL that the user's browser is redirected to.
pub fn build_authorize_url(config: &OAuthProviderConfig, redirect_uri: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&scope={}&response_type=code",
        config.authorize_url,
        urlencoding::encode(&config.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&config.scopes),
    )
}

/// Build the JSON body for the token exchange request.
///
/// GitHub rejects the exchange unless `redirect_uri` matches the one sent to
/// the authorize endpoint.
pub fn build_token_request_body(
    config: &OAuthProviderConfig,
    code: &str,
    redirect_uri: &str,
) -> serde_json::Value {
    serde_json::json!({
        "client_id": config.client_id,
        "client_secret": config.client_secret,
        "code": code,
        "grant_type": "authorization_code",
        "redirect_uri": redirect_uri,
    })
}

/// Parse access_token from an OAuth token response.
///
/// Supports both JSON (`{"access_token":"..."}`) and query-string style
/// (`access_token=...&scope=...`) payloads. GitHub answers token errors with
/// HTTP 200 and an `error` field, so the body is the only signal.
pub fn parse_access_token_response(raw: &str) -> Result<String, ServiceError> {
    let body = raw.trim();
    if body.is_empty() {
        return Err(ServiceError::Internal(
            "OAuth token exchange failed: empty response body".into(),
        ));
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(token) = json
            .get("access_token")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return Ok(token.to_string());
        }

        let err = json.get("error").and_then(|v| v.as_str());
        let err_desc = json.get("error_description").and_then(|v| v.as_str());
        return Err(token_error(
            err.map(str::to_string),
            err_desc.map(str::to_string),
        ));
    }

    let mut access_token: Option<String> = None;
    let mut error: Option<String> = None;
    let mut error_description: Option<String> = None;

    for pair in body.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_form_component(v);
        match decode_form_component(k).as_str() {
            "access_token" if !value.trim().is_empty() => access_token = Some(value),
            "error" if !value.trim().is_empty() => error = Some(value),
            "error_description" if !value.trim().is_empty() => error_description = Some(value),
            _ => {}
        }
    }

    match access_token {
        Some(token) => Ok(token),
        None => Err(token_error(error, error_description)),
    }
}

fn token_error(error: Option<String>, description: Option<String>) -> ServiceError {
    let detail = match (error, description) {
        (Some(e), Some(d)) if !d.is_empty() => format!("{e}: {d}"),
        (Some(e), _) => e,
        (None, Some(d)) if !d.is_empty() => d,
        _ => "no access_token field in response".to_string(),
    };
    ServiceError::Internal(format!("OAuth token exchange failed: {detail}"))
}

/// Extract the account login from a `GET /user` response.
pub fn extract_login(userinfo_json: &serde_json::Value) -> Result<String, ServiceError> {
    userinfo_json["login"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Internal("OAuth userinfo missing 'login' field".into()))
}

// ── Provider Presets ────────────────────────────────────────────────────────

/// Create a GitHub OAuth2 provider config.
///
/// `web_url` is the browser-facing GitHub host (`https://github.com`),
/// `api_url` the REST host (`https://api.github.com`). Both are overridable
/// for GitHub Enterprise.
pub fn github_preset(
    web_url: &str,
    api_url: &str,
    client_id: String,
    client_secret: String,
) -> OAuthProviderConfig {
    let web = web_url.trim_end_matches('/');
    let api = api_url.trim_end_matches('/');
    OAuthProviderConfig {
        authorize_url: format!("{web}/login/oauth/authorize"),
        token_url: format!("{web}/login/oauth/access_token"),
        userinfo_url: format!("{api}/user"),
        client_id,
        client_secret,
        scopes: DEFAULT_SCOPES.into(),
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn decode_form_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}
