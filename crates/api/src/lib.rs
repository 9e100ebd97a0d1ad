//! Shared API types and pure helpers for DeployHub.
//!
//! This crate is the single source of truth for the request/response shapes
//! of the HTTP surface, plus the OAuth and deployment rules that have no I/O.

use serde::{Deserialize, Serialize};

pub mod deploy;
pub mod oauth;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Returned by `GET /me`.
///
/// Anonymous or unresolvable sessions serialize as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}

impl MeResponse {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_login(login: impl Into<String>) -> Self {
        Self {
            login: Some(login.into()),
        }
    }
}

// ─── Deploy ──────────────────────────────────────────────────────────────────

/// Returned by `POST /upload` once the site is live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResponse {
    pub url: String,
}

// ─── Health ──────────────────────────────────────────────────────────────────

/// Returned by `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Pure helpers in this crate return it; the HTTP layer turns it into a
/// response with [`ServiceError::status_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::Unauthorized(m) | Self::Internal(m) => m,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

// ─── Error (JSON shape) ──────────────────────────────────────────────────────

/// JSON error shape `{ "error": "..." }` returned by all error responses.
///
/// `repository` is only set when a deploy failed after the files were
/// already pushed, so the caller can still find them.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
            repository: None,
        }
    }
}
