use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use deployhub_api::{ApiError, ServiceError};

use crate::pipeline::DeployError;

/// Unified API error type.
///
/// Produces `{"error": "<message>"}` JSON responses, plus `"repository"`
/// when a deploy failed after its files were pushed.
#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    message: String,
    repository: Option<String>,
}

impl ApiErr {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
            repository: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    pub fn with_repository(mut self, url: impl Into<String>) -> Self {
        self.repository = Some(url.into());
        self
    }
}

impl From<ServiceError> for ApiErr {
    fn from(e: ServiceError) -> Self {
        let status = StatusCode::from_u16(e.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, e.message())
    }
}

impl From<DeployError> for ApiErr {
    fn from(e: DeployError) -> Self {
        // Causes are logged here in full; clients get the short form.
        match &e {
            DeployError::InvalidUpload(_) => tracing::info!("rejected upload: {e}"),
            _ => tracing::error!("{e}"),
        }
        let err = Self::new(e.status(), e.public_message());
        match e {
            DeployError::Activation { repository, .. } => err.with_repository(repository),
            _ => err,
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiError {
                error: self.message,
                repository: self.repository,
            }),
        )
            .into_response()
    }
}
