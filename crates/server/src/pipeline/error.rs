use axum::http::StatusCode;

/// Failure of one deploy pipeline stage.
///
/// Display output goes to the log; [`DeployError::public_message`] goes to
/// the client. Neither ever contains the client secret or a bearer token.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("staging upload failed: {0}")]
    Upload(String),

    #[error("publish failed at {step}: {cause}")]
    Publish { step: &'static str, cause: String },

    #[error("pages activation failed for {repository}: {cause}")]
    Activation { repository: String, cause: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },
}

impl DeployError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Authentication(_) => "Authentication failed".into(),
            Self::InvalidUpload(reason) => reason.clone(),
            Self::Upload(_) => "Failed to upload files".into(),
            Self::Publish { step, .. } => format!("Failed to publish files ({step})"),
            Self::Activation { .. } => {
                "Files were pushed but GitHub Pages could not be enabled".into()
            }
            Self::Timeout { operation } => format!("{operation} timed out"),
        }
    }
}
