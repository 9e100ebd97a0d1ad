/// Failure talking to the hosting platform.
///
/// Messages carry the endpoint and GitHub's own error text; request
/// credentials never appear in them.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{endpoint} timed out")]
    Timeout { endpoint: &'static str },

    #[error("{endpoint} request failed: {message}")]
    Transport {
        endpoint: &'static str,
        message: String,
    },

    #[error("{endpoint} returned HTTP {status}: {message}")]
    Status {
        endpoint: &'static str,
        status: u16,
        message: String,
    },

    #[error("{endpoint} returned an unexpected body: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },

    #[error("{0}")]
    Rejected(String),
}

impl PlatformError {
    pub(crate) fn from_reqwest(endpoint: &'static str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Transport {
                endpoint,
                message: e.without_url().to_string(),
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status returned by the platform, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
