use std::sync::Arc;
use std::time::Duration;

use deployhub_api::MeResponse;
use deployhub_github::HostingPlatform;

use crate::pipeline::DeployError;

/// OAuth code exchange and identity lookup, bounded by a request timeout.
pub struct IdentityGateway {
    platform: Arc<dyn HostingPlatform>,
    timeout: Duration,
}

impl IdentityGateway {
    pub fn new(platform: Arc<dyn HostingPlatform>, timeout: Duration) -> Self {
        Self { platform, timeout }
    }

    /// Trade an authorization code for a bearer token.
    pub async fn exchange(&self, code: &str, redirect_uri: &str) -> Result<String, DeployError> {
        let exchanged = tokio::time::timeout(
            self.timeout,
            self.platform.exchange_code(code, redirect_uri),
        )
        .await
        .map_err(|_| DeployError::Timeout {
            operation: "token exchange".into(),
        })?;

        match exchanged {
            Ok(token) => Ok(token),
            Err(e) if e.is_timeout() => Err(DeployError::Timeout {
                operation: "token exchange".into(),
            }),
            Err(e) => Err(DeployError::Authentication(e.to_string())),
        }
    }

    /// Look up who `token` belongs to. Failures are logged and reported as
    /// anonymous so the page can still render.
    pub async fn identify(&self, token: &str) -> MeResponse {
        match tokio::time::timeout(self.timeout, self.platform.current_login(token)).await {
            Ok(Ok(login)) => MeResponse::with_login(login),
            Ok(Err(e)) => {
                tracing::warn!("identity lookup failed: {e}");
                MeResponse::anonymous()
            }
            Err(_) => {
                tracing::warn!(
                    "identity lookup timed out after {}s",
                    self.timeout.as_secs()
                );
                MeResponse::anonymous()
            }
        }
    }
}
