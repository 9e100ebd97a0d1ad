pub mod error;
pub mod identity;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod staging;
pub mod upload;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use deployhub_api::oauth::{self, OAuthProviderConfig};
use deployhub_github::HostingPlatform;
use deployhub_runtime_config::ServerConfig;

use identity::IdentityGateway;
use pipeline::{DeployPipeline, PipelineSettings};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub provider: Arc<OAuthProviderConfig>,
    pub identity: Arc<IdentityGateway>,
    pub pipeline: Arc<DeployPipeline>,
}

impl AppState {
    pub fn new(config: ServerConfig, platform: Arc<dyn HostingPlatform>) -> Self {
        let provider = github_provider(&config);
        let timeout = config.deploy.request_timeout();
        let settings = PipelineSettings::from_config(&config);
        Self {
            provider: Arc::new(provider),
            identity: Arc::new(IdentityGateway::new(platform.clone(), timeout)),
            pipeline: Arc::new(DeployPipeline::new(platform, settings)),
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for Arc<ServerConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<OAuthProviderConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.provider.clone()
    }
}

impl FromRef<AppState> for Arc<IdentityGateway> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

impl FromRef<AppState> for Arc<DeployPipeline> {
    fn from_ref(state: &AppState) -> Self {
        state.pipeline.clone()
    }
}

/// GitHub OAuth endpoints for the configured web and API hosts.
pub fn github_provider(config: &ServerConfig) -> OAuthProviderConfig {
    oauth::github_preset(
        &config.oauth.github_url,
        &config.oauth.github_api_url,
        config.oauth.client_id.clone(),
        config.oauth.client_secret.expose().to_string(),
    )
}

/// Build the full HTTP application.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.deploy.max_upload_bytes();

    let mut app = Router::new()
        .route("/health", get(routes::health::health))
        .route("/login", get(routes::auth::login))
        .route("/callback", get(routes::auth::callback))
        .route("/me", get(routes::auth::me))
        .route("/logout", get(routes::auth::logout))
        .route(
            "/upload",
            post(routes::upload::upload).layer(DefaultBodyLimit::max(body_limit)),
        );

    // Serve the browser front end if one is configured
    if let Some(web_dir) = state.config.server.web_dir.as_ref().filter(|d| d.exists()) {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
