use std::sync::Arc;

use anyhow::Context;

use deployhub_github::GitHubClient;
use deployhub_runtime_config::ServerConfig;
use deployhub_server::{AppState, github_provider, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deployhub_server=info,deployhub_git_native=info,deployhub_github=info,tower_http=info"
                    .into()
            }),
        )
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;

    tokio::fs::create_dir_all(&config.deploy.staging_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create staging directory {}",
                config.deploy.staging_dir.display()
            )
        })?;
    tracing::info!("staging directory: {}", config.deploy.staging_dir.display());

    let client = GitHubClient::new(
        github_provider(&config),
        &config.oauth.github_api_url,
        config.deploy.request_timeout(),
    )?;
    tracing::info!("GitHub API: {}", config.oauth.github_api_url);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, Arc::new(client));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("starting server at http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
