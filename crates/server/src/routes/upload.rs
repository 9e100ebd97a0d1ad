use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};

use deployhub_api::DeployResponse;

use crate::error::ApiErr;
use crate::pipeline::DeployPipeline;
use crate::session::RequireSession;
use crate::upload;

/// POST /upload — publish the uploaded files as a new Pages site.
///
/// Multipart body with one `files` part per file; each part's filename is
/// the path within the site.
pub async fn upload(
    State(pipeline): State<Arc<DeployPipeline>>,
    RequireSession(token): RequireSession,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DeployResponse>, ApiErr> {
    let multipart = multipart.map_err(|e| {
        tracing::info!("rejected upload body: {e}");
        ApiErr::bad_request("No files were uploaded.")
    })?;

    let batch = upload::read_multipart(multipart).await?;
    let deployment = pipeline.deploy(&token, batch).await?;
    tracing::info!(
        "deployed {} ({})",
        deployment.repository.html_url,
        deployment.commit_id
    );

    Ok(Json(DeployResponse {
        url: deployment.url,
    }))
}
