use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use deployhub_api::MeResponse;
use deployhub_api::oauth::{self, OAuthProviderConfig};
use deployhub_runtime_config::ServerConfig;

use crate::error::ApiErr;
use crate::identity::IdentityGateway;
use crate::session::{self, SessionToken};

/// 302 to `location`, optionally setting a cookie on the way.
fn found(location: &str, cookie: Option<String>) -> Response {
    let mut response = (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response();
    if let Some(cookie) = cookie {
        match cookie.parse() {
            Ok(value) => {
                response.headers_mut().insert(header::SET_COOKIE, value);
            }
            Err(_) => return ApiErr::internal("invalid session cookie").into_response(),
        }
    }
    response
}

/// Callback URL GitHub sends the browser back to.
///
/// Uses the configured redirect URI, else derives one from the request host.
fn redirect_uri(config: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(uri) = config.oauth.redirect_uri.as_ref().filter(|u| !u.is_empty()) {
        return uri.clone();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("localhost:{}", config.server.port));
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| *v == "http" || *v == "https")
        .unwrap_or("http");
    format!("{scheme}://{host}/callback")
}

/// GET /login — redirect to the GitHub authorization page.
pub async fn login(
    State(config): State<Arc<ServerConfig>>,
    State(provider): State<Arc<OAuthProviderConfig>>,
    headers: HeaderMap,
) -> Response {
    let url = oauth::build_authorize_url(&provider, &redirect_uri(&config, &headers));
    found(&url, None)
}

/// GET /callback?code=... — exchange the code and store the token cookie.
pub async fn callback(
    State(config): State<Arc<ServerConfig>>,
    State(identity): State<Arc<IdentityGateway>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiErr> {
    if let Some(error) = params.get("error") {
        tracing::info!("authorization denied by provider: {error}");
        return Err(ApiErr::bad_request("Authorization was denied"));
    }
    let code = params
        .get("code")
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiErr::bad_request("Missing code parameter"))?;

    let token = identity
        .exchange(code, &redirect_uri(&config, &headers))
        .await?;
    tracing::info!("user signed in");

    let cookie = session::token_cookie(&token, config.server.cookie_secure);
    Ok(found("/", Some(cookie)))
}

/// GET /me — login of the signed-in user, or `{}`.
pub async fn me(
    State(identity): State<Arc<IdentityGateway>>,
    SessionToken(token): SessionToken,
) -> Json<MeResponse> {
    match token {
        Some(token) => Json(identity.identify(&token).await),
        None => Json(MeResponse::anonymous()),
    }
}

/// GET /logout — forget the token cookie.
pub async fn logout(State(config): State<Arc<ServerConfig>>) -> Response {
    found("/", Some(session::clear_token_cookie(config.server.cookie_secure)))
}
