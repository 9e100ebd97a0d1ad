use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};

use crate::error::ApiErr;

/// Cookie holding the GitHub bearer token between requests.
pub const TOKEN_COOKIE: &str = "token";

/// Find cookie `name` across every `Cookie` header of a request.
///
/// Empty values count as absent.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value storing `token` for the whole site.
pub fn token_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!("{TOKEN_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value expiring the token cookie.
pub fn clear_token_cookie(secure: bool) -> String {
    let mut cookie = format!("{TOKEN_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Token from the session cookie, if the caller has one.
pub struct SessionToken(pub Option<String>);

impl<S> FromRequestParts<S> for SessionToken
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(read_cookie(&parts.headers, TOKEN_COOKIE)))
    }
}

/// Token from the session cookie; rejects with 401 when there is none.
pub struct RequireSession(pub String);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        read_cookie(&parts.headers, TOKEN_COOKIE)
            .map(Self)
            .ok_or_else(|| ApiErr::unauthorized("Unauthorized"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for cookie in cookies {
            map.append(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        map
    }

    #[test]
    fn reads_token_among_other_cookies() {
        let map = headers(&["theme=dark; token=gho_abc; lang=en"]);
        assert_eq!(read_cookie(&map, TOKEN_COOKIE).as_deref(), Some("gho_abc"));
    }

    #[test]
    fn reads_token_from_second_cookie_header() {
        let map = headers(&["theme=dark", "token=gho_xyz"]);
        assert_eq!(read_cookie(&map, TOKEN_COOKIE).as_deref(), Some("gho_xyz"));
    }

    #[test]
    fn missing_or_empty_token_is_none() {
        assert!(read_cookie(&headers(&[]), TOKEN_COOKIE).is_none());
        assert!(read_cookie(&headers(&["token="]), TOKEN_COOKIE).is_none());
        assert!(read_cookie(&headers(&["mytoken=abc"]), TOKEN_COOKIE).is_none());
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            token_cookie("gho_abc", false),
            "token=gho_abc; Path=/; HttpOnly; SameSite=Lax"
        );
        assert!(token_cookie("gho_abc", true).ends_with("; Secure"));
        assert!(clear_token_cookie(false).contains("Max-Age=0"));
        assert!(clear_token_cookie(false).starts_with("token=;"));
    }
}
