use std::fmt;

/// User name GitHub expects alongside an OAuth token in HTTPS remotes.
const TOKEN_USER: &str = "x-access-token";

/// A push URL with the bearer token embedded as basic-auth credentials.
///
/// This is the only place the token is spliced into a URL. `Display` and
/// `Debug` print the redacted form; the real URL is only reachable through
/// [`AuthenticatedRemote::expose_url`].
#[derive(Clone)]
pub struct AuthenticatedRemote {
    url: String,
    redacted: String,
    secrets: Vec<String>,
}

impl AuthenticatedRemote {
    /// Build the push URL for `clone_url`.
    ///
    /// HTTP(S) URLs get `x-access-token:<token>@` in place of any existing
    /// userinfo. Other remotes (local paths, `file://`, ssh) are used as-is
    /// and rely on ambient credentials.
    pub fn new(clone_url: &str, token: &str) -> Self {
        let encoded = urlencoding::encode(token).into_owned();
        let mut secrets = vec![token.to_string()];
        if encoded != token {
            secrets.push(encoded.clone());
        }
        secrets.retain(|s| !s.is_empty());

        let url = match split_scheme(clone_url) {
            Some((scheme, rest)) if is_http(scheme) && !token.is_empty() => {
                format!("{scheme}://{TOKEN_USER}:{encoded}@{}", strip_userinfo(rest))
            }
            _ => clone_url.to_string(),
        };

        Self {
            redacted: redact_userinfo(&url),
            url,
            secrets,
        }
    }

    /// The URL including credentials. Only hand this to git itself.
    pub fn expose_url(&self) -> &str {
        &self.url
    }

    /// The URL with credentials removed, safe to log.
    pub fn redacted(&self) -> &str {
        &self.redacted
    }

    /// Replace every occurrence of the embedded token in `text`.
    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), "***");
        }
        out
    }

    pub(crate) fn secrets(&self) -> &[String] {
        &self.secrets
    }
}

impl fmt::Display for AuthenticatedRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted)
    }
}

impl fmt::Debug for AuthenticatedRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthenticatedRemote")
            .field(&self.redacted)
            .finish()
    }
}

/// Remove `user[:password]@` from a `scheme://` URL. Other strings pass
/// through unchanged.
pub fn redact_userinfo(url: &str) -> String {
    match split_scheme(url) {
        Some((scheme, rest)) => format!("{scheme}://{}", strip_userinfo(rest)),
        None => url.to_string(),
    }
}

fn split_scheme(url: &str) -> Option<(&str, &str)> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+') {
        return None;
    }
    Some((scheme, rest))
}

fn is_http(scheme: &str) -> bool {
    scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("http")
}

fn strip_userinfo(rest: &str) -> &str {
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => &rest[at + 1..],
        None => rest,
    }
}
