//! Server runtime configuration.
//!
//! `ServerConfig` is built once at process start: an optional TOML file
//! (`DEPLOYHUB_CONFIG`) provides the base, environment variables override it.
//! Nothing below the binary's `main` reads the environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Env var naming an optional TOML config file.
pub const ENV_CONFIG_PATH: &str = "DEPLOYHUB_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// A string that must never end up in logs. `Debug` prints `<redacted>`.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Top-level server configuration (optionally persisted as TOML).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub oauth: OAuthSettings,
    #[serde(default)]
    pub deploy: DeploySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Static upload page, served as a fallback when present.
    #[serde(default)]
    pub web_dir: Option<PathBuf>,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    #[serde(default = "default_false")]
    pub cookie_secure: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            web_dir: None,
            cookie_secure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthSettings {
    #[serde(default)]
    pub client_id: String,
    #[serde(default, skip_serializing)]
    pub client_secret: Secret,
    /// When unset, the callback URL is derived from the request host.
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default = "default_github_url")]
    pub github_url: String,
    #[serde(default = "default_github_api_url")]
    pub github_api_url: String,
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: Secret::default(),
            redirect_uri: None,
            github_url: default_github_url(),
            github_api_url: default_github_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Parent of the per-request staging directories.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    #[serde(default = "default_cleanup_delay_ms")]
    pub cleanup_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
    /// Append a random suffix to `deployhub-<millis>` repository names.
    #[serde(default = "default_true")]
    pub repo_suffix: bool,
    #[serde(default = "default_committer_name")]
    pub committer_name: String,
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            staging_dir: default_staging_dir(),
            cleanup_delay_ms: default_cleanup_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            git_timeout_secs: default_git_timeout_secs(),
            max_upload_mb: default_max_upload_mb(),
            repo_suffix: true,
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
        }
    }
}

impl DeploySettings {
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl ServerConfig {
    /// Load from the process environment: the file named by
    /// `DEPLOYHUB_CONFIG` (if any), then env overrides, then validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        let path = lookup(ENV_CONFIG_PATH).filter(|s| !s.is_empty());
        Self::load(path.as_deref().map(Path::new), lookup)
    }

    /// Load from an optional TOML file and an env lookup function.
    pub fn load(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| env(key).filter(|s| !s.trim().is_empty());

        if let Some(host) = get("DEPLOYHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&get, "PORT")? {
            self.server.port = port;
        }
        if let Some(dir) = get("DEPLOYHUB_WEB_DIR") {
            self.server.web_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = get("DEPLOYHUB_COOKIE_SECURE") {
            self.server.cookie_secure = parse_bool_flag(Some(&raw), self.server.cookie_secure);
        }

        if let Some(id) = get("CLIENT_ID") {
            self.oauth.client_id = id;
        }
        if let Some(secret) = get("CLIENT_SECRET") {
            self.oauth.client_secret = Secret::new(secret);
        }
        if let Some(uri) = get("REDIRECT_URI") {
            self.oauth.redirect_uri = Some(uri);
        }
        if let Some(url) = get("GITHUB_URL") {
            self.oauth.github_url = url;
        }
        if let Some(url) = get("GITHUB_API_URL") {
            self.oauth.github_api_url = url;
        }

        if let Some(dir) = get("DEPLOYHUB_STAGING_DIR") {
            self.deploy.staging_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var(&get, "DEPLOYHUB_CLEANUP_DELAY_MS")? {
            self.deploy.cleanup_delay_ms = ms;
        }
        if let Some(secs) = parse_var(&get, "DEPLOYHUB_REQUEST_TIMEOUT_SECS")? {
            self.deploy.request_timeout_secs = secs;
        }
        if let Some(secs) = parse_var(&get, "DEPLOYHUB_GIT_TIMEOUT_SECS")? {
            self.deploy.git_timeout_secs = secs;
        }
        if let Some(mb) = parse_var(&get, "DEPLOYHUB_MAX_UPLOAD_MB")? {
            self.deploy.max_upload_mb = mb;
        }
        if let Some(raw) = get("DEPLOYHUB_REPO_SUFFIX") {
            self.deploy.repo_suffix = parse_bool_flag(Some(&raw), self.deploy.repo_suffix);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("CLIENT_ID"));
        }
        if self.oauth.client_secret.is_empty() {
            return Err(ConfigError::Missing("CLIENT_SECRET"));
        }
        if self.deploy.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DEPLOYHUB_REQUEST_TIMEOUT_SECS",
                value: "0".into(),
            });
        }
        if self.deploy.git_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "DEPLOYHUB_GIT_TIMEOUT_SECS",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(None),
    }
}

/// Parse a human-friendly boolean env flag value.
///
/// Accepted truthy values:
/// - `1`
/// - `true`
/// - `yes`
/// - `on`
pub fn parse_bool_flag(raw: Option<&str>, default: bool) -> bool {
    raw.map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
    .unwrap_or(default)
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_host() -> String {
    "0.0.0.0".into()
}

fn default_port() -> u16 {
    3000
}

fn default_github_url() -> String {
    "https://github.com".into()
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("deployhub")
}

fn default_cleanup_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_git_timeout_secs() -> u64 {
    120
}

fn default_max_upload_mb() -> usize {
    100
}

fn default_committer_name() -> String {
    "DeployHub".into()
}

fn default_committer_email() -> String {
    "deployhub@users.noreply.github.com".into()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parses_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool_flag(Some(value), false));
        }
    }

    #[test]
    fn parses_falsy_values() {
        for value in ["0", "false", "no", "off", ""] {
            assert!(!parse_bool_flag(Some(value), true));
        }
    }

    #[test]
    fn env_supplies_credentials_and_port() {
        let config = ServerConfig::load(
            None,
            env_of(&[
                ("PORT", "8080"),
                ("CLIENT_ID", "cid"),
                ("CLIENT_SECRET", "csecret"),
                ("REDIRECT_URI", "https://deploy.example/callback"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.oauth.client_id, "cid");
        assert_eq!(config.oauth.client_secret.expose(), "csecret");
        assert_eq!(
            config.oauth.redirect_uri.as_deref(),
            Some("https://deploy.example/callback")
        );
        assert_eq!(config.deploy.cleanup_delay(), Duration::from_secs(1));
        assert!(config.deploy.repo_suffix);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = ServerConfig::load(None, env_of(&[("CLIENT_ID", "cid")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLIENT_SECRET")));

        let err = ServerConfig::load(None, env_of(&[("CLIENT_SECRET", "s")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLIENT_ID")));
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = ServerConfig::load(
            None,
            env_of(&[("CLIENT_ID", "c"), ("CLIENT_SECRET", "s"), ("PORT", "http")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 4000
cookie_secure = true

[oauth]
client_id = "from-file"
client_secret = "file-secret"

[deploy]
cleanup_delay_ms = 250
repo_suffix = false
"#
        )
        .unwrap();

        let config = ServerConfig::load(
            Some(file.path()),
            env_of(&[("CLIENT_ID", "from-env"), ("DEPLOYHUB_REPO_SUFFIX", "yes")]),
        )
        .unwrap();

        assert_eq!(config.server.port, 4000);
        assert!(config.server.cookie_secure);
        assert_eq!(config.oauth.client_id, "from-env");
        assert_eq!(config.oauth.client_secret.expose(), "file-secret");
        assert_eq!(config.deploy.cleanup_delay_ms, 250);
        assert!(config.deploy.repo_suffix);
        assert_eq!(config.oauth.github_api_url, "https://api.github.com");
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let config = ServerConfig::load(
            None,
            env_of(&[("CLIENT_ID", "cid"), ("CLIENT_SECRET", "top-secret-value")]),
        )
        .unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("top-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let err = ServerConfig::load(
            None,
            env_of(&[
                ("CLIENT_ID", "c"),
                ("CLIENT_SECRET", "s"),
                ("DEPLOYHUB_GIT_TIMEOUT_SECS", "0"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DEPLOYHUB_GIT_TIMEOUT_SECS",
                ..
            }
        ));
    }
}
