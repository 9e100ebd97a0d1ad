use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, header, multipart};
use serde_json::{Value, json};

use deployhub_git_native::{ops, test_utils::init_bare_remote};
use deployhub_github::{
    CreatedRepository, HostingPlatform, PagesSource, PlatformError, RepositoryOwner,
};
use deployhub_runtime_config::{Secret, ServerConfig};
use deployhub_server::{AppState, router};

const TOKEN: &str = "gho_stub";
const OWNER: &str = "octocat";

/// In-process stand-in for GitHub. Created repositories are bare repos on
/// disk so pushes are real.
#[derive(Default)]
struct StubPlatform {
    remotes: PathBuf,
    fail_create: bool,
    fail_push: bool,
    fail_pages: bool,
    created: Mutex<Vec<String>>,
    pages: Mutex<Vec<(String, String, PagesSource)>>,
}

impl StubPlatform {
    fn new(remotes: &Path) -> Self {
        Self {
            remotes: remotes.to_path_buf(),
            ..Self::default()
        }
    }

    fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    fn remote_for(&self, repo: &str) -> PathBuf {
        self.remotes.join(repo).join("remote.git")
    }
}

#[async_trait]
impl HostingPlatform for StubPlatform {
    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, PlatformError> {
        if code == "good-code" && redirect_uri.ends_with("/callback") {
            Ok(TOKEN.into())
        } else {
            Err(PlatformError::Rejected("bad_verification_code".into()))
        }
    }

    async fn current_login(&self, token: &str) -> Result<String, PlatformError> {
        if token == TOKEN {
            Ok(OWNER.into())
        } else {
            Err(PlatformError::Status {
                endpoint: "user lookup",
                status: 401,
                message: "Bad credentials".into(),
            })
        }
    }

    async fn create_repository(
        &self,
        token: &str,
        name: &str,
    ) -> Result<CreatedRepository, PlatformError> {
        assert_eq!(token, TOKEN);
        self.created.lock().unwrap().push(name.to_string());
        if self.fail_create {
            return Err(PlatformError::Status {
                endpoint: "create repository",
                status: 422,
                message: "name already exists on this account".into(),
            });
        }
        let parent = self.remotes.join(name);
        std::fs::create_dir_all(&parent).unwrap();
        let remote = if self.fail_push {
            parent.join("missing.git")
        } else {
            init_bare_remote(&parent)
        };
        Ok(CreatedRepository {
            name: name.to_string(),
            clone_url: remote.to_str().unwrap().to_string(),
            html_url: format!("https://github.com/{OWNER}/{name}"),
            owner: RepositoryOwner {
                login: OWNER.into(),
            },
        })
    }

    async fn enable_pages(
        &self,
        _token: &str,
        owner: &str,
        repo: &str,
        source: &PagesSource,
    ) -> Result<(), PlatformError> {
        self.pages
            .lock()
            .unwrap()
            .push((owner.to_string(), repo.to_string(), source.clone()));
        if self.fail_pages {
            return Err(PlatformError::Status {
                endpoint: "enable pages",
                status: 422,
                message: "Pages are not available for this repository".into(),
            });
        }
        Ok(())
    }
}

struct TestApp {
    base: String,
    staging: PathBuf,
    platform: Arc<StubPlatform>,
    client: reqwest::Client,
    _tmp: tempfile::TempDir,
}

impl TestApp {
    async fn spawn() -> Self {
        Self::spawn_with(|_| {}).await
    }

    async fn spawn_with(tweak: impl FnOnce(&mut StubPlatform)) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let staging = tmp.path().join("staging");
        let mut platform = StubPlatform::new(&tmp.path().join("remotes"));
        tweak(&mut platform);
        let platform = Arc::new(platform);

        let mut config = ServerConfig::default();
        config.oauth.client_id = "client-123".into();
        config.oauth.client_secret = Secret::new("client-secret");
        config.oauth.github_url = "https://github.example".into();
        config.deploy.staging_dir = staging.clone();
        config.deploy.cleanup_delay_ms = 10;
        config.deploy.git_timeout_secs = 60;

        let app = router(AppState::new(config, platform.clone()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self {
            base: format!("http://{addr}"),
            staging,
            platform,
            client,
            _tmp: tmp,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str, cookie: Option<&str>) -> reqwest::Response {
        let mut req = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        req.send().await.unwrap()
    }

    async fn upload(&self, cookie: Option<&str>, files: &[(&str, &[u8])]) -> reqwest::Response {
        let mut form = multipart::Form::new().percent_encode_noop();
        for (path, body) in files {
            form = form.part(
                "files",
                multipart::Part::bytes(body.to_vec()).file_name(path.to_string()),
            );
        }
        let mut req = self.client.post(self.url("/upload")).multipart(form);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        req.send().await.unwrap()
    }

    async fn staging_entries(&self) -> usize {
        match std::fs::read_dir(&self.staging) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Wait past the cleanup delay, then count what is left in staging.
    async fn staging_after_cleanup(&self) -> usize {
        tokio::time::sleep(Duration::from_millis(500)).await;
        self.staging_entries().await
    }
}

fn session_cookie() -> String {
    format!("token={TOKEN}")
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::spawn().await;
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn login_redirects_to_github_authorize() {
    let app = TestApp::spawn().await;
    let resp = app.get("/login", None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);

    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://github.example/login/oauth/authorize?"));
    assert!(location.contains("client_id=client-123"));
    assert!(location.contains("scope=repo"));
    let callback = encoded_callback(&app.base);
    assert!(location.contains(&callback), "{location}");
    assert!(!location.contains("client-secret"));
}

fn encoded_callback(base: &str) -> String {
    format!("{base}/callback")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

#[tokio::test]
async fn callback_without_code_is_bad_request() {
    let app = TestApp::spawn().await;
    let resp = app.get("/callback", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());

    let resp = app.get("/callback?error=access_denied", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_with_rejected_code_fails_without_cookie() {
    let app = TestApp::spawn().await;
    let resp = app.get("/callback?code=stale", None).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Authentication failed"}));
}

#[tokio::test]
async fn callback_sets_token_cookie_and_redirects_home() {
    let app = TestApp::spawn().await;
    let resp = app.get("/callback?code=good-code", None).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], "/");

    let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with(&format!("token={TOKEN};")));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Path=/"));
}

#[tokio::test]
async fn me_reports_login_or_empty_object() {
    let app = TestApp::spawn().await;

    let anonymous: Value = app.get("/me", None).await.json().await.unwrap();
    assert_eq!(anonymous, json!({}));

    let resp = app.get("/me", Some(&session_cookie())).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me, json!({"login": OWNER}));

    let revoked = app.get("/me", Some("token=gho_revoked")).await;
    assert_eq!(revoked.status(), StatusCode::OK);
    assert_eq!(revoked.json::<Value>().await.unwrap(), json!({}));
}

#[tokio::test]
async fn logout_expires_cookie() {
    let app = TestApp::spawn().await;
    let resp = app.get("/logout", Some(&session_cookie())).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], "/");
    let cookie = resp.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Max-Age=0"));

    // The browser drops the cookie, so the next lookup is anonymous.
    let me: Value = app.get("/me", None).await.json().await.unwrap();
    assert_eq!(me, json!({}));
}

#[tokio::test]
async fn upload_without_session_is_unauthorized() {
    let app = TestApp::spawn().await;
    let resp = app.upload(None, &[("index.html", b"<h1>hi</h1>".as_slice())]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Unauthorized"}));

    assert!(app.platform.created().is_empty());
    assert_eq!(app.staging_entries().await, 0);
}

#[tokio::test]
async fn upload_without_files_is_bad_request() {
    let app = TestApp::spawn().await;
    // What a browser sends for a file input with nothing selected.
    let form = multipart::Form::new()
        .text("note", "nothing picked")
        .part("files", multipart::Part::bytes(Vec::new()).file_name(""));
    let resp = app
        .client
        .post(app.url("/upload"))
        .header(header::COOKIE, session_cookie())
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "No files were uploaded."}));

    assert!(app.platform.created().is_empty());
    assert_eq!(app.staging_entries().await, 0);
}

#[tokio::test]
async fn upload_rejects_escaping_paths() {
    let app = TestApp::spawn().await;
    let resp = app
        .upload(Some(&session_cookie()), &[("../outside.html", b"x".as_slice())])
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(app.platform.created().is_empty());
    assert_eq!(app.staging_entries().await, 0);
}

#[tokio::test]
async fn upload_rejects_windows_aliases_of_git_dir() {
    let app = TestApp::spawn().await;
    for path in ["git~1/config", ".git./x", ".git /x", ".GIT/x"] {
        let resp = app
            .upload(
                Some(&session_cookie()),
                &[("index.html", b"ok".as_slice()), (path, b"x".as_slice())],
            )
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{path:?}");
    }
    assert!(app.platform.created().is_empty());
    assert_eq!(app.staging_entries().await, 0);
}

#[tokio::test]
async fn upload_keeps_line_endings_despite_uploaded_gitattributes() {
    let app = TestApp::spawn().await;
    let files: &[(&str, &[u8])] = &[
        (".gitattributes", b"* text=auto\n"),
        ("index.html", b"<h1>hi</h1>\r\n<p>x</p>\r\n"),
    ];
    let resp = app.upload(Some(&session_cookie()), files).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let created = app.platform.created();
    assert_eq!(created.len(), 1);
    let pushed = ops::read_branch_files(&app.platform.remote_for(&created[0]), "main").unwrap();
    assert_eq!(pushed.len(), files.len());
    for (path, body) in files {
        assert_eq!(pushed[*path].as_slice(), *body, "{path} differs");
    }
}

#[tokio::test]
async fn upload_publishes_files_and_returns_pages_url() {
    let app = TestApp::spawn().await;
    let files: &[(&str, &[u8])] = &[
        ("index.html", b"<h1>hello</h1>"),
        ("css/site.css", b"body { color: red }"),
        ("img/pixel.bin", &[0, 1, 2, 255]),
    ];
    let resp = app.upload(Some(&session_cookie()), files).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    let created = app.platform.created();
    assert_eq!(created.len(), 1);
    let repo = &created[0];
    assert!(repo.starts_with("deployhub-"), "{repo}");
    assert_eq!(
        body,
        json!({"url": format!("https://{OWNER}.github.io/{repo}/")})
    );

    let pushed = ops::read_branch_files(&app.platform.remote_for(repo), "main").unwrap();
    assert_eq!(pushed.len(), files.len());
    for (path, bytes) in files {
        assert_eq!(pushed[*path].as_slice(), *bytes, "{path} differs");
    }

    let pages = app.platform.pages.lock().unwrap().clone();
    assert_eq!(
        pages,
        vec![(OWNER.to_string(), repo.clone(), PagesSource::new("main", "/"))]
    );

    assert_eq!(app.staging_after_cleanup().await, 0);
}

#[tokio::test]
async fn concurrent_uploads_get_distinct_repositories() {
    let app = TestApp::spawn().await;
    let cookie = session_cookie();
    let files_a = [("index.html", b"a".as_slice())];
    let files_b = [("index.html", b"b".as_slice())];
    let (a, b) = tokio::join!(
        app.upload(Some(&cookie), &files_a),
        app.upload(Some(&cookie), &files_b),
    );
    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);

    let created = app.platform.created();
    assert_eq!(created.len(), 2);
    assert_ne!(created[0], created[1]);
    assert_eq!(app.staging_after_cleanup().await, 0);
}

#[tokio::test]
async fn repository_creation_failure_stops_before_pages() {
    let app = TestApp::spawn_with(|p| p.fail_create = true).await;
    let resp = app
        .upload(Some(&session_cookie()), &[("index.html", b"x".as_slice())])
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body.get("repository").is_none());

    assert!(app.platform.pages.lock().unwrap().is_empty());
    assert_eq!(app.staging_after_cleanup().await, 0);
}

#[tokio::test]
async fn push_failure_is_reported_and_staging_cleaned() {
    let app = TestApp::spawn_with(|p| p.fail_push = true).await;
    let resp = app
        .upload(Some(&session_cookie()), &[("index.html", b"x".as_slice())])
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"error": "Failed to publish files (push)"}));

    assert_eq!(app.platform.created().len(), 1);
    assert!(app.platform.pages.lock().unwrap().is_empty());
    assert_eq!(app.staging_after_cleanup().await, 0);
}

#[tokio::test]
async fn pages_failure_reports_the_pushed_repository() {
    let app = TestApp::spawn_with(|p| p.fail_pages = true).await;
    let resp = app
        .upload(Some(&session_cookie()), &[("index.html", b"<p>kept</p>".as_slice())])
        .await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = resp.json().await.unwrap();

    let repo = app.platform.created().remove(0);
    assert_eq!(
        body["repository"],
        format!("https://github.com/{OWNER}/{repo}")
    );
    assert!(!body.to_string().contains(TOKEN));

    let pushed = ops::read_branch_files(&app.platform.remote_for(&repo), "main").unwrap();
    assert_eq!(pushed["index.html"], b"<p>kept</p>");
    assert_eq!(app.staging_after_cleanup().await, 0);
}
