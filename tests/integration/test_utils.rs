//! Test utilities for integration tests.
//!
//! A wiremock server stands in for the backend; helpers build a session
//! against it with a credential file in a temporary directory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use imagedrive_client::{
    ClientConfig, CredentialStore, FileCredentialStore, HttpTransport, InvalidationPolicy, Session,
};

/// API prefix the mock backend serves under.
pub const API_PREFIX: &str = "/api/v1";

// =============================================================================
// Backend
// =============================================================================

/// Full mock path for an endpoint.
pub fn api_path(endpoint: &str) -> String {
    format!("{}{}", API_PREFIX, endpoint)
}

/// `{"status":"ok","data":...}`
pub fn ok(data: Value) -> Value {
    json!({ "status": "ok", "data": data })
}

/// `{"status":"error","code":...,"message":...}`
pub fn error_body(code: &str, message: &str) -> Value {
    json!({
        "status": "error",
        "code": code,
        "message": message,
        "trace_id": "trace-1",
    })
}

/// Login that issues `token` for any credentials.
pub async fn mount_login(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path(api_path("/auth/login")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "access_token": token,
            "refresh_token": format!("refresh-{}", token),
            "token_type": "bearer",
        }))))
        .mount(server)
        .await;
}

/// `/auth/me` answering `user` for requests bearing `token`.
pub async fn mount_me(server: &MockServer, token: &str, user_id: i64, username: &str) {
    Mock::given(method("GET"))
        .and(path(api_path("/auth/me")))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!({
            "user_id": user_id,
            "username": username,
        }))))
        .mount(server)
        .await;
}

/// Any request to `endpoint` is rejected with 401.
pub async fn mount_unauthorized(server: &MockServer, http_method: &str, endpoint: &str) {
    Mock::given(method(http_method))
        .and(path(api_path(endpoint)))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(error_body("AUTH_FAILED", "invalid token")),
        )
        .mount(server)
        .await;
}

// =============================================================================
// Client
// =============================================================================

/// A session wired to the mock backend and a credential file on disk.
pub struct TestClient {
    pub session: Session,
    pub store: Arc<FileCredentialStore>,
    _dir: TempDir,
}

impl TestClient {
    pub async fn connect(server: &MockServer, policy: InvalidationPolicy) -> Self {
        Self::connect_with(server, policy, None).await
    }

    /// Start with `token` already persisted, as after an earlier run.
    pub async fn with_token(server: &MockServer, policy: InvalidationPolicy, token: &str) -> Self {
        Self::connect_with(server, policy, Some(token)).await
    }

    async fn connect_with(
        server: &MockServer,
        policy: InvalidationPolicy,
        token: Option<&str>,
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("credentials.json")));
        if let Some(token) = token {
            store.set(token).unwrap();
        }

        let transport = Arc::new(HttpTransport::new(client_config(server)).unwrap());
        let session = Session::connect(transport, store.clone(), policy);

        Self {
            session,
            store,
            _dir: dir,
        }
    }

    /// Token as persisted on disk.
    pub fn persisted(&self) -> Option<String> {
        self.store.get().unwrap()
    }
}

/// Client configuration pointing at the mock backend.
pub fn client_config(server: &MockServer) -> ClientConfig {
    let base = format!("{}{}", server.uri(), API_PREFIX);
    ClientConfig::resolve(Some(&base), "http://unused.invalid").unwrap()
}

/// Same as [`client_config`] with a short timeout.
pub fn client_config_with_timeout(server: &MockServer, timeout: Duration) -> ClientConfig {
    client_config(server).with_timeout(timeout)
}

/// Authorization header of the `n`th request the backend received.
pub async fn authorization_of(server: &MockServer, n: usize) -> Option<String> {
    let requests = server.received_requests().await.unwrap();
    requests[n]
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
