//! Interceptor pipeline over the real HTTP transport.

use std::sync::Arc;
use std::time::Duration;

use http::HeaderValue;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use imagedrive_client::{
    ApiClient, ApiError, ApiRequest, ClientConfig, CredentialStore, ErrorBody, HttpTransport,
    InvalidationPolicy, Transport,
};

use super::test_utils::*;

// =============================================================================
// Bearer Injection
// =============================================================================

#[tokio::test]
async fn test_bearer_header_attached_from_store() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/files")))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestClient::with_token(&server, InvalidationPolicy::ClearSession, "T1").await;
    let response = client.session.client().get("/files").await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
}

#[tokio::test]
async fn test_no_header_without_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/health")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;

    let client = TestClient::connect(&server, InvalidationPolicy::ClearSession).await;
    client.session.client().get("/health").await.unwrap();

    assert_eq!(authorization_of(&server, 0).await, None);
}

#[tokio::test]
async fn test_token_written_elsewhere_is_picked_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok(json!([]))))
        .mount(&server)
        .await;

    let client = TestClient::connect(&server, InvalidationPolicy::ClearSession).await;
    client.session.client().get("/files").await.unwrap();

    // The header is read from the store on every request
    client.store.set("T9").unwrap();
    client.session.client().get("/files").await.unwrap();

    assert_eq!(authorization_of(&server, 0).await, None);
    assert_eq!(authorization_of(&server, 1).await.as_deref(), Some("Bearer T9"));
}

#[tokio::test]
async fn test_request_otherwise_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(api_path("/files/3")))
        .and(query_param("notify", "false"))
        .and(header("x-request-id", "abc"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestClient::with_token(&server, InvalidationPolicy::ClearSession, "T1").await;
    let request = ApiRequest::patch("/files/3")
        .query("notify", false)
        .header(
            http::HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("abc"),
        )
        .json(&json!({"visibility": "public"}))
        .unwrap();

    let response = client.session.client().execute(request).await.unwrap();
    assert_eq!(response.status.as_u16(), 204);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body, json!({"visibility": "public"}));
}

// =============================================================================
// 401 Invalidation
// =============================================================================

#[tokio::test]
async fn test_any_unauthorized_response_clears_session() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "POST", "/search/text").await;

    let client = TestClient::with_token(&server, InvalidationPolicy::ClearSession, "T1").await;
    let err = client
        .session
        .client()
        .post("/search/text", &json!({"query": "cat", "k": 10}))
        .await
        .unwrap_err();

    assert!(err.is_unauthorized());
    assert_eq!(err.to_string(), "HTTP 401: AUTH_FAILED: invalid token");
    assert_eq!(client.persisted(), None);
    assert!(!client.session.is_authenticated());
}

#[tokio::test]
async fn test_forbidden_does_not_clear_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/files/4")))
        .respond_with(ResponseTemplate::new(403).set_body_json(error_body("FORBIDDEN", "not yours")))
        .mount(&server)
        .await;

    let client = TestClient::with_token(&server, InvalidationPolicy::ClearSession, "T1").await;
    let err = client.session.client().get("/files/4").await.unwrap_err();

    assert_eq!(err.status_code(), Some(403));
    match err {
        ApiError::Status { body, .. } => assert_eq!(body.code(), Some("FORBIDDEN")),
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(client.persisted().as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_next_request_after_401_is_unauthenticated() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "GET", "/files").await;

    let client = TestClient::with_token(&server, InvalidationPolicy::ClearToken, "T1").await;
    let _ = client.session.client().get("/files").await;
    let _ = client.session.client().get("/files").await;

    assert_eq!(authorization_of(&server, 0).await.as_deref(), Some("Bearer T1"));
    assert_eq!(authorization_of(&server, 1).await, None);
}

// =============================================================================
// Transport Failures
// =============================================================================

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/health")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "healthy"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = client_config_with_timeout(&server, Duration::from_millis(50));
    let transport = Arc::new(HttpTransport::new(config).unwrap());
    let client = ApiClient::new(transport);

    let err = client.get("/health").await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(50)));
    assert!(!err.is_unauthorized());
}

#[tokio::test]
async fn test_connection_refused() {
    let config = ClientConfig::resolve(Some("http://127.0.0.1:9/api/v1"), "http://unused").unwrap();
    let transport = Arc::new(HttpTransport::new(config).unwrap());
    assert_eq!(transport.base_url().as_str(), "http://127.0.0.1:9/api/v1");

    let err = ApiClient::new(transport).get("/health").await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}

#[tokio::test]
async fn test_plain_text_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("/health")))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let transport = Arc::new(HttpTransport::new(client_config(&server)).unwrap());
    let err = ApiClient::new(transport).get("/health").await.unwrap_err();

    match err {
        ApiError::Status { code, body } => {
            assert_eq!(code, 502);
            assert_eq!(body, ErrorBody::Text("Bad Gateway".to_string()));
        }
        other => panic!("unexpected error {:?}", other),
    }
}
