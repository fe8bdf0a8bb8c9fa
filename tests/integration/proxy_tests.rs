//! Dev proxy forwarding to a mock backend.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::json;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use imagedrive_client::{create_proxy_router, ProxyConfig};

use super::test_utils::*;

fn proxy_to(server: &MockServer) -> axum::Router {
    let upstream = Url::parse(&server.uri()).unwrap();
    create_proxy_router(&ProxyConfig::new(upstream).with_tracing(false)).unwrap()
}

#[tokio::test]
async fn test_forwards_method_path_query_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("/search/text")))
        .and(query_param("debug", "1"))
        .and(header_eq("authorization", "Bearer T1"))
        .and(body_json(json!({"query": "cat", "k": 5})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-trace-id", "trace-9")
                .set_body_json(ok(json!({"results": []}))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/search/text?debug=1")
        .header(header::HOST, "localhost:5173")
        .header(header::AUTHORIZATION, "Bearer T1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"query": "cat", "k": 5}).to_string()))
        .unwrap();

    let response = proxy_to(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-trace-id").unwrap(), "trace-9");

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");

    // Host is rewritten for the backend
    let received = server.received_requests().await.unwrap();
    let host = received[0]
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_ne!(host, "localhost:5173");
}

#[tokio::test]
async fn test_backend_errors_pass_through() {
    let server = MockServer::start().await;
    mount_unauthorized(&server, "GET", "/auth/me").await;

    let request = Request::builder()
        .uri("/api/v1/auth/me")
        .body(Body::empty())
        .unwrap();

    let response = proxy_to(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "AUTH_FAILED");
}

#[tokio::test]
async fn test_prefix_root_is_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(API_PREFIX))
        .respond_with(ResponseTemplate::new(200).set_body_string("api root"))
        .expect(1)
        .mount(&server)
        .await;

    let request = Request::builder()
        .uri("/api/v1")
        .body(Body::empty())
        .unwrap();

    let response = proxy_to(&server).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_other_paths_are_not_forwarded() {
    let server = MockServer::start().await;

    for uri in ["/", "/upload", "/api/v2/health", "/api/v1x"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = proxy_to(&server).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "uri {}", uri);
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start().await;
    let upstream = Url::parse(&server.uri()).unwrap();
    let mut config = ProxyConfig::new(upstream).with_tracing(false);
    config.max_body_bytes = 16;
    let router = create_proxy_router(&config).unwrap();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/files/upload")
        .body(Body::from(vec![0u8; 64]))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(server.received_requests().await.unwrap().is_empty());
}
