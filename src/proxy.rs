//! Development reverse proxy.
//!
//! Serves on a local port and forwards everything under the API prefix to
//! the backend, so a client running against `http://127.0.0.1:5173/api/v1`
//! reaches `http://127.0.0.1:5000/api/v1` without cross-origin trouble.
//! Not meant for production.
//!
//! # Route Structure
//!
//! ```text
//! /api/v1, /api/v1/*   - Forwarded verbatim (method, path, query, headers, body)
//! anything else        - 404
//! ```

use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use url::Url;

use crate::client::{DEFAULT_API_BASE, DEFAULT_ORIGIN, DEFAULT_TIMEOUT};

/// Default listen address for the proxy.
pub const DEFAULT_PROXY_LISTEN: &str = "127.0.0.1:5173";

/// Largest request body forwarded upstream (uploads included).
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the dev proxy.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address to bind, `host:port`
    pub listen: String,

    /// Backend origin requests are forwarded to
    pub upstream: Url,

    /// Path prefix that is forwarded
    pub prefix: String,

    /// Per-request timeout towards the backend
    pub timeout: Duration,

    pub max_body_bytes: usize,

    pub enable_tracing: bool,
}

impl ProxyConfig {
    pub fn new(upstream: Url) -> Self {
        Self {
            listen: DEFAULT_PROXY_LISTEN.to_string(),
            upstream,
            prefix: DEFAULT_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            enable_tracing: true,
        }
    }

    /// Local dev setup: forward `/api/v1` to `127.0.0.1:5000`.
    pub fn local() -> Result<Self, String> {
        let upstream = Url::parse(DEFAULT_ORIGIN).map_err(|e| e.to_string())?;
        Ok(Self::new(upstream))
    }

    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Prefix with a leading slash and no trailing slash.
    fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        format!("/{}", trimmed)
    }
}

// =============================================================================
// Router
// =============================================================================

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    upstream: String,
    max_body_bytes: usize,
}

#[derive(Debug, Serialize)]
struct ProxyErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

fn proxy_error(status: StatusCode, error: &'static str, message: String) -> Response {
    let body = ProxyErrorResponse {
        error,
        message,
        status: status.as_u16(),
    };
    (status, Json(body)).into_response()
}

/// Build the proxy router.
pub fn create_proxy_router(config: &ProxyConfig) -> Result<Router, String> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    let state = ProxyState {
        client,
        upstream: config.upstream.as_str().trim_end_matches('/').to_string(),
        max_body_bytes: config.max_body_bytes,
    };

    let prefix = config.normalized_prefix();
    let router = Router::new()
        .route(&prefix, any(forward))
        .route(&format!("{}/{{*rest}}", prefix), any(forward))
        .fallback(not_found)
        .with_state(state)
        .layer(build_cors_layer());

    if config.enable_tracing {
        Ok(router.layer(TraceLayer::new_for_http()))
    } else {
        Ok(router)
    }
}

/// Bind and serve until the process is stopped.
pub async fn serve_proxy(config: ProxyConfig) -> Result<(), String> {
    let router = create_proxy_router(&config)?;
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", config.listen, e))?;

    axum::serve(listener, router)
        .await
        .map_err(|e| format!("Proxy server error: {}", e))
}

fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any)
        .max_age(Duration::from_secs(86400))
}

async fn not_found() -> Response {
    proxy_error(
        StatusCode::NOT_FOUND,
        "not_found",
        "Only API paths are proxied".to_string(),
    )
}

async fn forward(State(state): State<ProxyState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let target = format!("{}{}", state.upstream, path_and_query);

    let body = match to_bytes(body, state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            return proxy_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                e.to_string(),
            )
        }
    };

    debug!(method = %parts.method, url = %target, "Forwarding request");

    let upstream = state
        .client
        .request(parts.method.clone(), target.as_str())
        .headers(forwardable_headers(&parts.headers, true))
        .body(body)
        .send()
        .await;

    let upstream = match upstream {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            warn!(url = %target, "Upstream timed out");
            return proxy_error(StatusCode::GATEWAY_TIMEOUT, "gateway_timeout", e.to_string());
        }
        Err(e) => {
            warn!(url = %target, "Upstream unreachable: {}", e);
            return proxy_error(StatusCode::BAD_GATEWAY, "bad_gateway", e.to_string());
        }
    };

    let status = upstream.status();
    let headers = forwardable_headers(upstream.headers(), false);
    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return proxy_error(StatusCode::BAD_GATEWAY, "bad_gateway", e.to_string()),
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Copy headers minus hop-by-hop ones and the length, which is recomputed.
/// `Host` is dropped on the way upstream so it matches the backend.
fn forwardable_headers(headers: &HeaderMap, outgoing: bool) -> HeaderMap {
    let mut forwarded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let skip = HOP_BY_HOP.contains(name)
            || *name == header::CONTENT_LENGTH
            || name.as_str() == "keep-alive"
            || (outgoing && *name == header::HOST);
        if !skip {
            forwarded.append(name.clone(), value.clone());
        }
    }
    forwarded
}
