use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{ApiError, ErrorBody};

/// Base address used when none is configured.
pub const DEFAULT_API_BASE: &str = "/api/v1";

/// Origin a relative base address is resolved against.
pub const DEFAULT_ORIGIN: &str = "http://127.0.0.1:5000";

/// Per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// Configuration
// =============================================================================

/// Transport configuration: where the backend lives and how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Absolute base URL; endpoint paths are appended to its path
    pub base_url: Url,

    /// Upper bound for a whole request, connect to last body byte
    pub timeout: Duration,
}

impl ClientConfig {
    /// Create a configuration for an absolute base URL.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Resolve the base address once at startup.
    ///
    /// `api_base` may be absolute (`https://host/api/v1`) or a path
    /// (`/api/v1`); a path is joined onto `origin`. A missing or blank
    /// `api_base` falls back to [`DEFAULT_API_BASE`].
    pub fn resolve(api_base: Option<&str>, origin: &str) -> Result<Self, String> {
        let base = api_base
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_API_BASE);

        if let Ok(url) = Url::parse(base) {
            if matches!(url.scheme(), "http" | "https") {
                return Ok(Self::new(url));
            }
            return Err(format!("Unsupported API base scheme: {}", url.scheme()));
        }

        let mut url =
            Url::parse(origin).map_err(|e| format!("Invalid origin '{}': {}", origin, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("Unsupported origin scheme: {}", url.scheme()));
        }

        let path = if base.starts_with('/') {
            base.to_string()
        } else {
            format!("/{}", base)
        };
        url.set_path(&path);
        url.set_query(None);

        Ok(Self::new(url))
    }

    /// Override the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full URL for an endpoint path, keeping the base path as a prefix.
    ///
    /// `/api/v1` + `/auth/me` → `/api/v1/auth/me`.
    pub fn endpoint(&self, path: &str, query: &[(String, String)]) -> Url {
        let mut url = self.base_url.clone();
        let prefix = url.path().trim_end_matches('/').to_string();
        let suffix = path.trim_start_matches('/');
        url.set_path(&format!("{}/{}", prefix, suffix));

        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        url
    }
}

// =============================================================================
// Request / Response
// =============================================================================

/// A single file sent as one multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartFile {
    /// Form field name (the backend expects `file`)
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartFile),
}

/// Description of a request to send: method, path, headers, body.
///
/// `path` is relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl ApiRequest {
    /// Create a request with no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a per-call header, replacing any previous value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Attach a single-file multipart body.
    pub fn multipart(mut self, file: MultipartFile) -> Self {
        self.body = RequestBody::Multipart(file);
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Sends a request and returns the raw response.
///
/// Implementations map non-2xx statuses to [`ApiError::Status`], network
/// failures to [`ApiError::Transport`] and elapsed deadlines to
/// [`ApiError::Timeout`]. They never retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Base URL requests are resolved against (for logging).
    fn base_url(&self) -> &Url;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn map_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.config.endpoint(&request.path, &request.query);
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers);

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(file) => {
                let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                    .file_name(file.file_name)
                    .mime_str(&file.mime_type)
                    .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
                builder.multipart(reqwest::multipart::Form::new().part(file.field, part))
            }
        };

        let response = builder.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "Request completed"
        );

        if !status.is_success() {
            return Err(ApiError::Status {
                code: status.as_u16(),
                body: ErrorBody::parse(&body),
            });
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn base_url(&self) -> &Url {
        &self.config.base_url
    }
}
