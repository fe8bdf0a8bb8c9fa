use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status code the backend uses for a rejected or missing bearer token.
pub const UNAUTHORIZED: u16 = 401;

/// Error envelope returned by the backend for non-2xx responses.
///
/// ```text
/// {"status": "error", "code": "AUTH_FAILED", "message": "...", "trace_id": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendError {
    /// Always `"error"` for well-formed envelopes
    #[serde(default)]
    pub status: String,

    /// Machine-readable error code (e.g. `AUTH_FAILED`, `INVALID_QUERY`)
    #[serde(default)]
    pub code: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,

    /// Optional structured details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Request-scoped trace identifier assigned by the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
}

/// Parsed body of a failed HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorBody {
    /// The backend's JSON error envelope
    Envelope(BackendError),

    /// Any other non-empty body, kept as text
    Text(String),

    /// No body at all
    Empty,
}

impl ErrorBody {
    /// Parse a raw response body into the most specific representation.
    pub fn parse(raw: &[u8]) -> Self {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return ErrorBody::Empty;
        }

        match serde_json::from_slice::<BackendError>(raw) {
            Ok(envelope) if !envelope.code.is_empty() || !envelope.message.is_empty() => {
                ErrorBody::Envelope(envelope)
            }
            _ => ErrorBody::Text(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    /// Backend error code, if the body was an envelope.
    pub fn code(&self) -> Option<&str> {
        match self {
            ErrorBody::Envelope(e) => Some(e.code.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorBody::Envelope(e) if e.code.is_empty() => write!(f, "{}", e.message),
            ErrorBody::Envelope(e) => write!(f, "{}: {}", e.code, e.message),
            ErrorBody::Text(text) => write!(f, "{}", text),
            ErrorBody::Empty => write!(f, "<empty body>"),
        }
    }
}

/// Errors produced by the HTTP client and its interceptor pipeline.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Network failure: connection refused, DNS, TLS, reset
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The backend answered with a non-2xx status
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: ErrorBody },

    /// The request was rejected locally before dispatch
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A 2xx response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status code, for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for failures where no HTTP response arrived (network or timeout).
    pub fn is_transport(&self) -> bool {
        matches!(self, ApiError::Transport(_) | ApiError::Timeout(_))
    }

    /// True when the backend rejected the bearer credential (HTTP 401).
    ///
    /// After the pipeline has processed such an error the persisted token is
    /// already gone; callers should treat it as "please log in again".
    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(UNAUTHORIZED)
    }
}

/// Errors from a credential store backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("Credential store I/O error: {0}")]
    Io(String),

    /// The backing file exists but is not a valid credential document
    #[error("Credential store is corrupt: {0}")]
    Corrupt(String),
}

/// Errors from session lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The backend call failed (propagated untouched)
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The token could not be persisted
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A successful response was missing a required field
    #[error("Response is missing field: {0}")]
    MissingField(&'static str),
}

impl SessionError {
    /// True when the failure was a 401 from the backend.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, SessionError::Api(e) if e.is_unauthorized())
    }
}

/// Errors from file uploads.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The local file could not be read
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    /// The upload request failed
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The backend stored different bytes than were sent
    #[error("Checksum mismatch: local {local}, server {server}")]
    ChecksumMismatch { local: String, server: String },
}
