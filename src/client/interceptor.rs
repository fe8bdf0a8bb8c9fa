use std::sync::Arc;

use async_trait::async_trait;
use http::header::AUTHORIZATION;
use http::{HeaderMap, HeaderValue, Method};
use tracing::{debug, warn};

use super::transport::ApiResponse;
use crate::credentials::CredentialStore;
use crate::error::ApiError;

/// A stage wrapped around every call made through [`super::ApiClient`].
///
/// The outgoing hook may only touch the header set; the rest of the request
/// is passed through as-is. The incoming hooks observe the outcome and may
/// perform side effects, but cannot alter or swallow it.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Runs before the request is dispatched.
    async fn on_request(&self, _method: &Method, _path: &str, _headers: &mut HeaderMap) {}

    /// Runs after a successful response, before the caller sees it.
    async fn on_response(&self, _response: &ApiResponse) {}

    /// Runs after a failure, before the caller sees it.
    async fn on_error(&self, _error: &ApiError) {}
}

// =============================================================================
// Bearer credential injection
// =============================================================================

/// Adds `Authorization: Bearer <token>` when the store holds a token.
pub struct BearerAuth {
    store: Arc<dyn CredentialStore>,
}

impl BearerAuth {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Interceptor for BearerAuth {
    async fn on_request(&self, method: &Method, path: &str, headers: &mut HeaderMap) {
        let token = match self.store.get() {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                // Never fails the request; it just goes out unauthenticated.
                warn!(store = self.store.identifier(), "Failed to read token: {}", e);
                return;
            }
        };

        match HeaderValue::from_str(&format!("Bearer {}", token)) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
                debug!(%method, path, "Attached bearer token");
            }
            Err(_) => {
                warn!(%method, path, "Stored token is not a valid header value; sending without it");
            }
        }
    }
}

// =============================================================================
// 401 handling
// =============================================================================

/// Something that can drop the current session when the backend rejects it.
pub trait SessionInvalidator: Send + Sync {
    fn invalidate(&self);
}

/// Invalidator that erases only the persisted token.
pub struct ErasePersistedToken {
    store: Arc<dyn CredentialStore>,
}

impl ErasePersistedToken {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl SessionInvalidator for ErasePersistedToken {
    fn invalidate(&self) {
        if let Err(e) = self.store.clear() {
            warn!(store = self.store.identifier(), "Failed to erase token: {}", e);
        }
    }
}

/// Invalidates the session on HTTP 401 and lets the error through.
///
/// Any other status, and every success, passes without side effects.
pub struct UnauthorizedReset {
    invalidator: Arc<dyn SessionInvalidator>,
}

impl UnauthorizedReset {
    pub fn new(invalidator: Arc<dyn SessionInvalidator>) -> Self {
        Self { invalidator }
    }
}

#[async_trait]
impl Interceptor for UnauthorizedReset {
    async fn on_error(&self, error: &ApiError) {
        if error.is_unauthorized() {
            warn!("Backend rejected credentials (401); invalidating session");
            self.invalidator.invalidate();
        }
    }
}
