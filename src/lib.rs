//! # ImageDrive Client
//!
//! Authenticated client for the ImageDrive image search service.
//!
//! The crate keeps one bearer token per process, attaches it to every
//! backend request, and drops the session as soon as the backend answers
//! 401. On top of that it offers typed calls for uploads and the three
//! search modes, the client-side route table and a small dev proxy.
//!
//! ## Architecture
//!
//! - [`credentials`] - Durable token storage (memory or JSON file)
//! - [`client`] - HTTP transport and the request/response interceptor pipeline
//! - [`session`] - Login, registration, current user and logout
//! - [`api`] - Upload, health and search endpoints
//! - [`routes`] - Path to page mapping
//! - [`proxy`] - Development reverse proxy for the API prefix
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use imagedrive_client::{
//!     ClientConfig, FileCredentialStore, HttpTransport, ImageDriveApi, InvalidationPolicy,
//!     Session,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::resolve(None, "http://127.0.0.1:5000")?;
//!     let transport = Arc::new(HttpTransport::new(config)?);
//!     let store = Arc::new(FileCredentialStore::at_default_location());
//!
//!     let session = Session::connect(transport, store, InvalidationPolicy::default());
//!     session.login("alice", "secret").await?;
//!
//!     let api = ImageDriveApi::new(session.client().clone());
//!     let hits = api.search_text("red car", 10).await?;
//!     println!("{} results", hits.results.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod proxy;
pub mod routes;
pub mod session;

// Re-export commonly used types
pub use api::{
    HealthReport, ImageDriveApi, OcrHit, OcrResults, SimilarityHit, SimilarityResults,
    UploadedImage,
};
pub use client::{
    ApiClient, ApiRequest, ApiResponse, BearerAuth, ClientConfig, HttpTransport, Interceptor,
    SessionInvalidator, Transport, UnauthorizedReset,
};
pub use config::{Cli, Command};
pub use credentials::{CredentialStore, FileCredentialStore, MemoryCredentialStore};
pub use error::{ApiError, BackendError, ErrorBody, SessionError, StoreError, UploadError};
pub use proxy::{create_proxy_router, serve_proxy, ProxyConfig};
pub use routes::{Page, Resolution, RouteTable};
pub use session::{AuthState, CurrentUser, InvalidationPolicy, Session, SessionSnapshot};
