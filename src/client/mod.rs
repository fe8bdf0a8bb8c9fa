//! HTTP client core and the interceptor pipeline around it.
//!
//! # Architecture
//!
//! ```text
//! caller ──► ApiClient ──► [BearerAuth] ──► [UnauthorizedReset] ──► Transport ──► backend
//!              ▲                                                        │
//!              └──────── [UnauthorizedReset] ◄── [BearerAuth] ◄─────────┘
//! ```
//!
//! [`Transport`] is the seam to the network: [`HttpTransport`] uses reqwest
//! with a fixed base URL and a 15 second timeout; tests plug in fakes.

mod interceptor;
mod pipeline;
mod transport;

pub use interceptor::{
    BearerAuth, ErasePersistedToken, Interceptor, SessionInvalidator, UnauthorizedReset,
};
pub use pipeline::ApiClient;
pub use transport::{
    ApiRequest, ApiResponse, ClientConfig, HttpTransport, MultipartFile, RequestBody, Transport,
    DEFAULT_API_BASE, DEFAULT_ORIGIN, DEFAULT_TIMEOUT,
};
