//! Durable storage for the bearer token.
//!
//! The token lives in a single process-wide slot that both the interceptor
//! pipeline and the session read and write. Instead of a shared global, the
//! slot is exposed as a narrow [`CredentialStore`] capability injected into
//! both components:
//!
//! ```text
//!        ┌──────────────┐        ┌──────────────┐
//!        │  BearerAuth  │        │   Session    │
//!        │ (read token) │        │ (set/clear)  │
//!        └──────┬───────┘        └──────┬───────┘
//!               │                       │
//!               ▼                       ▼
//!        ┌──────────────────────────────────────┐
//!        │        CredentialStore trait         │
//!        └──────────────────┬───────────────────┘
//!               ┌───────────┴───────────┐
//!               ▼                       ▼
//!    MemoryCredentialStore     FileCredentialStore
//! ```
//!
//! Every call is a single atomic operation: readers never observe a
//! half-written token.

mod file;
mod memory;

pub use file::{default_credentials_path, FileCredentialStore};
pub use memory::MemoryCredentialStore;

use crate::error::StoreError;

/// Fixed key the token is stored under.
pub const TOKEN_KEY: &str = "token";

/// Get/set/clear access to the persisted bearer token.
///
/// Implementations must be thread-safe. An empty token is equivalent to no
/// token: `get` returns `None` for both.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted token, if any.
    fn get(&self) -> Result<Option<String>, StoreError>;

    /// Replace the persisted token.
    fn set(&self, token: &str) -> Result<(), StoreError>;

    /// Erase the persisted token. Clearing an empty store is not an error.
    fn clear(&self) -> Result<(), StoreError>;

    /// Where the token lives (for logging).
    fn identifier(&self) -> &str;
}
