//! Session store: owns the authentication lifecycle.
//!
//! [`Session`] exposes `login`, `register`, `me` and `logout` on top of an
//! [`ApiClient`] whose interceptors read the same credential store the
//! session writes to.
//!
//! ```ignore
//! let session = Session::connect(transport, store, InvalidationPolicy::default());
//! session.login("alice", "pw").await?;
//! assert_eq!(session.user().unwrap().username, "alice");
//! session.logout();
//! ```
//!
//! There is no lock across calls: two overlapping `login`s both complete and
//! the one that resolves last determines the final token.

mod state;

pub use state::{AuthState, CurrentUser, InvalidationPolicy, SessionSnapshot};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::Envelope;
use crate::client::{ApiClient, BearerAuth, Transport, UnauthorizedReset};
use crate::credentials::CredentialStore;
use crate::error::SessionError;

pub const LOGIN_PATH: &str = "/auth/login";
pub const REGISTER_PATH: &str = "/auth/register";
pub const ME_PATH: &str = "/auth/me";

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct IssuedToken {
    #[serde(default)]
    access_token: String,
}

/// Authentication lifecycle bound to one API client.
#[derive(Clone)]
pub struct Session {
    client: ApiClient,
    auth: Arc<AuthState>,
}

impl Session {
    /// Use an already assembled client and state.
    ///
    /// The caller is responsible for the client's interceptors reading and
    /// invalidating `auth`.
    pub fn new(client: ApiClient, auth: Arc<AuthState>) -> Self {
        Self { client, auth }
    }

    /// Build the standard stack: bearer injection plus 401 invalidation, both
    /// wired to `store`.
    pub fn connect(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        policy: InvalidationPolicy,
    ) -> Self {
        let auth = Arc::new(AuthState::load(Arc::clone(&store)));
        let client = ApiClient::new(transport)
            .with_interceptor(Arc::new(BearerAuth::new(store)))
            .with_interceptor(Arc::new(UnauthorizedReset::new(auth.invalidator(policy))));

        Self { client, auth }
    }

    /// The authenticated client, for calls outside the auth lifecycle.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn state(&self) -> &Arc<AuthState> {
        &self.auth
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.auth.snapshot()
    }

    /// Current token; empty when unauthenticated.
    pub fn token(&self) -> String {
        self.auth.token()
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.auth.user()
    }

    pub fn is_authenticated(&self) -> bool {
        !self.auth.token().is_empty()
    }

    /// Exchange credentials for a token, persist it, then load the user.
    ///
    /// Nothing is written unless the backend issues a token. A failure of the
    /// follow-up `me()` is returned, with the token already in place.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), SessionError> {
        let response = self
            .client
            .post(LOGIN_PATH, &Credentials { username, password })
            .await?;

        let token = response
            .json::<Envelope<IssuedToken>>()?
            .data
            .map(|issued| issued.access_token)
            .filter(|token| !token.is_empty())
            .ok_or(SessionError::MissingField("data.access_token"))?;

        self.auth.install_token(&token)?;
        info!(username, "Logged in");

        self.me().await?;
        Ok(())
    }

    /// Create an account. Session state is never touched.
    ///
    /// Returns the created account when the backend echoes it.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<CurrentUser>, SessionError> {
        let response = self
            .client
            .post(REGISTER_PATH, &Credentials { username, password })
            .await?;
        info!(username, "Registered account");

        Ok(response
            .json::<Envelope<CurrentUser>>()
            .ok()
            .and_then(|envelope| envelope.data))
    }

    /// Refresh the current user from the backend.
    ///
    /// Without a token this returns the (unchanged) current user and makes no
    /// call. A 401 comes back as an error after the pipeline has already
    /// invalidated the session.
    pub async fn me(&self) -> Result<Option<CurrentUser>, SessionError> {
        let token = self.auth.token();
        if token.is_empty() {
            debug!("No token; skipping current-user lookup");
            return Ok(self.auth.user());
        }

        let response = self.client.get(ME_PATH).await?;
        let user = response
            .json::<Envelope<CurrentUser>>()?
            .data
            .ok_or(SessionError::MissingField("data"))?;

        if !self.auth.set_user_for(&token, user.clone()) {
            debug!("Session changed during current-user lookup; discarding result");
        }
        Ok(self.auth.user())
    }

    /// Drop the session locally. No backend call; always succeeds.
    ///
    /// Token and user are cleared in memory even if the store cannot erase
    /// the persisted token. That failure is logged, and the token stays on
    /// disk for the next process to load; use [`AuthState::clear`] through
    /// [`state`](Self::state) to observe it.
    pub fn logout(&self) {
        if let Err(e) = self.auth.clear() {
            warn!(store = self.auth.store().identifier(), "Failed to erase token: {}", e);
        }
        info!("Logged out");
    }
}
