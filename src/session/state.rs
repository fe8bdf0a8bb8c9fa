use std::sync::{Arc, RwLock};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::{ErasePersistedToken, SessionInvalidator};
use crate::credentials::CredentialStore;
use crate::error::StoreError;

/// The authenticated principal, as reported by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
}

/// Point-in-time copy of the session state.
///
/// An empty `token` means unauthenticated. `user` is only ever set while
/// `token` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: String,
    pub user: Option<CurrentUser>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        !self.token.is_empty()
    }
}

/// What a 401 from the backend wipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InvalidationPolicy {
    /// Clear the persisted token, the in-memory token and the current user.
    #[default]
    ClearSession,

    /// Erase only the persisted token; in-memory state is left as it was.
    ClearToken,
}

/// In-memory session state mirrored to a credential store.
///
/// Every write updates the store first and memory second while holding the
/// state lock, so the two copies never disagree for another reader of this
/// state. Store operations are synchronous; no lock is held across an await.
///
/// [`clear`](Self::clear) is the one write that does not stop at a store
/// failure: memory is cleared regardless and the error is handed back.
pub struct AuthState {
    store: Arc<dyn CredentialStore>,
    inner: RwLock<SessionSnapshot>,
}

impl AuthState {
    /// Initialize from whatever token the store already holds.
    ///
    /// An unreadable store starts the session unauthenticated.
    pub fn load(store: Arc<dyn CredentialStore>) -> Self {
        let token = match store.get() {
            Ok(token) => token.unwrap_or_default(),
            Err(e) => {
                warn!(store = store.identifier(), "Ignoring unreadable token: {}", e);
                String::new()
            }
        };

        Self {
            store,
            inner: RwLock::new(SessionSnapshot { token, user: None }),
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn token(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .clone()
    }

    pub fn user(&self) -> Option<CurrentUser> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .user
            .clone()
    }

    /// Persist and adopt a freshly issued token.
    ///
    /// On a store failure memory is left untouched. The previous user belongs
    /// to the previous token and is dropped.
    pub(crate) fn install_token(&self, token: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        self.store.set(token)?;
        inner.token = token.to_string();
        inner.user = None;
        Ok(())
    }

    /// Record the user fetched with `token`.
    ///
    /// Ignored (returns false) when the session has moved on to another token
    /// or was cleared while the request was in flight.
    pub(crate) fn set_user_for(&self, token: &str, user: CurrentUser) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.token.is_empty() || inner.token != token {
            return false;
        }
        inner.user = Some(user);
        true
    }

    /// Erase the persisted token, then clear token and user in memory.
    ///
    /// Memory is cleared even when the store refuses; the store error is
    /// returned so the caller can report a token left on disk.
    pub fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let erased = self.store.clear();
        inner.token.clear();
        inner.user = None;
        erased
    }

    /// Invalidator for the 401 interceptor under `policy`.
    pub fn invalidator(self: &Arc<Self>, policy: InvalidationPolicy) -> Arc<dyn SessionInvalidator> {
        match policy {
            InvalidationPolicy::ClearSession => Arc::clone(self) as Arc<dyn SessionInvalidator>,
            InvalidationPolicy::ClearToken => {
                Arc::new(ErasePersistedToken::new(Arc::clone(&self.store)))
            }
        }
    }
}

impl SessionInvalidator for AuthState {
    fn invalidate(&self) {
        if let Err(e) = self.clear() {
            warn!(store = self.store.identifier(), "Failed to erase token: {}", e);
        }
    }
}
