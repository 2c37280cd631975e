use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::credentials::{PersistenceError, TokenStore};

/// In-memory authentication state observed by the UI layer.
///
/// Authentication is derived: a session is authenticated exactly when an
/// access token is held, so no partial update can leave the flag and the
/// token out of step.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub access_token: Option<String>,
    /// Held for future token renewal; nothing in this core exercises it.
    pub refresh_token: Option<String>,
    /// Profile payload; its shape is owned by the UI layer.
    pub user: Option<Value>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

/// Process-wide session record and the only writer of the credential store.
///
/// Constructed once at startup and shared as `Arc<Session>`; the HTTP client
/// and the UI layer receive it by injection rather than through a global.
/// The lock is held across the store call and the in-memory update, so the
/// two cannot interleave with another mutation.
pub struct Session {
    store: Arc<dyn TokenStore>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Create a logged-out session over the given store. No persisted token
    /// is read back here; see [`Session::restore`].
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            state: RwLock::new(SessionState::default()),
        }
    }

    /// The store this session persists through. The API client reads tokens
    /// from here, so request construction works even before rehydration.
    pub fn token_store(&self) -> Arc<dyn TokenStore> {
        Arc::clone(&self.store)
    }

    /// Record a successful login.
    ///
    /// The token is persisted first; in-memory state changes only after the
    /// write succeeded. On failure the session is left exactly as it was and
    /// the error propagates to the login flow, which must not navigate
    /// forward.
    pub async fn set_token(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<(), PersistenceError> {
        let access_token = access_token.into();
        let mut state = self.state.write().await;
        self.store.save_token(&access_token)?;
        state.access_token = Some(access_token);
        state.refresh_token = refresh_token;
        Ok(())
    }

    /// Replace the profile record. Authentication is unaffected.
    pub async fn set_user(&self, user: Value) {
        self.state.write().await.user = Some(user);
    }

    /// Drop the session, by explicit user action or after a 401.
    ///
    /// Store cleanup is best-effort: a failed delete is logged and the
    /// in-memory state is reset regardless, so logout never leaves the user
    /// stuck authenticated. Safe to call when already logged out; the next
    /// login overwrites whatever the failed delete left behind.
    pub async fn log_out(&self) {
        let mut state = self.state.write().await;
        if let Err(err) = self.store.clear_token() {
            warn!(error = %err, "failed to clear persisted token during logout");
        }
        *state = SessionState::default();
    }

    /// Rehydrate from a previously persisted token.
    ///
    /// Nothing in this core calls this implicitly; a startup routine may opt
    /// in to silent restore. Assigns in-memory state without writing the
    /// store again. Returns whether a token was found.
    pub async fn restore(&self) -> bool {
        let mut state = self.state.write().await;
        match self.store.load_token() {
            Some(token) => {
                debug!("restored persisted session token");
                state.access_token = Some(token);
                true
            }
            None => false,
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_authenticated()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.read().await.refresh_token.clone()
    }

    pub async fn user(&self) -> Option<Value> {
        self.state.read().await.user.clone()
    }

    /// Point-in-time copy for UI rendering.
    pub async fn snapshot(&self) -> SessionState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use anyhow::anyhow;
    use serde_json::json;

    /// Store whose writes always fail, as a keychain on a locked device would.
    struct RejectingStore;

    impl TokenStore for RejectingStore {
        fn save_token(&self, _token: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Save(anyhow!("keychain rejected write")))
        }

        fn load_token(&self) -> Option<String> {
            None
        }

        fn clear_token(&self) -> Result<(), PersistenceError> {
            Ok(())
        }
    }

    /// Store that holds tokens but fails every delete.
    #[derive(Default)]
    struct StickyStore {
        inner: MemoryTokenStore,
    }

    impl TokenStore for StickyStore {
        fn save_token(&self, token: &str) -> Result<(), PersistenceError> {
            self.inner.save_token(token)
        }

        fn load_token(&self) -> Option<String> {
            self.inner.load_token()
        }

        fn clear_token(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Clear(anyhow!("keychain delete failed")))
        }
    }

    #[tokio::test]
    async fn test_set_token_authenticates_and_persists() {
        let store = Arc::new(MemoryTokenStore::new());
        let session = Session::new(store.clone());
        assert!(!session.is_authenticated().await);

        session
            .set_token("tok-123", Some("refresh-9".into()))
            .await
            .unwrap();

        assert!(session.is_authenticated().await);
        assert_eq!(session.access_token().await.as_deref(), Some("tok-123"));
        assert_eq!(session.refresh_token().await.as_deref(), Some("refresh-9"));
        assert_eq!(store.load_token().as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_failed_persistence_leaves_session_unauthenticated() {
        let session = Session::new(Arc::new(RejectingStore));

        let err = session.set_token("tok-123", None).await.unwrap_err();

        assert!(matches!(err, PersistenceError::Save(_)));
        assert!(!session.is_authenticated().await);
        assert_eq!(session.access_token().await, None);
    }

    #[tokio::test]
    async fn test_log_out_resets_everything() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        session
            .set_token("tok-123", Some("refresh-9".into()))
            .await
            .unwrap();
        session.set_user(json!({"name": "Dana"})).await;

        session.log_out().await;

        let state = session.snapshot().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.access_token, None);
        assert_eq!(state.refresh_token, None);
        assert_eq!(state.user, None);
    }

    #[tokio::test]
    async fn test_log_out_resets_even_when_store_delete_fails() {
        let session = Session::new(Arc::new(StickyStore::default()));
        session
            .set_token("tok-123", Some("refresh-9".into()))
            .await
            .unwrap();
        session.set_user(json!({"name": "Dana"})).await;

        session.log_out().await;

        let state = session.snapshot().await;
        assert!(!state.is_authenticated());
        assert_eq!(state.access_token, None);
        assert_eq!(state.refresh_token, None);
        assert_eq!(state.user, None);
    }

    #[tokio::test]
    async fn test_log_out_when_already_logged_out() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        session.log_out().await;
        session.log_out().await;
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_set_user_does_not_authenticate() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        session.set_user(json!({"name": "Dana"})).await;

        assert!(!session.is_authenticated().await);
        assert_eq!(session.user().await, Some(json!({"name": "Dana"})));
    }

    #[tokio::test]
    async fn test_restore_rehydrates_persisted_token() {
        let store = Arc::new(MemoryTokenStore::new());
        store.save_token("tok-123").unwrap();
        let session = Session::new(store);

        assert!(session.restore().await);
        assert!(session.is_authenticated().await);
        assert_eq!(session.access_token().await.as_deref(), Some("tok-123"));
    }

    #[tokio::test]
    async fn test_restore_without_persisted_token() {
        let session = Session::new(Arc::new(MemoryTokenStore::new()));
        assert!(!session.restore().await);
        assert!(!session.is_authenticated().await);
    }
}
