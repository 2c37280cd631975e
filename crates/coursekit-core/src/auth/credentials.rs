use std::sync::{Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;
use tracing::warn;

/// Keychain service name under which the session token is stored.
const SERVICE_NAME: &str = "coursekit";

/// Fixed account identifier for the token entry. At most one token is
/// persisted at a time; a new login overwrites the previous one.
const TOKEN_ACCOUNT: &str = "user";

/// Secure-storage write or delete failed.
///
/// Reads never produce this error: `load_token` reports any backend failure
/// as an absent token (see [`TokenStore::load_token`]).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("refusing to persist an empty token")]
    EmptyToken,

    #[error("secure storage write failed: {0}")]
    Save(anyhow::Error),

    #[error("secure storage delete failed: {0}")]
    Clear(anyhow::Error),
}

/// Storage contract for the single persisted session token.
///
/// Implementations are injected into [`Session`](super::Session) and the API
/// client at startup, which keeps initialization order explicit and lets
/// tests substitute an in-memory store.
pub trait TokenStore: Send + Sync {
    /// Persist `token`, replacing any previously stored value.
    /// Fails on an empty token or a backend write error.
    fn save_token(&self, token: &str) -> Result<(), PersistenceError>;

    /// Return the stored token, or `None` if none exists.
    ///
    /// Backend read errors are suppressed into `None` so a corrupted store
    /// cannot break request construction; implementations log the failure
    /// instead of surfacing it.
    fn load_token(&self) -> Option<String>;

    /// Remove the stored token. Clearing an empty store is not an error.
    fn clear_token(&self) -> Result<(), PersistenceError>;
}

/// Token store backed by the OS keychain.
#[derive(Debug, Default)]
pub struct KeyringTokenStore;

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self
    }

    fn entry() -> Result<Entry, keyring::Error> {
        Entry::new(SERVICE_NAME, TOKEN_ACCOUNT)
    }
}

impl TokenStore for KeyringTokenStore {
    fn save_token(&self, token: &str) -> Result<(), PersistenceError> {
        if token.is_empty() {
            return Err(PersistenceError::EmptyToken);
        }
        let entry = Self::entry().map_err(|e| PersistenceError::Save(e.into()))?;
        entry
            .set_password(token)
            .map_err(|e| PersistenceError::Save(e.into()))
    }

    fn load_token(&self) -> Option<String> {
        let entry = match Self::entry() {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "keychain unavailable, treating token as absent");
                return None;
            }
        };
        match entry.get_password() {
            Ok(token) => Some(token),
            Err(keyring::Error::NoEntry) => None,
            Err(err) => {
                warn!(error = %err, "failed to read token from keychain, treating as absent");
                None
            }
        }
    }

    fn clear_token(&self) -> Result<(), PersistenceError> {
        let entry = Self::entry().map_err(|e| PersistenceError::Clear(e.into()))?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(PersistenceError::Clear(err.into())),
        }
    }
}

/// In-process token store for tests and environments without a keychain.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn save_token(&self, token: &str) -> Result<(), PersistenceError> {
        if token.is_empty() {
            return Err(PersistenceError::EmptyToken);
        }
        *self.slot() = Some(token.to_string());
        Ok(())
    }

    fn load_token(&self) -> Option<String> {
        self.slot().clone()
    }

    fn clear_token(&self) -> Result<(), PersistenceError> {
        *self.slot() = None;
        Ok(())
    }
}
