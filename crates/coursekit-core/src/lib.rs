//! coursekit-core - session and API client core for the coursekit mobile app.
//!
//! The UI layers (screens, navigation, catalogs) live outside this crate and
//! consume three pieces wired together at startup:
//!
//! - [`auth::TokenStore`]: secure persistence of the session token
//! - [`auth::Session`]: the process-wide authentication record
//! - [`api::ApiClient`]: the shared HTTP client that attaches the bearer
//!   token on the way out and invalidates the session on a 401
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coursekit_core::{ApiClient, KeyringTokenStore, Session};
//!
//! let session = Arc::new(Session::new(Arc::new(KeyringTokenStore::new())));
//! let api = ApiClient::new(Arc::clone(&session))?;
//!
//! let auth = api.login("dana", "hunter2").await?;
//! session.set_token(auth.access_token, auth.refresh_token).await?;
//! if let Some(user) = auth.user {
//!     session.set_user(user).await;
//! }
//! ```

pub mod api;
pub mod auth;

pub use api::{ApiClient, ApiError, AuthResponse};
pub use auth::{
    KeyringTokenStore, MemoryTokenStore, PersistenceError, Session, SessionState, TokenStore,
};
