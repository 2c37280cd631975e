//! HTTP client wrapper for the coursekit REST API.
//!
//! One configured `reqwest` client is shared by every caller. Two
//! cross-cutting stages run around each request: a bearer token read from
//! the credential store is attached on the way out, and a 401 response
//! invalidates the session on the way back. Everything else passes through
//! untouched; callers own their retry policy.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::{Session, TokenStore};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Environment variable naming the API base URL.
const BASE_URL_ENV: &str = "COURSEKIT_API_URL";

/// Fallback base URL for local development servers.
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// HTTP request timeout in milliseconds.
/// 10s fails fast enough for mobile UX while allowing slow endpoints.
const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Response payload of the login and registration endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,

    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,

    /// Profile payload; its shape is owned by the UI layer.
    #[serde(default)]
    pub user: Option<Value>,
}

/// API client for the coursekit backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    session: Arc<Session>,
}

impl ApiClient {
    /// Create a client with the base URL taken from `COURSEKIT_API_URL`,
    /// falling back to the local development address.
    pub fn new(session: Arc<Session>) -> Result<Self, ApiError> {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(session, base_url)
    }

    /// Create a client against an explicit base URL.
    pub fn with_base_url(
        session: Arc<Session>,
        base_url: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store: session.token_store(),
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ===== Generic verbs =====

    /// Issue a GET and decode the JSON response body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let request = attach_bearer(self.client.get(self.url(path)), self.store.as_ref());
        let response = request.send().await?;
        let response = check_response(response, &self.session).await?;
        Ok(response.json().await?)
    }

    /// Issue a POST with a JSON body and decode the JSON response.
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request =
            attach_bearer(self.client.post(self.url(path)), self.store.as_ref()).json(body);
        let response = request.send().await?;
        let response = check_response(response, &self.session).await?;
        Ok(response.json().await?)
    }

    // ===== Auth endpoints =====

    /// Authenticate against the backend. The caller (login screen) decides
    /// what to do with the returned tokens, typically
    /// [`Session::set_token`] followed by [`Session::set_user`].
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ApiError> {
        self.post(
            "/auth/login",
            &serde_json::json!({ "username": username, "password": password }),
        )
        .await
    }

    /// Create an account. The backend signs the new user in and responds
    /// with the same payload as `login`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        self.post(
            "/auth/register",
            &serde_json::json!({ "username": username, "email": email, "password": password }),
        )
        .await
    }
}

// ============================================================================
// Request pipeline stages
// ============================================================================

/// Request stage: attach `Authorization: Bearer <token>` when the store
/// holds a token.
///
/// Reads the credential store rather than session memory, so requests are
/// constructed correctly even before the session is rehydrated, and a failed
/// lookup degrades to an unauthenticated request instead of an error.
fn attach_bearer(builder: RequestBuilder, store: &dyn TokenStore) -> RequestBuilder {
    match store.load_token() {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// Response stage: pass successes through, classify failures, and drop the
/// session on exactly 401.
///
/// Invalidation is a side effect; the original error is returned to the
/// caller either way. `log_out` is infallible, so it can never mask the 401.
async fn check_response(response: Response, session: &Session) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        debug!("401 response, invalidating session");
        session.log_out().await;
    }
    Err(ApiError::from_status(status, &body))
}
