//! REST API client module for the coursekit backend.
//!
//! This module provides the `ApiClient` shared by every screen. Requests
//! are authorized with a bearer token read from the credential store, and a
//! 401 response invalidates the current session.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthResponse};
pub use error::ApiError;
