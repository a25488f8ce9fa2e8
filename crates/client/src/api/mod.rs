//! Remote data layer.
//!
//! The engine consumes the backend through the [`RemoteApi`] trait so tests
//! can substitute a mock. [`HttpApi`] is the production implementation over
//! `reqwest`, with the durable refresh credential carried as a cookie the
//! engine never reads directly.

pub mod http;
mod query;

pub use http::HttpApi;
pub use query::{CachedQuery, QueryOutcome};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::models::{Address, UserProfile};

/// Errors from the remote data layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid credential (HTTP 401). A normal outcome for `refresh`;
    /// grounds for a forced logout on authenticated calls.
    #[error("unauthorized")]
    Unauthorized,

    /// The request could not complete (connect failure, timeout).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response body was not the expected shape.
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The server answered with an unexpected status code.
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
}

impl ApiError {
    /// Whether an immediate retry of the same call could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// A bearer token for authenticated calls.
///
/// Held only in volatile memory and redacted from `Debug` output. The token
/// is never written to durable storage; it lives exactly as long as the
/// session that issued it.
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Wrap a token string received from the remote system.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::from(token.into()))
    }

    /// Expose the raw token for an `Authorization` header.
    #[must_use]
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

/// Async operations the engine consumes from the backend.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Exchange the durable refresh credential for a fresh access token.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when no valid credential exists;
    /// an absent session is a silent, expected outcome for the caller.
    async fn refresh(&self) -> Result<AccessToken, ApiError>;

    /// Fetch the authenticated user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when the token is rejected, or
    /// [`ApiError::Network`] on transport failure.
    async fn fetch_current_user(&self, token: &AccessToken) -> Result<UserProfile, ApiError>;

    /// Fetch the authenticated user's delivery addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] when the token is rejected, or
    /// [`ApiError::Network`] on transport failure.
    async fn fetch_addresses(&self, token: &AccessToken) -> Result<Vec<Address>, ApiError>;

    /// Drop any response caches held by the implementation.
    ///
    /// Called on logout so nothing fetched for one user can be served to
    /// the next.
    fn purge_cache(&self);
}
