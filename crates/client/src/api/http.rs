//! HTTP implementation of the remote data layer.
//!
//! Uses `reqwest` with a cookie store: the durable refresh credential is an
//! HttpOnly cookie the server manages, so this client carries it without
//! ever reading it. Address lookups are cached with `moka` (5-minute TTL).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::PlatefulConfig;
use crate::models::{Address, UserProfile};
use crate::session::{LogoutReason, SessionBus};

use super::{AccessToken, ApiError, RemoteApi};

const ADDRESSES_CACHE_KEY: &str = "addresses";
const CACHE_CAPACITY: u64 = 64;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// Client for the Plateful backend API.
///
/// A 401 on any authenticated endpoint publishes a forced-logout signal on
/// the session bus. The refresh endpoint is exempt: an absent or expired
/// credential there is the normal "no session" outcome, not an event.
#[derive(Clone)]
pub struct HttpApi {
    inner: Arc<HttpApiInner>,
}

struct HttpApiInner {
    client: reqwest::Client,
    base: String,
    cache: Cache<String, Vec<Address>>,
    bus: SessionBus,
}

impl HttpApi {
    /// Create a new API client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: &PlatefulConfig, bus: SessionBus) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(HttpApiInner {
                client,
                base: normalized_base(&config.api_base_url),
                cache,
                bus,
            }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base)
    }

    async fn get_authenticated<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &AccessToken,
    ) -> Result<T, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url(path))
            .bearer_auth(token.expose_secret())
            .send()
            .await?;

        self.decode(path, response, true).await
    }

    /// Check the status and parse the body.
    ///
    /// `authenticated` marks endpoints where a 401 means the session itself
    /// is invalid and must be broadcast.
    async fn decode<T: DeserializeOwned>(
        &self,
        path: &str,
        response: reqwest::Response,
        authenticated: bool,
    ) -> Result<T, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if authenticated {
                debug!(path, "authenticated call rejected, forcing logout");
                self.inner.bus.force_logout(LogoutReason::Unauthorized);
            }
            return Err(ApiError::Unauthorized);
        }

        // Read the body as text first for better error diagnostics.
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                %status,
                path,
                body = %text.chars().take(200).collect::<String>(),
                "API returned non-success status"
            );
            return Err(ApiError::Status(status));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn refresh(&self) -> Result<AccessToken, ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/auth/refresh"))
            .send()
            .await?;

        let body: RefreshResponse = self.decode("/auth/refresh", response, false).await?;
        Ok(AccessToken::new(body.access_token))
    }

    async fn fetch_current_user(&self, token: &AccessToken) -> Result<UserProfile, ApiError> {
        self.get_authenticated("/users/me", token).await
    }

    async fn fetch_addresses(&self, token: &AccessToken) -> Result<Vec<Address>, ApiError> {
        if let Some(cached) = self.inner.cache.get(ADDRESSES_CACHE_KEY).await {
            debug!("address cache hit");
            return Ok(cached);
        }

        let addresses: Vec<Address> = self.get_authenticated("/users/me/addresses", token).await?;
        self.inner
            .cache
            .insert(ADDRESSES_CACHE_KEY.to_owned(), addresses.clone())
            .await;

        Ok(addresses)
    }

    fn purge_cache(&self) {
        self.inner.cache.invalidate_all();
    }
}

/// Token issued by a successful refresh.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

fn normalized_base(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_owned()
}
