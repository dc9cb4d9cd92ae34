//! Authentication for provider clients.
//!
//! Static credentials are attached as headers. Short-lived credentials
//! (OAuth access tokens, Yahoo cookie + crumb) come from a [`TokenSource`]
//! and are cached per client instance by [`TokenCache`].

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::RequestBuilder;
use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::MarketDataError;

/// Refresh this long before the vendor-reported expiry.
pub const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// A short-lived credential.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessToken {
    pub value: String,
    /// Session cookie that must accompany the token, if any.
    pub cookie: Option<String>,
    pub expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: value.into(),
            cookie: None,
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Usable at `now` with the refresh margin applied.
    pub fn is_fresh_at(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

/// Obtains a fresh token and knows how to attach it to a request.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken, MarketDataError>;

    fn apply(&self, request: RequestBuilder, token: &AccessToken) -> RequestBuilder;
}

/// Per-instance token cache.
///
/// Concurrent callers wait on the same refresh rather than each issuing one.
pub struct TokenCache {
    provider: &'static str,
    source: Box<dyn TokenSource>,
    token: Mutex<Option<AccessToken>>,
    margin: Duration,
}

impl TokenCache {
    pub fn new(provider: &'static str, source: Box<dyn TokenSource>) -> Self {
        Self {
            provider,
            source,
            token: Mutex::new(None),
            margin: REFRESH_MARGIN,
        }
    }

    /// Current token, refreshed first if it is missing or about to expire.
    ///
    /// Any refresh failure is reported as `AuthError`.
    pub async fn get(&self, http: &reqwest::Client) -> Result<AccessToken, MarketDataError> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.is_fresh_at(Instant::now(), self.margin) {
                return Ok(token.clone());
            }
        }

        debug!("{}: refreshing access token", self.provider);
        let token = self
            .source
            .fetch_token(http)
            .await
            .map_err(|e| match e {
                MarketDataError::AuthError { .. } => e,
                other => MarketDataError::AuthError {
                    provider: self.provider.to_string(),
                    message: other.to_string(),
                },
            })?;
        *guard = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token so the next call refreshes.
    pub async fn invalidate(&self) {
        *self.token.lock().await = None;
    }

    pub fn apply(&self, request: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        self.source.apply(request, token)
    }
}

/// How a client authenticates its payload requests.
pub enum Auth {
    None,
    /// Static `Authorization: Bearer <key>`.
    Bearer(String),
    /// Static key headers.
    Headers(Vec<(&'static str, String)>),
    /// Short-lived token from a [`TokenSource`].
    Managed(TokenCache),
}
