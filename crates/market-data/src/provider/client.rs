//! Rate-limited HTTP transport shared by every provider.
//!
//! One [`ProviderClient`] per provider instance. It owns the limiter and the
//! auth state, and classifies every outcome into the error taxonomy:
//!
//! 1. Cooldown active -> `Throttled`, nothing sent
//! 2. Window full -> `WindowExceeded`, nothing sent
//! 3. Token refresh failure -> `AuthError`, payload request not sent
//! 4. HTTP 429 -> cooldown armed, `Throttled`
//! 5. Other non-2xx or transport error -> `UpstreamError`, no cooldown
//! 6. Undecodable body -> `UpstreamError`

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::registry::{Denial, RateLimitConfig, RateLimiter};

use super::auth::Auth;

/// Per-request HTTP timeout. The waterfall applies its own tier deadline on top.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest upstream body excerpt kept in an error message.
const ERROR_BODY_LIMIT: usize = 200;

pub struct ProviderClient {
    provider: &'static str,
    http: Client,
    base_url: String,
    auth: Auth,
    limiter: RateLimiter,
}

impl ProviderClient {
    pub fn new(
        provider: &'static str,
        base_url: impl Into<String>,
        auth: Auth,
        limit: RateLimitConfig,
    ) -> Self {
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent("Mozilla/5.0 (compatible; optionscope/0.4)")
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            provider,
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
            limiter: RateLimiter::new(limit),
        }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        self.get_json_with_auth(path, query, &self.auth).await
    }

    /// [`Self::get_json`] with an endpoint-specific credential.
    pub async fn get_json_with_auth<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        auth: &Auth,
    ) -> Result<T, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let text = self
            .execute(self.http.get(&url).query(query), auth)
            .await?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("{}: failed to decode {}: {}", self.provider, path, e);
            MarketDataError::malformed(self.provider, e)
        })
    }

    /// Run one request through the limiter, auth and outcome classification.
    async fn execute(&self, request: RequestBuilder, auth: &Auth) -> Result<String, MarketDataError> {
        self.acquire()?;

        let request = match auth {
            Auth::None => request,
            Auth::Bearer(key) => request.bearer_auth(key),
            Auth::Headers(headers) => headers
                .iter()
                .fold(request, |req, (name, value)| req.header(*name, value)),
            Auth::Managed(tokens) => {
                let token = tokens.get(&self.http).await?;
                tokens.apply(request, &token)
            }
        };

        let response = request.send().await.map_err(|e| {
            debug!("{}: transport error: {}", self.provider, e);
            MarketDataError::UpstreamError {
                provider: self.provider.to_string(),
                status: e.status().map(|s| s.as_u16()),
                message: format!("Request failed: {}", e),
            }
        })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let cooldown = self.limiter.trigger_cooldown();
            warn!(
                "{}: throttled by vendor, cooling down for {:?}",
                self.provider, cooldown
            );
            return Err(MarketDataError::Throttled {
                provider: self.provider.to_string(),
                retry_after: Some(cooldown),
            });
        }

        if status == StatusCode::UNAUTHORIZED {
            if let Auth::Managed(tokens) = auth {
                tokens.invalidate().await;
            }
        }

        let body = response.text().await.map_err(|e| MarketDataError::UpstreamError {
            provider: self.provider.to_string(),
            status: Some(status.as_u16()),
            message: format!("Failed to read response: {}", e),
        })?;

        if !status.is_success() {
            return Err(MarketDataError::UpstreamError {
                provider: self.provider.to_string(),
                status: Some(status.as_u16()),
                message: excerpt(&body),
            });
        }

        Ok(body)
    }

    fn acquire(&self) -> Result<(), MarketDataError> {
        self.limiter.try_acquire().map_err(|denial| match denial {
            Denial::Cooldown { remaining } => {
                debug!("{}: cooldown active for {:?}", self.provider, remaining);
                MarketDataError::Throttled {
                    provider: self.provider.to_string(),
                    retry_after: Some(remaining),
                }
            }
            Denial::WindowFull { limit } => MarketDataError::WindowExceeded {
                provider: self.provider.to_string(),
                limit,
            },
        })
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        assert_eq!(excerpt("  "), "empty response body");
        assert_eq!(excerpt("{\"error\":\"bad\"}"), "{\"error\":\"bad\"}");
        let long = "x".repeat(500);
        let cut = excerpt(&long);
        assert_eq!(cut.len(), ERROR_BODY_LIMIT + 3);
        assert!(cut.ends_with("..."));
    }

    #[tokio::test]
    async fn test_cooldown_refuses_before_any_request() {
        let client = ProviderClient::new(
            "TEST",
            // Unroutable: any attempt to send would fail as a transport error.
            "http://127.0.0.1:9",
            Auth::None,
            RateLimitConfig::per_minute(60, Duration::from_secs(60)),
        );
        client.limiter().trigger_cooldown();

        let err = client
            .get_json::<serde_json::Value>("/quote", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::Throttled { .. }));
        assert_eq!(client.limiter().occupancy_at(std::time::Instant::now()), 0);
    }
}
