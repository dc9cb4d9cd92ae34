//! Finnhub provider.
//!
//! - Fundamentals via /stock/metric?metric=all
//! - News sentiment via /news-sentiment
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{Fundamentals, ResourceKind, Sentiment};
use crate::provider::{Auth, MarketDataProvider, ProviderCapabilities, ProviderClient};
use crate::registry::RateLimitConfig;

const BASE_URL: &str = "https://finnhub.io/api/v1";
const PROVIDER_ID: &str = "FINNHUB";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /stock/metric
#[derive(Debug, Deserialize)]
struct MetricResponse {
    metric: Option<Metric>,
}

#[derive(Debug, Deserialize)]
struct Metric {
    #[serde(rename = "52WeekHigh")]
    week52_high: Option<f64>,
    #[serde(rename = "52WeekLow")]
    week52_low: Option<f64>,
    #[serde(rename = "peTTM")]
    pe_ttm: Option<f64>,
    #[serde(rename = "peBasicExclExtraTTM")]
    pe_basic: Option<f64>,
    beta: Option<f64>,
    /// Millions of USD
    #[serde(rename = "marketCapitalization")]
    market_cap_millions: Option<f64>,
    /// Percent
    #[serde(rename = "currentDividendYieldTTM")]
    dividend_yield_percent: Option<f64>,
}

/// Response from /news-sentiment
#[derive(Debug, Deserialize)]
struct NewsSentimentResponse {
    buzz: Option<Buzz>,
    sentiment: Option<SentimentScores>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Buzz {
    articles_in_last_week: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentimentScores {
    bullish_percent: Option<f64>,
    bearish_percent: Option<f64>,
}

fn to_fundamentals(symbol: &str, metric: Metric) -> Fundamentals {
    Fundamentals {
        symbol: symbol.to_string(),
        week52_high: metric.week52_high,
        week52_low: metric.week52_low,
        market_cap: metric.market_cap_millions.map(|m| m * 1_000_000.0),
        pe_ratio: metric.pe_ttm.or(metric.pe_basic),
        beta: metric.beta,
        dividend_yield: metric.dividend_yield_percent.map(|p| p / 100.0),
    }
}

fn to_sentiment(symbol: &str, response: NewsSentimentResponse) -> Result<Sentiment, MarketDataError> {
    let scores = response.sentiment.ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("no sentiment for {}", symbol))
    })?;
    Ok(Sentiment {
        symbol: symbol.to_string(),
        bullish_percent: scores.bullish_percent.unwrap_or(0.0),
        bearish_percent: scores.bearish_percent.unwrap_or(0.0),
        article_count: response
            .buzz
            .and_then(|b| b.articles_in_last_week)
            .unwrap_or(0),
    })
}

// ============================================================================
// FinnhubProvider
// ============================================================================

pub struct FinnhubProvider {
    client: ProviderClient,
}

impl FinnhubProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            client: ProviderClient::new(
                PROVIDER_ID,
                base_url,
                Auth::Headers(vec![("X-Finnhub-Token", api_key)]),
                Self::limits(),
            ),
        }
    }

    fn limits() -> RateLimitConfig {
        RateLimitConfig::per_minute(60, Duration::from_secs(30))
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        4
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resources: &[ResourceKind::Fundamentals, ResourceKind::Sentiment],
        }
    }

    fn rate_limit(&self) -> RateLimitConfig {
        Self::limits()
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        let response: MetricResponse = self
            .client
            .get_json(
                "/stock/metric",
                &[
                    ("symbol", symbol.to_string()),
                    ("metric", "all".to_string()),
                ],
            )
            .await?;

        let fundamentals = response
            .metric
            .map(|m| to_fundamentals(symbol, m))
            .unwrap_or_default();

        // Finnhub answers unknown symbols with an empty metric object.
        if fundamentals.is_empty() {
            return Err(MarketDataError::malformed(
                PROVIDER_ID,
                format!("no metrics for {}", symbol),
            ));
        }
        debug!("Finnhub: fundamentals for {}", symbol);
        Ok(fundamentals)
    }

    async fn get_sentiment(&self, symbol: &str) -> Result<Sentiment, MarketDataError> {
        let response: NewsSentimentResponse = self
            .client
            .get_json("/news-sentiment", &[("symbol", symbol.to_string())])
            .await?;
        to_sentiment(symbol, response)
    }
}
