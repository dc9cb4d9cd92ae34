//! Yahoo Finance provider.
//!
//! - Quotes and bars via the v8 chart endpoint (no credentials)
//! - Fundamentals via v10 quoteSummary, which needs a session cookie and a
//!   matching crumb. The pair is cached per provider instance for an hour.
//!
//! Yahoo documents no limit; 60 requests per minute is what it tolerates
//! before answering 429.

pub mod models;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, RequestBuilder};
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{Bar, Fundamentals, Quote, ResourceKind, Timeframe};
use crate::provider::{
    AccessToken, Auth, MarketDataProvider, ProviderCapabilities, ProviderClient, TokenCache,
    TokenSource,
};
use crate::registry::RateLimitConfig;

use models::{raw, YahooChartResponse, YahooChartResult, YahooQuoteSummaryResponse};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const PROVIDER_ID: &str = "YAHOO";

/// How long a cookie/crumb pair is trusted.
const CRUMB_LIFETIME: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// Cookie + crumb
// ============================================================================

struct CrumbSource {
    cookie_url: String,
    crumb_url: String,
}

#[async_trait]
impl TokenSource for CrumbSource {
    async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken, MarketDataError> {
        let auth_error = |message: String| MarketDataError::AuthError {
            provider: PROVIDER_ID.to_string(),
            message,
        };

        // The cookie endpoint answers 404 but still sets the session cookie.
        let response = http
            .get(&self.cookie_url)
            .send()
            .await
            .map_err(|e| auth_error(format!("Failed to get cookie: {}", e)))?;

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split_once(';').map(|(v, _)| v.to_string()))
            .ok_or_else(|| auth_error("Failed to parse Yahoo cookie".to_string()))?;

        let response = http
            .get(&self.crumb_url)
            .header(header::COOKIE, &cookie)
            .send()
            .await
            .map_err(|e| auth_error(format!("Failed to get crumb: {}", e)))?;

        if !response.status().is_success() {
            return Err(auth_error(format!("Crumb request returned {}", response.status())));
        }

        let crumb = response
            .text()
            .await
            .map_err(|e| auth_error(format!("Failed to read crumb: {}", e)))?;
        let crumb = crumb.trim();
        if crumb.is_empty() || crumb.contains(' ') {
            return Err(auth_error(format!("Unexpected crumb: '{}'", crumb)));
        }

        Ok(AccessToken::new(crumb, CRUMB_LIFETIME).with_cookie(cookie))
    }

    fn apply(&self, request: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        let request = request.query(&[("crumb", token.value.as_str())]);
        match &token.cookie {
            Some(cookie) => request.header(header::COOKIE, cookie),
            None => request,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn interval_param(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneMinute => "1m",
        Timeframe::FiveMinutes => "5m",
        Timeframe::FifteenMinutes => "15m",
        Timeframe::OneHour => "60m",
        Timeframe::OneDay => "1d",
        Timeframe::OneWeek => "1wk",
    }
}

fn first_result(response: YahooChartResponse) -> Result<YahooChartResult, MarketDataError> {
    let error = response.chart.error;
    response
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| {
            let detail = error
                .and_then(|e| e.description.or(e.code))
                .unwrap_or_else(|| "empty chart result".to_string());
            MarketDataError::malformed(PROVIDER_ID, detail)
        })
}

fn chart_to_quote(result: &YahooChartResult) -> Result<Quote, MarketDataError> {
    let meta = &result.meta;
    let price = meta.regular_market_price.ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("no market price for {}", meta.symbol))
    })?;
    let previous = meta.previous_close.or(meta.chart_previous_close);
    let timestamp = meta
        .regular_market_time
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .unwrap_or_else(Utc::now);

    Ok(Quote::new(
        meta.symbol.clone(),
        price,
        previous.map(|p| price - p).unwrap_or(0.0),
        meta.regular_market_volume.unwrap_or(0),
        timestamp,
    ))
}

/// Zip the parallel arrays, skipping positions with any missing price.
fn chart_to_bars(result: YahooChartResult) -> Vec<Bar> {
    let Some(quote) = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
    else {
        return Vec::new();
    };

    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let timestamp = DateTime::<Utc>::from_timestamp(*ts, 0)?;
            let open = (*quote.open.get(i)?)?;
            let high = (*quote.high.get(i)?)?;
            let low = (*quote.low.get(i)?)?;
            let close = (*quote.close.get(i)?)?;
            let volume = quote.volume.get(i).copied().flatten().unwrap_or(0.0);
            Some(Bar::new(timestamp, open, high, low, close, volume))
        })
        .collect()
}

// ============================================================================
// YahooProvider
// ============================================================================

pub struct YahooProvider {
    client: ProviderClient,
    crumb: Auth,
}

impl YahooProvider {
    pub fn new() -> Self {
        Self::with_urls(BASE_URL, COOKIE_URL)
    }

    pub fn with_urls(base_url: &str, cookie_url: &str) -> Self {
        let source = CrumbSource {
            cookie_url: cookie_url.to_string(),
            crumb_url: format!("{}/v1/test/getcrumb", base_url.trim_end_matches('/')),
        };
        Self {
            client: ProviderClient::new(PROVIDER_ID, base_url, Auth::None, Self::limits()),
            crumb: Auth::Managed(TokenCache::new(PROVIDER_ID, Box::new(source))),
        }
    }

    fn limits() -> RateLimitConfig {
        RateLimitConfig::per_minute(60, Duration::from_secs(60))
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    async fn chart(
        &self,
        symbol: &str,
        query: &[(&str, String)],
    ) -> Result<YahooChartResult, MarketDataError> {
        let path = format!("/v8/finance/chart/{}", encode(symbol));
        let response: YahooChartResponse = self.client.get_json(&path, query).await?;
        first_result(response)
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        5
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resources: &[
                ResourceKind::Quote,
                ResourceKind::Bars,
                ResourceKind::Fundamentals,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimitConfig {
        Self::limits()
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let result = self
            .chart(
                symbol,
                &[
                    ("range", "1d".to_string()),
                    ("interval", "1m".to_string()),
                ],
            )
            .await?;
        chart_to_quote(&result)
    }

    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let result = self
            .chart(
                symbol,
                &[
                    ("period1", start.timestamp().to_string()),
                    ("period2", end.timestamp().to_string()),
                    ("interval", interval_param(timeframe).to_string()),
                    ("includePrePost", "false".to_string()),
                ],
            )
            .await?;
        Ok(chart_to_bars(result))
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        let path = format!("/v10/finance/quoteSummary/{}", encode(symbol));
        let response: YahooQuoteSummaryResponse = self
            .client
            .get_json_with_auth(
                &path,
                &[(
                    "modules",
                    "summaryDetail,defaultKeyStatistics".to_string(),
                )],
                &self.crumb,
            )
            .await?;

        let result = response
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| {
                MarketDataError::malformed(PROVIDER_ID, format!("no summary for {}", symbol))
            })?;

        let detail = result.summary_detail;
        let stats_beta = result.default_key_statistics.and_then(|s| raw(&s.beta));
        debug!("Yahoo: fundamentals for {}", symbol);

        Ok(match detail {
            Some(d) => Fundamentals {
                symbol: symbol.to_string(),
                week52_high: raw(&d.fifty_two_week_high),
                week52_low: raw(&d.fifty_two_week_low),
                market_cap: raw(&d.market_cap),
                pe_ratio: raw(&d.trailing_pe),
                beta: raw(&d.beta).or(stats_beta),
                dividend_yield: raw(&d.dividend_yield),
            },
            None => Fundamentals {
                symbol: symbol.to_string(),
                beta: stats_beta,
                ..Default::default()
            },
        })
    }
}
