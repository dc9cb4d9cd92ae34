//! Alpaca market data (v2 stocks API).
//!
//! - Quotes via /v2/stocks/{symbol}/snapshot
//! - Bars via /v2/stocks/{symbol}/bars (paginated)
//!
//! Documented limit is 200 requests per minute on the free plan.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;
use urlencoding::encode;

use crate::errors::MarketDataError;
use crate::models::{Bar, Quote, ResourceKind, Timeframe};
use crate::provider::{Auth, MarketDataProvider, ProviderCapabilities, ProviderClient};
use crate::registry::RateLimitConfig;

const BASE_URL: &str = "https://data.alpaca.markets";
const PROVIDER_ID: &str = "ALPACA";

/// Each page is one request against the window.
const MAX_PAGES: usize = 5;
const PAGE_LIMIT: u32 = 10_000;

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotResponse {
    symbol: Option<String>,
    latest_trade: Option<Trade>,
    daily_bar: Option<AlpacaBar>,
    prev_daily_bar: Option<AlpacaBar>,
}

#[derive(Debug, Deserialize)]
struct Trade {
    t: DateTime<Utc>,
    p: f64,
}

#[derive(Debug, Deserialize)]
struct AlpacaBar {
    t: DateTime<Utc>,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl From<AlpacaBar> for Bar {
    fn from(b: AlpacaBar) -> Self {
        Bar::new(b.t, b.o, b.h, b.l, b.c, b.v)
    }
}

#[derive(Debug, Deserialize)]
struct BarsResponse {
    bars: Option<Vec<AlpacaBar>>,
    next_page_token: Option<String>,
}

fn timeframe_param(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::OneMinute => "1Min",
        Timeframe::FiveMinutes => "5Min",
        Timeframe::FifteenMinutes => "15Min",
        Timeframe::OneHour => "1Hour",
        Timeframe::OneDay => "1Day",
        Timeframe::OneWeek => "1Week",
    }
}

fn snapshot_to_quote(symbol: &str, snapshot: SnapshotResponse) -> Result<Quote, MarketDataError> {
    let trade = snapshot.latest_trade.ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("no latest trade for {}", symbol))
    })?;
    let change = snapshot
        .prev_daily_bar
        .map(|prev| trade.p - prev.c)
        .unwrap_or(0.0);
    let volume = snapshot
        .daily_bar
        .map(|bar| bar.v.max(0.0) as u64)
        .unwrap_or(0);

    Ok(Quote::new(
        snapshot.symbol.unwrap_or_else(|| symbol.to_string()),
        trade.p,
        change,
        volume,
        trade.t,
    ))
}

// ============================================================================
// AlpacaProvider
// ============================================================================

pub struct AlpacaProvider {
    client: ProviderClient,
}

impl AlpacaProvider {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self::with_base_url(api_key, api_secret, BASE_URL)
    }

    pub fn with_base_url(api_key: String, api_secret: String, base_url: &str) -> Self {
        Self {
            client: ProviderClient::new(
                PROVIDER_ID,
                base_url,
                Auth::Headers(vec![
                    ("APCA-API-KEY-ID", api_key),
                    ("APCA-API-SECRET-KEY", api_secret),
                ]),
                Self::limits(),
            ),
        }
    }

    fn limits() -> RateLimitConfig {
        RateLimitConfig::per_minute(200, Duration::from_secs(30))
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }
}

#[async_trait]
impl MarketDataProvider for AlpacaProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        3
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resources: &[ResourceKind::Quote, ResourceKind::Bars],
        }
    }

    fn rate_limit(&self) -> RateLimitConfig {
        Self::limits()
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let path = format!("/v2/stocks/{}/snapshot", encode(symbol));
        let snapshot: SnapshotResponse = self
            .client
            .get_json(&path, &[("feed", "iex".to_string())])
            .await?;
        snapshot_to_quote(symbol, snapshot)
    }

    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let path = format!("/v2/stocks/{}/bars", encode(symbol));
        let mut bars: Vec<Bar> = Vec::new();
        let mut page_token: Option<String> = None;

        for page in 0..MAX_PAGES {
            let mut query = vec![
                ("timeframe", timeframe_param(timeframe).to_string()),
                ("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("limit", PAGE_LIMIT.to_string()),
                ("adjustment", "split".to_string()),
                ("feed", "iex".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("page_token", token));
            }

            let response: BarsResponse = self.client.get_json(&path, &query).await?;
            bars.extend(response.bars.unwrap_or_default().into_iter().map(Bar::from));

            match response.next_page_token {
                Some(token) if !token.is_empty() => {
                    debug!("Alpaca: fetching page {} for {}", page + 2, symbol);
                    page_token = Some(token);
                }
                _ => break,
            }
        }

        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_to_quote() {
        let json = r#"{
            "symbol":"AAPL",
            "latestTrade":{"t":"2024-03-12T19:59:59.5Z","x":"V","p":173.2,"s":100,"c":["@"],"i":1,"z":"C"},
            "latestQuote":{"t":"2024-03-12T19:59:59.9Z","ax":"V","ap":173.3,"as":2,"bx":"V","bp":173.1,"bs":3},
            "minuteBar":{"t":"2024-03-12T19:59:00Z","o":173.0,"h":173.3,"l":172.9,"c":173.2,"v":12000,"n":90,"vw":173.1},
            "dailyBar":{"t":"2024-03-12T04:00:00Z","o":172.0,"h":174.0,"l":171.5,"c":173.2,"v":1500000,"n":20000,"vw":172.8},
            "prevDailyBar":{"t":"2024-03-11T04:00:00Z","o":171.0,"h":172.5,"l":170.2,"c":172.0,"v":1400000,"n":19000,"vw":171.5}
        }"#;
        let snapshot: SnapshotResponse = serde_json::from_str(json).unwrap();
        let quote = snapshot_to_quote("AAPL", snapshot).unwrap();
        assert_eq!(quote.price, 173.2);
        assert!((quote.change - 1.2).abs() < 1e-9);
        assert_eq!(quote.volume, 1_500_000);
    }

    #[test]
    fn test_snapshot_without_trade_is_malformed() {
        let snapshot: SnapshotResponse = serde_json::from_str(r#"{"symbol":"AAPL"}"#).unwrap();
        let err = snapshot_to_quote("AAPL", snapshot).unwrap_err();
        assert!(matches!(err, MarketDataError::UpstreamError { status: None, .. }));
    }

    #[test]
    fn test_parse_bars_page() {
        let json = r#"{"bars":[{"t":"2024-03-11T04:00:00Z","o":171.0,"h":172.5,"l":170.2,"c":172.0,"v":1400000}],
            "symbol":"AAPL","next_page_token":null}"#;
        let response: BarsResponse = serde_json::from_str(json).unwrap();
        assert!(response.next_page_token.is_none());
        let bars: Vec<Bar> = response.bars.unwrap().into_iter().map(Bar::from).collect();
        assert_eq!(bars[0].close, 172.0);

        let empty: BarsResponse =
            serde_json::from_str(r#"{"bars":null,"next_page_token":null}"#).unwrap();
        assert!(empty.bars.is_none());
    }

    #[test]
    fn test_timeframe_param() {
        assert_eq!(timeframe_param(Timeframe::OneHour), "1Hour");
        assert_eq!(timeframe_param(Timeframe::OneWeek), "1Week");
    }
}
