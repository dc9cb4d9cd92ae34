//! Charles Schwab Trader API market data.
//!
//! - OAuth: refresh token exchanged for a 30 minute access token
//! - Quotes via /marketdata/v1/quotes
//! - Bars via /marketdata/v1/pricehistory (hourly is resampled from 30 minute candles)
//! - Option chains via /marketdata/v1/chains
//!
//! Documented limit is 120 requests per minute.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::RequestBuilder;
use serde::Deserialize;
use tracing::debug;

use crate::errors::MarketDataError;
use crate::models::{
    resample, Bar, Greeks, OptionChain, OptionContract, OptionType, Quote, ResourceKind,
    Timeframe,
};
use crate::provider::{
    chain_window, AccessToken, Auth, MarketDataProvider, ProviderCapabilities, ProviderClient,
    TokenCache, TokenSource,
};
use crate::registry::RateLimitConfig;

const BASE_URL: &str = "https://api.schwabapi.com";
const TOKEN_PATH: &str = "/v1/oauth/token";
const PROVIDER_ID: &str = "SCHWAB";

/// Schwab reports unavailable greeks as this sentinel.
const MISSING_VALUE: f64 = -999.0;

// ============================================================================
// OAuth
// ============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Seconds
    expires_in: u64,
}

struct RefreshTokenSource {
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn fetch_token(&self, http: &reqwest::Client) -> Result<AccessToken, MarketDataError> {
        let auth_error = |message: String| MarketDataError::AuthError {
            provider: PROVIDER_ID.to_string(),
            message,
        };

        let response = http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| auth_error(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_error(format!("HTTP {} - {}", status, body.trim())));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_error(format!("Invalid token response: {}", e)))?;

        Ok(AccessToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
        ))
    }

    fn apply(&self, request: RequestBuilder, token: &AccessToken) -> RequestBuilder {
        request.bearer_auth(&token.value)
    }
}

// ============================================================================
// API Response Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    symbol: String,
    quote: Option<SchwabQuote>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchwabQuote {
    last_price: Option<f64>,
    net_change: Option<f64>,
    total_volume: Option<u64>,
    /// Unix millis
    trade_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PriceHistoryResponse {
    #[serde(default)]
    candles: Vec<Candle>,
}

#[derive(Debug, Deserialize)]
struct Candle {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    /// Unix millis
    datetime: i64,
}

/// "2024-04-19:30" -> strike string -> contracts
type ExpDateMap = HashMap<String, HashMap<String, Vec<SchwabOption>>>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainResponse {
    status: Option<String>,
    #[serde(default)]
    call_exp_date_map: ExpDateMap,
    #[serde(default)]
    put_exp_date_map: ExpDateMap,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SchwabOption {
    put_call: String,
    strike_price: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    last: Option<f64>,
    total_volume: Option<u64>,
    open_interest: Option<u64>,
    delta: Option<f64>,
    gamma: Option<f64>,
    theta: Option<f64>,
    vega: Option<f64>,
    rho: Option<f64>,
    /// Percent
    volatility: Option<f64>,
}

// ============================================================================
// Conversions
// ============================================================================

fn present(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != MISSING_VALUE)
}

/// Map keys look like "2024-04-19:30" (date, days to expiry).
fn parse_expiry_key(key: &str) -> Option<NaiveDate> {
    let date = key.split(':').next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn to_contract(root: &str, expiry: NaiveDate, raw: SchwabOption) -> Option<OptionContract> {
    let option_type = match raw.put_call.as_str() {
        "CALL" => OptionType::Call,
        "PUT" => OptionType::Put,
        _ => return None,
    };

    let greeks = present(raw.delta).map(|delta| Greeks {
        delta,
        gamma: present(raw.gamma).unwrap_or(0.0),
        theta: present(raw.theta).unwrap_or(0.0),
        vega: present(raw.vega).unwrap_or(0.0),
        rho: present(raw.rho).unwrap_or(0.0),
        implied_volatility: present(raw.volatility)
            .filter(|v| *v > 0.0)
            .map(|v| v / 100.0),
    });

    Some(OptionContract {
        root: root.to_string(),
        strike: raw.strike_price,
        expiry,
        option_type,
        bid: raw.bid.unwrap_or(0.0),
        ask: raw.ask.unwrap_or(0.0),
        last: raw.last.unwrap_or(0.0),
        volume: raw.total_volume.unwrap_or(0),
        open_interest: raw.open_interest.unwrap_or(0),
        greeks,
    })
}

fn flatten_chain(symbol: &str, response: ChainResponse) -> Vec<OptionContract> {
    response
        .call_exp_date_map
        .into_iter()
        .chain(response.put_exp_date_map)
        .filter_map(|(key, strikes)| parse_expiry_key(&key).map(|expiry| (expiry, strikes)))
        .flat_map(|(expiry, strikes)| {
            strikes
                .into_values()
                .flatten()
                .filter_map(move |raw| to_contract(symbol, expiry, raw))
        })
        .collect()
}

/// (periodType, frequencyType, frequency, resample)
fn history_params(timeframe: Timeframe) -> (&'static str, &'static str, u32, bool) {
    match timeframe {
        Timeframe::OneMinute => ("day", "minute", 1, false),
        Timeframe::FiveMinutes => ("day", "minute", 5, false),
        Timeframe::FifteenMinutes => ("day", "minute", 15, false),
        Timeframe::OneHour => ("day", "minute", 30, true),
        Timeframe::OneDay => ("year", "daily", 1, false),
        Timeframe::OneWeek => ("year", "weekly", 1, false),
    }
}

// ============================================================================
// SchwabProvider
// ============================================================================

pub struct SchwabProvider {
    client: ProviderClient,
}

impl SchwabProvider {
    pub fn new(client_id: String, client_secret: String, refresh_token: String) -> Self {
        Self::with_base_url(client_id, client_secret, refresh_token, BASE_URL)
    }

    pub fn with_base_url(
        client_id: String,
        client_secret: String,
        refresh_token: String,
        base_url: &str,
    ) -> Self {
        let source = RefreshTokenSource {
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            client_id,
            client_secret,
            refresh_token,
        };
        Self {
            client: ProviderClient::new(
                PROVIDER_ID,
                base_url,
                Auth::Managed(TokenCache::new(PROVIDER_ID, Box::new(source))),
                Self::limits(),
            ),
        }
    }

    fn limits() -> RateLimitConfig {
        RateLimitConfig::per_minute(120, Duration::from_secs(60))
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }
}

#[async_trait]
impl MarketDataProvider for SchwabProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        2
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            resources: &[
                ResourceKind::Quote,
                ResourceKind::Bars,
                ResourceKind::OptionChain,
            ],
        }
    }

    fn rate_limit(&self) -> RateLimitConfig {
        Self::limits()
    }

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let response: HashMap<String, QuoteEntry> = self
            .client
            .get_json(
                "/marketdata/v1/quotes",
                &[
                    ("symbols", symbol.to_string()),
                    ("fields", "quote".to_string()),
                ],
            )
            .await?;

        let entry = response
            .into_values()
            .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| {
                MarketDataError::malformed(PROVIDER_ID, format!("no quote for {}", symbol))
            })?;
        let quote = entry.quote.ok_or_else(|| {
            MarketDataError::malformed(PROVIDER_ID, format!("empty quote for {}", symbol))
        })?;
        let price = quote.last_price.ok_or_else(|| {
            MarketDataError::malformed(PROVIDER_ID, format!("no last price for {}", symbol))
        })?;

        let timestamp = quote
            .trade_time
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);
        Ok(Quote::new(
            entry.symbol,
            price,
            quote.net_change.unwrap_or(0.0),
            quote.total_volume.unwrap_or(0),
            timestamp,
        ))
    }

    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let (period_type, frequency_type, frequency, needs_resample) = history_params(timeframe);
        let response: PriceHistoryResponse = self
            .client
            .get_json(
                "/marketdata/v1/pricehistory",
                &[
                    ("symbol", symbol.to_string()),
                    ("periodType", period_type.to_string()),
                    ("frequencyType", frequency_type.to_string()),
                    ("frequency", frequency.to_string()),
                    ("startDate", start.timestamp_millis().to_string()),
                    ("endDate", end.timestamp_millis().to_string()),
                    ("needExtendedHoursData", "false".to_string()),
                ],
            )
            .await?;

        let bars: Vec<Bar> = response
            .candles
            .into_iter()
            .filter_map(|c| {
                DateTime::<Utc>::from_timestamp_millis(c.datetime)
                    .map(|ts| Bar::new(ts, c.open, c.high, c.low, c.close, c.volume))
            })
            .collect();

        if needs_resample {
            Ok(resample(&bars, timeframe))
        } else {
            Ok(bars)
        }
    }

    async fn get_option_chain(
        &self,
        symbol: &str,
        expiry: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        let (from, to) = match expiry {
            Some(date) => (date, date),
            None => chain_window(Utc::now().date_naive()),
        };

        let response: ChainResponse = self
            .client
            .get_json(
                "/marketdata/v1/chains",
                &[
                    ("symbol", symbol.to_string()),
                    ("contractType", "ALL".to_string()),
                    ("includeUnderlyingQuote", "false".to_string()),
                    ("fromDate", from.to_string()),
                    ("toDate", to.to_string()),
                ],
            )
            .await?;

        if response.status.as_deref() == Some("FAILED") {
            return Err(MarketDataError::UpstreamError {
                provider: PROVIDER_ID.to_string(),
                status: None,
                message: format!("Chain request failed for {}", symbol),
            });
        }

        let contracts = flatten_chain(symbol, response);
        debug!("Schwab: {} contracts for {}", contracts.len(), symbol);
        Ok(OptionChain::from_contracts(symbol, contracts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quote_map() {
        let json = r#"{"AAPL":{"assetMainType":"EQUITY","symbol":"AAPL","quote":{
            "lastPrice":172.5,"netChange":1.5,"totalVolume":48000000,"tradeTime":1710259200000}}}"#;
        let response: HashMap<String, QuoteEntry> = serde_json::from_str(json).unwrap();
        let entry = response.get("AAPL").unwrap();
        let quote = entry.quote.as_ref().unwrap();
        assert_eq!(quote.last_price, Some(172.5));
        assert_eq!(quote.total_volume, Some(48_000_000));
    }

    #[test]
    fn test_parse_chain_maps() {
        let json = r#"{
            "symbol":"AAPL","status":"SUCCESS",
            "callExpDateMap":{"2024-04-19:30":{"170.0":[{
                "putCall":"CALL","symbol":"AAPL  240419C00170000","bid":5.1,"ask":5.3,"last":5.2,
                "totalVolume":900,"openInterest":4000,"strikePrice":170.0,
                "delta":0.52,"gamma":0.03,"theta":-0.04,"vega":0.21,"rho":0.08,"volatility":27.5}]}},
            "putExpDateMap":{"2024-04-19:30":{"170.0":[{
                "putCall":"PUT","bid":2.1,"ask":2.3,"last":2.2,"totalVolume":300,"openInterest":3500,
                "strikePrice":170.0,"delta":-999.0,"gamma":-999.0,"theta":-999.0,"vega":-999.0,
                "rho":-999.0,"volatility":-999.0}]}}
        }"#;
        let response: ChainResponse = serde_json::from_str(json).unwrap();
        let chain = OptionChain::from_contracts("AAPL", flatten_chain("AAPL", response));

        let expiry = NaiveDate::from_ymd_opt(2024, 4, 19).unwrap();
        assert_eq!(chain.expirations, vec![expiry]);
        let row = &chain.rows(expiry)[0];

        let call = row.call.as_ref().unwrap();
        assert!((call.implied_volatility().unwrap() - 0.275).abs() < 1e-12);

        let put = row.put.as_ref().unwrap();
        assert!(put.greeks.is_none());
        assert_eq!(put.open_interest, 3500);
    }

    #[test]
    fn test_expiry_key() {
        assert_eq!(
            parse_expiry_key("2024-01-19:5"),
            NaiveDate::from_ymd_opt(2024, 1, 19)
        );
        assert_eq!(parse_expiry_key("garbage"), None);
    }

    #[test]
    fn test_history_params() {
        assert_eq!(history_params(Timeframe::OneHour), ("day", "minute", 30, true));
        assert_eq!(history_params(Timeframe::OneDay), ("year", "daily", 1, false));
    }
}
