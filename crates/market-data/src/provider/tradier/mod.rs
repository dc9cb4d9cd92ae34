//! Tradier brokerage market data.
//!
//! - Quotes via /v1/markets/quotes
//! - Daily/weekly bars via /v1/markets/history
//! - Intraday bars via /v1/markets/timesales (hourly is resampled from 15min)
//! - Option chains with greeks via /v1/markets/options/{expirations,chains}
//!
//! Documented limit is 120 requests per minute per token.
//! API documentation: https://documentation.tradier.com/brokerage-api

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::America::New_York;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::MarketDataError;
use crate::models::{
    resample, Bar, Greeks, OptionChain, OptionContract, OptionType, Quote, ResourceKind,
    Timeframe,
};
use crate::provider::{
    select_expirations, Auth, MarketDataProvider, ProviderCapabilities, ProviderClient,
};
use crate::registry::RateLimitConfig;

const PRODUCTION_URL: &str = "https://api.tradier.com";
const SANDBOX_URL: &str = "https://sandbox.tradier.com";
const PROVIDER_ID: &str = "TRADIER";

// ============================================================================
// API Response Structures
// ============================================================================

/// Tradier collapses single-element arrays into a bare object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    quotes: Option<QuotesBody>,
}

#[derive(Debug, Deserialize)]
struct QuotesBody {
    quote: Option<OneOrMany<TradierQuote>>,
}

#[derive(Debug, Deserialize)]
struct TradierQuote {
    symbol: String,
    last: Option<f64>,
    change: Option<f64>,
    volume: Option<u64>,
    /// Unix millis
    trade_date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    history: Option<HistoryBody>,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    day: Option<OneOrMany<HistoryDay>>,
}

#[derive(Debug, Deserialize)]
struct HistoryDay {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TimesalesResponse {
    series: Option<TimesalesBody>,
}

#[derive(Debug, Deserialize)]
struct TimesalesBody {
    data: Option<OneOrMany<TimesalesPoint>>,
}

#[derive(Debug, Deserialize)]
struct TimesalesPoint {
    /// Unix seconds
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct ExpirationsResponse {
    expirations: Option<ExpirationsBody>,
}

#[derive(Debug, Deserialize)]
struct ExpirationsBody {
    date: Option<OneOrMany<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
struct ChainResponse {
    options: Option<ChainBody>,
}

#[derive(Debug, Deserialize)]
struct ChainBody {
    option: Option<OneOrMany<TradierOption>>,
}

#[derive(Debug, Deserialize)]
struct TradierOption {
    underlying: String,
    strike: f64,
    option_type: String,
    expiration_date: NaiveDate,
    bid: Option<f64>,
    ask: Option<f64>,
    last: Option<f64>,
    volume: Option<u64>,
    open_interest: Option<u64>,
    greeks: Option<TradierGreeks>,
}

#[derive(Debug, Deserialize)]
struct TradierGreeks {
    delta: Option<f64>,
    gamma: Option<f64>,
    theta: Option<f64>,
    vega: Option<f64>,
    rho: Option<f64>,
    mid_iv: Option<f64>,
}

// ============================================================================
// Conversions
// ============================================================================

fn to_quote(raw: TradierQuote) -> Result<Quote, MarketDataError> {
    let price = raw.last.ok_or_else(|| {
        MarketDataError::malformed(PROVIDER_ID, format!("no last price for {}", raw.symbol))
    })?;
    let timestamp = raw
        .trade_date
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_else(Utc::now);
    Ok(Quote::new(
        raw.symbol,
        price,
        raw.change.unwrap_or(0.0),
        raw.volume.unwrap_or(0),
        timestamp,
    ))
}

fn day_to_bar(day: HistoryDay) -> Bar {
    let timestamp = day.date.and_time(NaiveTime::MIN).and_utc();
    Bar::new(timestamp, day.open, day.high, day.low, day.close, day.volume)
}

fn point_to_bar(point: TimesalesPoint) -> Option<Bar> {
    let timestamp = DateTime::<Utc>::from_timestamp(point.timestamp, 0)?;
    Some(Bar::new(
        timestamp,
        point.open,
        point.high,
        point.low,
        point.close,
        point.volume,
    ))
}

fn to_contract(raw: TradierOption) -> Option<OptionContract> {
    let option_type = match raw.option_type.as_str() {
        "call" => OptionType::Call,
        "put" => OptionType::Put,
        other => {
            warn!("Tradier: unknown option_type '{}'", other);
            return None;
        }
    };

    let greeks = raw.greeks.and_then(|g| {
        Some(Greeks {
            delta: g.delta?,
            gamma: g.gamma.unwrap_or(0.0),
            theta: g.theta.unwrap_or(0.0),
            vega: g.vega.unwrap_or(0.0),
            rho: g.rho.unwrap_or(0.0),
            implied_volatility: g.mid_iv.filter(|iv| *iv > 0.0),
        })
    });

    Some(OptionContract {
        root: raw.underlying,
        strike: raw.strike,
        expiry: raw.expiration_date,
        option_type,
        bid: raw.bid.unwrap_or(0.0),
        ask: raw.ask.unwrap_or(0.0),
        last: raw.last.unwrap_or(0.0),
        volume: raw.volume.unwrap_or(0),
        open_interest: raw.open_interest.unwrap_or(0),
        greeks,
    })
}

/// Timesales interval for an intraday timeframe, plus whether to resample.
fn timesales_interval(timeframe: Timeframe) -> (&'static str, bool) {
    match timeframe {
        Timeframe::OneMinute => ("1min", false),
        Timeframe::FiveMinutes => ("5min", false),
        Timeframe::FifteenMinutes => ("15min", false),
        _ => ("15min", true),
    }
}

fn exchange_minute(instant: DateTime<Utc>) -> String {
    New_York
        .from_utc_datetime(&instant.naive_utc())
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

// ============================================================================
// TradierProvider
// ============================================================================

pub struct TradierProvider {
    client: ProviderClient,
}

impl TradierProvider {
    pub fn new(api_key: String, sandbox: bool) -> Self {
        let base_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        Self::with_base_url(api_key, base_url)
    }

    /// Point the client at another host (sandbox, or a mock server in tests).
    pub fn with_base_url(api_key: String, base_url: &str) -> Self {
        Self {
            client: ProviderClient::new(
                PROVIDER_ID,
                base_url,
                Auth::Bearer(api_key),
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

    async fn fetch_expirations(&self, symbol: &str) -> Result<Vec<NaiveDate>, MarketDataError> {
        let response: ExpirationsResponse = self
            .client
            .get_json(
                "/v1/markets/options/expirations",
                &[("symbol", symbol.to_string())],
            )
            .await?;
        Ok(response
            .expirations
            .and_then(|e| e.date)
            .map(OneOrMany::into_vec)
            .unwrap_or_default())
    }

    async fn fetch_chain(
        &self,
        symbol: &str,
        expiry: NaiveDate,
    ) -> Result<Vec<OptionContract>, MarketDataError> {
        let response: ChainResponse = self
            .client
            .get_json(
                "/v1/markets/options/chains",
                &[
                    ("symbol", symbol.to_string()),
                    ("expiration", expiry.to_string()),
                    ("greeks", "true".to_string()),
                ],
            )
            .await?;
        Ok(response
            .options
            .and_then(|o| o.option)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(to_contract)
            .collect())
    }
}

#[async_trait]
impl MarketDataProvider for TradierProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn priority(&self) -> u8 {
        1
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
        let response: QuotesResponse = self
            .client
            .get_json(
                "/v1/markets/quotes",
                &[
                    ("symbols", symbol.to_string()),
                    ("greeks", "false".to_string()),
                ],
            )
            .await?;

        let raw = response
            .quotes
            .and_then(|q| q.quote)
            .and_then(|q| q.into_vec().into_iter().next())
            .ok_or_else(|| {
                MarketDataError::malformed(PROVIDER_ID, format!("no quote for {}", symbol))
            })?;
        to_quote(raw)
    }

    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        if !timeframe.is_intraday() {
            let interval = if timeframe == Timeframe::OneWeek {
                "weekly"
            } else {
                "daily"
            };
            let response: HistoryResponse = self
                .client
                .get_json(
                    "/v1/markets/history",
                    &[
                        ("symbol", symbol.to_string()),
                        ("interval", interval.to_string()),
                        ("start", start.date_naive().to_string()),
                        ("end", end.date_naive().to_string()),
                    ],
                )
                .await?;
            return Ok(response
                .history
                .and_then(|h| h.day)
                .map(OneOrMany::into_vec)
                .unwrap_or_default()
                .into_iter()
                .map(day_to_bar)
                .collect());
        }

        let (interval, needs_resample) = timesales_interval(timeframe);
        let response: TimesalesResponse = self
            .client
            .get_json(
                "/v1/markets/timesales",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("start", exchange_minute(start)),
                    ("end", exchange_minute(end)),
                    ("session_filter", "all".to_string()),
                ],
            )
            .await?;

        let bars: Vec<Bar> = response
            .series
            .and_then(|s| s.data)
            .map(OneOrMany::into_vec)
            .unwrap_or_default()
            .into_iter()
            .filter_map(point_to_bar)
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
        let expirations = match expiry {
            Some(date) => vec![date],
            None => {
                let listed = self.fetch_expirations(symbol).await?;
                select_expirations(listed, Utc::now().date_naive())
            }
        };
        debug!(
            "Tradier: loading {} expirations for {}",
            expirations.len(),
            symbol
        );

        // Every leg goes through the same limiter, so a partial failure keeps
        // the legs that did load.
        let legs = join_all(
            expirations
                .iter()
                .map(|date| self.fetch_chain(symbol, *date)),
        )
        .await;

        let mut contracts = Vec::new();
        let mut first_error = None;
        for leg in legs {
            match leg {
                Ok(mut c) => contracts.append(&mut c),
                Err(e) => {
                    warn!("Tradier: chain leg failed for {}: {}", symbol, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if contracts.is_empty() => Err(e),
            _ => Ok(OptionChain::from_contracts(symbol, contracts)),
        }
    }
}
