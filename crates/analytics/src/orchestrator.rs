//! Multi-timeframe analysis of a symbol.
//!
//! For every configured timeframe the orchestrator fetches the series,
//! reconciles it with the live price, computes indicators and keeps the
//! latest snapshot. Timeframes fail softly: a short or missing series is
//! reported in the result while the others complete. The primary timeframe
//! (daily when configured) drives the options signals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use optionscope_market_data::{
    normalize_symbol, reconcile, Bar, DataSource, MarketDataError, MarketDataSource, Quote,
    Sourced, StitchConfig, Timeframe,
};
use serde::{Deserialize, Serialize};

use crate::engine::{OptionsSignalEngine, OptionsSignals, SignalRequest};
use crate::errors::{AnalyticsError, Result};
use crate::indicators::{compute, IndicatorConfig, IndicatorSnapshot, MIN_BARS};
use crate::trend::Trend;

#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorConfig {
    pub timeframes: Vec<Timeframe>,
    pub indicator: IndicatorConfig,
    pub stitch: StitchConfig,
    pub min_bars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            timeframes: vec![
                Timeframe::OneDay,
                Timeframe::OneHour,
                Timeframe::FifteenMinutes,
            ],
            indicator: IndicatorConfig::default(),
            stitch: StitchConfig::default(),
            min_bars: MIN_BARS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeframeStatus {
    Ready,
    InsufficientData { required: usize, available: usize },
    Unavailable { reason: String },
}

impl From<&MarketDataError> for TimeframeStatus {
    /// A short series stays a soft `InsufficientData`; any other failure
    /// makes the timeframe unavailable.
    fn from(err: &MarketDataError) -> Self {
        match err {
            MarketDataError::InsufficientData {
                required,
                available,
            } => Self::InsufficientData {
                required: *required,
                available: *available,
            },
            other => Self::Unavailable {
                reason: other.to_string(),
            },
        }
    }
}

fn ensure_min_bars(bars: &[Bar], required: usize) -> std::result::Result<(), MarketDataError> {
    if bars.len() < required {
        return Err(MarketDataError::InsufficientData {
            required,
            available: bars.len(),
        });
    }
    Ok(())
}

/// What the stitcher changed, if anything.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StitchSummary {
    pub time_shift_secs: Option<i64>,
    pub scale_factor: Option<f64>,
    pub spliced: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    #[serde(flatten)]
    pub status: TimeframeStatus,
    pub source: Option<DataSource>,
    pub bar_count: usize,
    pub stitch: Option<StitchSummary>,
    pub latest: Option<IndicatorSnapshot>,
    #[serde(skip)]
    bars: Vec<Bar>,
}

impl TimeframeAnalysis {
    fn unavailable(timeframe: Timeframe, err: &MarketDataError) -> Self {
        Self {
            timeframe,
            status: TimeframeStatus::from(err),
            source: None,
            bar_count: 0,
            stitch: None,
            latest: None,
            bars: Vec::new(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == TimeframeStatus::Ready
    }

    pub fn trend(&self) -> Option<Trend> {
        self.latest.as_ref().map(|s| s.trend)
    }

    /// Reconciled bars this analysis was computed from.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendAlignment {
    pub bullish: usize,
    pub bearish: usize,
    pub neutral: usize,
    /// Trend held by more than half of the ready timeframes, else NEUTRAL
    pub overall: Trend,
}

impl TrendAlignment {
    pub fn from_trends(trends: impl IntoIterator<Item = Trend>) -> Self {
        let mut alignment = Self::default();
        for trend in trends {
            match trend {
                Trend::Bullish => alignment.bullish += 1,
                Trend::Bearish => alignment.bearish += 1,
                Trend::Neutral => alignment.neutral += 1,
            }
        }
        let total = alignment.bullish + alignment.bearish + alignment.neutral;
        alignment.overall = if alignment.bullish * 2 > total {
            Trend::Bullish
        } else if alignment.bearish * 2 > total {
            Trend::Bearish
        } else {
            Trend::Neutral
        };
        alignment
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub generated_at: DateTime<Utc>,
    pub quote: Option<Sourced<Quote>>,
    pub price: f64,
    pub timeframes: Vec<TimeframeAnalysis>,
    pub alignment: TrendAlignment,
    pub primary_timeframe: Option<Timeframe>,
    pub signals: Option<OptionsSignals>,
}

pub struct MultiTimeframeOrchestrator {
    source: Arc<dyn MarketDataSource>,
    engine: OptionsSignalEngine,
    config: OrchestratorConfig,
}

impl MultiTimeframeOrchestrator {
    pub fn new(source: Arc<dyn MarketDataSource>, config: OrchestratorConfig) -> Self {
        let engine = OptionsSignalEngine::new(source.clone());
        Self {
            source,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &OptionsSignalEngine {
        &self.engine
    }

    pub async fn analyze(&self, symbol: &str) -> Result<SymbolAnalysis> {
        self.analyze_at(symbol, Utc::now()).await
    }

    /// Analyze with an explicit clock, used for the stitcher and expiry math.
    pub async fn analyze_at(&self, symbol: &str, now: DateTime<Utc>) -> Result<SymbolAnalysis> {
        let symbol = normalize_symbol(symbol);
        let quote = self.source.fetch_live_quote(&symbol).await;
        let live_price = quote
            .as_ref()
            .map(|q| q.data.price)
            .filter(|p| p.is_finite() && *p > 0.0);

        let timeframes = join_all(
            self.config
                .timeframes
                .iter()
                .map(|tf| self.analyze_timeframe(&symbol, *tf, live_price, now)),
        )
        .await;

        let primary = timeframes
            .iter()
            .find(|t| t.timeframe == Timeframe::OneDay && t.is_ready())
            .or_else(|| timeframes.iter().find(|t| t.is_ready()));

        let fallback_price = timeframes
            .iter()
            .find_map(|t| t.bars.last().map(|b| b.close));
        let Some(price) = live_price.or(fallback_price) else {
            return Err(AnalyticsError::MarketData(MarketDataError::NotFound(
                format!("no quote or bars for {}", symbol),
            )));
        };

        let signals = match primary.and_then(|p| p.latest.as_ref()) {
            Some(snapshot) => {
                let daily_bars = timeframes
                    .iter()
                    .find(|t| t.timeframe == Timeframe::OneDay)
                    .map(|t| t.bars.as_slice())
                    .unwrap_or(&[]);
                let request = SignalRequest {
                    symbol: &symbol,
                    snapshot,
                    live_price,
                    daily_bars,
                    now,
                };
                Some(self.engine.evaluate(&request).await)
            }
            None => {
                warn!("{}: no timeframe has enough data for options signals", symbol);
                None
            }
        };

        let alignment = TrendAlignment::from_trends(
            timeframes
                .iter()
                .filter(|t| t.is_ready())
                .filter_map(|t| t.trend()),
        );
        info!(
            "{}: price {:.2}, alignment {:?} ({} bullish / {} bearish)",
            symbol, price, alignment.overall, alignment.bullish, alignment.bearish
        );

        Ok(SymbolAnalysis {
            primary_timeframe: primary.map(|p| p.timeframe),
            symbol,
            generated_at: now,
            quote,
            price,
            timeframes,
            alignment,
            signals,
        })
    }

    async fn analyze_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        live_price: Option<f64>,
        now: DateTime<Utc>,
    ) -> TimeframeAnalysis {
        let series = match self.source.fetch_historical_series(symbol, timeframe).await {
            Ok(series) => series,
            Err(e) => {
                debug!("{} {}: {}", symbol, timeframe, e);
                return TimeframeAnalysis::unavailable(timeframe, &e);
            }
        };

        let outcome = reconcile(&series.data, live_price, now, &self.config.stitch);
        let stitch = outcome.was_repaired().then(|| StitchSummary {
            time_shift_secs: outcome.time_shift.map(|d| d.num_seconds()),
            scale_factor: outcome.scale_factor,
            spliced: outcome.spliced,
        });
        let bars = outcome.bars;
        let bar_count = bars.len();

        if let Err(err) = ensure_min_bars(&bars, self.config.min_bars) {
            debug!("{} {}: {}", symbol, timeframe, err);
            return TimeframeAnalysis {
                timeframe,
                status: TimeframeStatus::from(&err),
                source: Some(series.source),
                bar_count,
                stitch,
                latest: None,
                bars,
            };
        }

        let latest = compute(&bars, &self.config.indicator).pop();
        TimeframeAnalysis {
            timeframe,
            status: TimeframeStatus::Ready,
            source: Some(series.source),
            bar_count,
            stitch,
            latest,
            bars,
        }
    }

    /// Analyze several symbols concurrently. Results keep input order.
    pub async fn analyze_many(&self, symbols: &[String]) -> Vec<(String, Result<SymbolAnalysis>)> {
        let results = join_all(symbols.iter().map(|s| self.analyze(s))).await;
        symbols.iter().cloned().zip(results).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone};
    use optionscope_market_data::{
        Fundamentals, MarketSession, OptionChain, OptionContract, OptionType, Sentiment,
    };
    use std::collections::HashMap;

    use crate::options::Direction;

    #[derive(Default)]
    struct FixtureSource {
        quotes: HashMap<String, f64>,
        quote_time: Option<DateTime<Utc>>,
        series: HashMap<(String, Timeframe), Vec<Bar>>,
        chain: Option<OptionChain>,
    }

    #[async_trait]
    impl MarketDataSource for FixtureSource {
        async fn fetch_live_quote(&self, symbol: &str) -> Option<Sourced<Quote>> {
            self.quotes.get(symbol).map(|price| {
                let ts = self.quote_time.unwrap_or_else(now);
                Sourced::new(Quote::new(symbol, *price, 0.0, 1_000, ts), DataSource::live("MOCK"))
            })
        }

        async fn fetch_historical_series(
            &self,
            symbol: &str,
            timeframe: Timeframe,
        ) -> std::result::Result<Sourced<Vec<Bar>>, MarketDataError> {
            self.series
                .get(&(symbol.to_string(), timeframe))
                .map(|bars| Sourced::new(bars.clone(), DataSource::live("MOCK")))
                .ok_or_else(|| MarketDataError::NotFound(format!("bars {} {}", symbol, timeframe)))
        }

        async fn fetch_option_chain(
            &self,
            _symbol: &str,
            _expiry: Option<NaiveDate>,
        ) -> Option<Sourced<OptionChain>> {
            self.chain
                .clone()
                .map(|chain| Sourced::new(chain, DataSource::live("MOCK")))
        }

        async fn fetch_fundamentals(&self, _symbol: &str) -> Option<Sourced<Fundamentals>> {
            None
        }

        async fn fetch_sentiment(&self, _symbol: &str) -> Option<Sourced<Sentiment>> {
            None
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 12, 15, 0, 0).unwrap()
    }

    fn series(count: usize, step: Duration, slope: f64) -> Vec<Bar> {
        let start = now() - step * count as i32;
        (0..count)
            .map(|i| {
                let close = 100.0 + slope * i as f64;
                Bar::new(
                    start + step * i as i32,
                    close,
                    close + 0.5,
                    close - 0.5,
                    close,
                    10_000.0,
                )
            })
            .collect()
    }

    fn orchestrator(source: FixtureSource) -> MultiTimeframeOrchestrator {
        MultiTimeframeOrchestrator::new(Arc::new(source), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn test_short_timeframe_is_soft_failure() {
        let mut source = FixtureSource::default();
        source.quotes.insert("AAPL".to_string(), 160.0);
        source.series.insert(
            ("AAPL".to_string(), Timeframe::OneDay),
            series(120, Duration::days(1), 0.5),
        );
        source.series.insert(
            ("AAPL".to_string(), Timeframe::OneHour),
            series(10, Duration::hours(1), 0.1),
        );

        let analysis = orchestrator(source)
            .analyze_at("aapl", now())
            .await
            .unwrap();

        assert_eq!(analysis.symbol, "AAPL");
        assert_eq!(analysis.price, 160.0);
        assert_eq!(analysis.primary_timeframe, Some(Timeframe::OneDay));
        assert_eq!(analysis.timeframes.len(), 3);

        let daily = &analysis.timeframes[0];
        assert!(daily.is_ready());
        assert_eq!(daily.bars().last().unwrap().close, 160.0);
        assert_eq!(daily.trend(), Some(Trend::Bullish));

        assert_eq!(
            analysis.timeframes[1].status,
            TimeframeStatus::InsufficientData {
                required: 26,
                available: 10,
            }
        );
        assert!(matches!(
            analysis.timeframes[2].status,
            TimeframeStatus::Unavailable { .. }
        ));

        assert_eq!(analysis.alignment.bullish, 1);
        assert_eq!(analysis.alignment.overall, Trend::Bullish);

        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["timeframes"][1]["status"], "INSUFFICIENT_DATA");
        assert_eq!(json["timeframes"][1]["available"], 10);
        assert_eq!(json["timeframes"][0]["timeframe"], "1d");

        // Without a chain the engine still answers, with WAIT.
        let signals = analysis.signals.unwrap();
        assert_eq!(
            signals.recommendation.reason.as_deref(),
            Some("No option chain available")
        );
        assert_eq!(signals.gamma_squeeze.score, 0);
        assert!(signals.put_call_ratio.is_none());
    }

    #[tokio::test]
    async fn test_weekend_uses_current_session_not_last_trade() {
        // Last trade Friday 15:30 ET, analysis Saturday noon ET.
        let friday = Utc.with_ymd_and_hms(2024, 3, 15, 19, 30, 0).unwrap();
        let saturday = Utc.with_ymd_and_hms(2024, 3, 16, 16, 0, 0).unwrap();
        assert_eq!(MarketSession::at(friday), MarketSession::Regular);
        assert_eq!(MarketSession::at(saturday), MarketSession::Closed);

        let expiry = NaiveDate::from_ymd_opt(2024, 4, 15).unwrap();
        let contracts = (150..=170)
            .step_by(5)
            .flat_map(|strike| {
                [OptionType::Call, OptionType::Put].map(|option_type| OptionContract {
                    root: "AAPL".to_string(),
                    strike: strike as f64,
                    expiry,
                    option_type,
                    bid: 2.0,
                    ask: 2.2,
                    last: 2.1,
                    volume: 2,
                    open_interest: 5_000,
                    greeks: None,
                })
            })
            .collect();

        let mut source = FixtureSource {
            quote_time: Some(friday),
            chain: Some(OptionChain::from_contracts("AAPL", contracts)),
            ..Default::default()
        };
        source.quotes.insert("AAPL".to_string(), 160.0);
        source.series.insert(
            ("AAPL".to_string(), Timeframe::OneDay),
            series(120, Duration::days(1), 0.5),
        );

        let analysis = orchestrator(source)
            .analyze_at("AAPL", saturday)
            .await
            .unwrap();
        assert_eq!(analysis.quote.as_ref().unwrap().data.session, MarketSession::Regular);

        let recommendation = analysis.signals.unwrap().recommendation;
        assert_eq!(recommendation.direction, Direction::Call, "{:?}", recommendation.reason);
        let contract = recommendation.contract.unwrap();
        assert_eq!(contract.expiry, expiry);
        assert_eq!(contract.strike, 160.0);
    }

    #[tokio::test]
    async fn test_no_quote_and_no_bars_is_error() {
        let err = orchestrator(FixtureSource::default())
            .analyze_at("ZZZZ", now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::MarketData(MarketDataError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_quote_only_has_no_signals() {
        let mut source = FixtureSource::default();
        source.quotes.insert("TSLA".to_string(), 175.0);

        let analysis = orchestrator(source).analyze_at("TSLA", now()).await.unwrap();
        assert_eq!(analysis.price, 175.0);
        assert!(analysis.signals.is_none());
        assert_eq!(analysis.alignment.overall, Trend::Neutral);
    }

    #[tokio::test]
    async fn test_analyze_many_keeps_order() {
        let mut source = FixtureSource::default();
        source.quotes.insert("MSFT".to_string(), 410.0);
        let symbols = vec!["MSFT".to_string(), "NOPE".to_string()];

        let results = orchestrator(source).analyze_many(&symbols).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "MSFT");
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }

    #[test]
    fn test_status_from_market_data_error() {
        let short = MarketDataError::InsufficientData {
            required: 26,
            available: 3,
        };
        assert_eq!(
            TimeframeStatus::from(&short),
            TimeframeStatus::InsufficientData {
                required: 26,
                available: 3,
            }
        );
        assert!(ensure_min_bars(&[], 1).is_err());
        assert!(ensure_min_bars(&series(26, Duration::days(1), 0.0), 26).is_ok());

        let missing = MarketDataError::NotFound("bars AAPL 1h".to_string());
        assert_eq!(
            TimeframeStatus::from(&missing),
            TimeframeStatus::Unavailable {
                reason: "Not found: bars AAPL 1h".to_string(),
            }
        );
    }

    #[test]
    fn test_alignment_majority() {
        let alignment =
            TrendAlignment::from_trends([Trend::Bullish, Trend::Bearish, Trend::Neutral]);
        assert_eq!(alignment.overall, Trend::Neutral);

        let alignment =
            TrendAlignment::from_trends([Trend::Bearish, Trend::Bearish, Trend::Bullish]);
        assert_eq!(alignment.overall, Trend::Bearish);
    }
}
