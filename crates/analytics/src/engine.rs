//! Options signal engine: gathers chain, fundamentals and sentiment for a
//! symbol and runs the recommendation, put/call and gamma scorers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use log::{debug, warn};
use optionscope_market_data::{
    normalize_symbol, Bar, DataSource, Freshness, Fundamentals, MarketDataSource, MarketSession,
    OptionChain, ResourceCache, Sentiment, Sourced,
};
use serde::{Deserialize, Serialize};

use crate::indicators::{realized_volatility, IndicatorSnapshot};
use crate::options::{
    gamma_squeeze_score, put_call_ratio, recommend, GammaSqueezeInput, GammaSqueezeScore,
    PutCallRatio, Recommendation, RecommendationContext, RecommendationInput,
};

/// Daily bars used for realized volatility.
pub const REALIZED_VOL_WINDOW: usize = 20;

/// How long a computed put/call ratio counts as fresh.
const PCR_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsSignals {
    pub recommendation: Recommendation,
    pub put_call_ratio: Option<Sourced<PutCallRatio>>,
    pub gamma_squeeze: GammaSqueezeScore,
    pub realized_volatility: Option<f64>,
    pub chain_source: Option<DataSource>,
    pub fundamentals: Option<Sourced<Fundamentals>>,
    pub sentiment: Option<Sourced<Sentiment>>,
}

/// Inputs from the indicator side of the analysis.
#[derive(Clone, Copy, Debug)]
pub struct SignalRequest<'a> {
    pub symbol: &'a str,
    pub snapshot: &'a IndicatorSnapshot,
    /// Live price when known; otherwise the snapshot close is used
    pub live_price: Option<f64>,
    pub daily_bars: &'a [Bar],
    pub now: DateTime<Utc>,
}

pub struct OptionsSignalEngine {
    source: Arc<dyn MarketDataSource>,
    /// Last good ratio per symbol, served stale when the chain is unavailable.
    pcr_cache: ResourceCache<String, Sourced<PutCallRatio>>,
}

impl OptionsSignalEngine {
    pub fn new(source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            source,
            pcr_cache: ResourceCache::new(),
        }
    }

    /// Put/call ratio from the live chain, or the last good value tagged
    /// `Stale` when the chain cannot be fetched.
    pub async fn put_call_ratio(&self, symbol: &str) -> Option<Sourced<PutCallRatio>> {
        let symbol = normalize_symbol(symbol);
        let chain = self.source.fetch_option_chain(&symbol, None).await;
        self.ratio_from_chain(&symbol, chain.as_ref())
    }

    fn ratio_from_chain(
        &self,
        symbol: &str,
        chain: Option<&Sourced<OptionChain>>,
    ) -> Option<Sourced<PutCallRatio>> {
        if let Some(chain) = chain.filter(|c| !c.data.is_empty()) {
            let ratio = Sourced::new(put_call_ratio(&chain.data), chain.source.clone());
            self.pcr_cache
                .put(symbol.to_string(), ratio.clone(), PCR_TTL);
            return Some(ratio);
        }

        let stale = self.pcr_cache.get_stale(&symbol.to_string())?;
        warn!(
            "{}: option chain unavailable, serving last put/call ratio from {}",
            symbol, stale.source.provider
        );
        let source = stale.source.with_freshness(Freshness::Stale);
        Some(Sourced::new(stale.data, source))
    }

    pub async fn evaluate(&self, request: &SignalRequest<'_>) -> OptionsSignals {
        let symbol = normalize_symbol(request.symbol);
        let (chain, fundamentals, sentiment) = tokio::join!(
            self.source.fetch_option_chain(&symbol, None),
            self.source.fetch_fundamentals(&symbol),
            self.source.fetch_sentiment(&symbol),
        );
        debug!(
            "{}: chain {}, fundamentals {}, sentiment {}",
            symbol,
            chain.as_ref().map(|c| c.source.to_string()).unwrap_or_else(|| "none".into()),
            fundamentals.as_ref().map(|f| f.source.to_string()).unwrap_or_else(|| "none".into()),
            sentiment.as_ref().map(|s| s.source.to_string()).unwrap_or_else(|| "none".into()),
        );

        let input = RecommendationInput::from_snapshot(request.snapshot, request.live_price);
        let context = RecommendationContext {
            today: request.now.with_timezone(&New_York).date_naive(),
            session: MarketSession::at(request.now),
            fundamentals: fundamentals.as_ref().map(|f| &f.data),
            sentiment: sentiment.as_ref().map(|s| &s.data),
        };
        let chain_data = chain.as_ref().map(|c| &c.data);
        let recommendation = recommend(&input, chain_data, &context);

        let realized_vol = realized_volatility(request.daily_bars, REALIZED_VOL_WINDOW);
        let gamma_squeeze = gamma_squeeze_score(&GammaSqueezeInput {
            symbol: &symbol,
            price: input.price,
            atr: input.atr,
            week52_high: fundamentals.as_ref().and_then(|f| f.data.week52_high),
            week52_low: fundamentals.as_ref().and_then(|f| f.data.week52_low),
            realized_vol,
            chain: chain_data,
        });

        OptionsSignals {
            put_call_ratio: self.ratio_from_chain(&symbol, chain.as_ref()),
            chain_source: chain.as_ref().map(|c| c.source.clone()),
            recommendation,
            gamma_squeeze,
            realized_volatility: realized_vol,
            fundamentals,
            sentiment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{compute, IndicatorConfig};
    use crate::options::Direction;
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone};
    use optionscope_market_data::{
        Greeks, MarketDataError, OptionContract, OptionType, Quote, Timeframe,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ChainSource {
        chain: OptionChain,
        available: AtomicBool,
    }

    #[async_trait]
    impl MarketDataSource for ChainSource {
        async fn fetch_live_quote(&self, _symbol: &str) -> Option<Sourced<Quote>> {
            None
        }

        async fn fetch_historical_series(
            &self,
            symbol: &str,
            timeframe: Timeframe,
        ) -> Result<Sourced<Vec<Bar>>, MarketDataError> {
            Err(MarketDataError::NotFound(format!("bars {} {}", symbol, timeframe)))
        }

        async fn fetch_option_chain(
            &self,
            _symbol: &str,
            _expiry: Option<NaiveDate>,
        ) -> Option<Sourced<OptionChain>> {
            self.available
                .load(Ordering::SeqCst)
                .then(|| Sourced::new(self.chain.clone(), DataSource::live("TRADIER")))
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

    fn chain() -> OptionChain {
        let expiry = NaiveDate::from_ymd_opt(2024, 4, 12).unwrap();
        let contract = |strike: f64, option_type: OptionType, volume: u64| OptionContract {
            root: "NVDA".to_string(),
            strike,
            expiry,
            option_type,
            bid: 3.0,
            ask: 3.2,
            last: 3.1,
            volume,
            open_interest: 500,
            greeks: Some(Greeks {
                delta: 0.5,
                implied_volatility: Some(0.5),
                ..Default::default()
            }),
        };
        let mut contracts = Vec::new();
        for strike in (100..=160).step_by(5) {
            contracts.push(contract(strike as f64, OptionType::Call, 1_000));
            contracts.push(contract(strike as f64, OptionType::Put, 400));
        }
        OptionChain::from_contracts("NVDA", contracts)
    }

    fn uptrend() -> Vec<Bar> {
        let start = now() - ChronoDuration::days(120);
        (0..120)
            .map(|i| {
                let close = 100.0 + i as f64 * 0.3 + if i % 3 == 0 { -0.8 } else { 0.4 };
                Bar::new(
                    start + ChronoDuration::days(i),
                    close - 0.2,
                    close + 1.0,
                    close - 1.0,
                    close,
                    1_000_000.0,
                )
            })
            .collect()
    }

    fn engine(available: bool) -> (Arc<ChainSource>, OptionsSignalEngine) {
        let source = Arc::new(ChainSource {
            chain: chain(),
            available: AtomicBool::new(available),
        });
        let engine = OptionsSignalEngine::new(source.clone());
        (source, engine)
    }

    #[tokio::test]
    async fn test_evaluate_combines_signals() {
        let (_, engine) = engine(true);
        let bars = uptrend();
        let snapshots = compute(&bars, &IndicatorConfig::default());
        let snapshot = snapshots.last().unwrap();

        let signals = engine
            .evaluate(&SignalRequest {
                symbol: "nvda",
                snapshot,
                live_price: None,
                daily_bars: &bars,
                now: now(),
            })
            .await;

        assert_eq!(signals.recommendation.direction, Direction::Call);
        let pcr = signals.put_call_ratio.unwrap();
        assert!((pcr.data.volume_ratio - 0.4).abs() < 1e-12);
        assert_eq!(pcr.source.freshness, Freshness::Live);
        assert!(signals.gamma_squeeze.score >= 40);
        assert!(signals.realized_volatility.is_some());
        assert_eq!(signals.chain_source, Some(DataSource::live("TRADIER")));
    }

    #[tokio::test]
    async fn test_put_call_ratio_serves_stale_after_chain_loss() {
        let (source, engine) = engine(true);
        let live = engine.put_call_ratio("NVDA").await.unwrap();
        assert_eq!(live.source.freshness, Freshness::Live);

        source.available.store(false, Ordering::SeqCst);
        let stale = engine.put_call_ratio("NVDA").await.unwrap();
        assert!(stale.source.is_stale());
        assert_eq!(stale.data, live.data);
    }

    #[tokio::test]
    async fn test_put_call_ratio_absent_without_history() {
        let (_, engine) = engine(false);
        assert!(engine.put_call_ratio("NVDA").await.is_none());
    }
}
