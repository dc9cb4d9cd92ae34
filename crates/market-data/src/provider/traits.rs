//! Market data provider trait definitions.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::errors::MarketDataError;
use crate::models::{
    Bar, Fundamentals, OptionChain, Payload, Quote, ResourceRequest, Sentiment, Timeframe,
};
use crate::registry::RateLimitConfig;

use super::capabilities::ProviderCapabilities;

/// Trait for market data providers.
///
/// Implement this trait to add support for a new market data source.
/// Every fetch method defaults to `NotSupported`; a provider overrides the
/// ones listed in its [`ProviderCapabilities`].
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use optionscope_market_data::provider::{MarketDataProvider, ProviderCapabilities};
///
/// struct MyProvider {
///     client: ProviderClient,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> &'static str {
///         "MY_PROVIDER"
///     }
///
///     fn capabilities(&self) -> ProviderCapabilities {
///         ProviderCapabilities {
///             resources: &[ResourceKind::Quote],
///         }
///     }
///
///     fn rate_limit(&self) -> RateLimitConfig {
///         RateLimitConfig::per_minute(60, Duration::from_secs(30))
///     }
///
///     async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Unique identifier for this provider, e.g. "TRADIER".
    ///
    /// Used for logging, source tags and `PROVIDER_ORDER`.
    fn id(&self) -> &'static str;

    /// Provider priority for ordering.
    ///
    /// Lower values = higher priority. Default is 10.
    fn priority(&self) -> u8 {
        10
    }

    fn capabilities(&self) -> ProviderCapabilities;

    /// Documented vendor limit and cooldown. The client enforces it.
    fn rate_limit(&self) -> RateLimitConfig;

    async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::not_supported(self.id(), "latest_quote"))
    }

    /// Bars between `start` and `end`, ascending.
    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let _ = (symbol, timeframe, start, end);
        Err(MarketDataError::not_supported(self.id(), "historical_bars"))
    }

    /// Option chain for one expiry, or for every listed expiry when `None`.
    async fn get_option_chain(
        &self,
        symbol: &str,
        expiry: Option<NaiveDate>,
    ) -> Result<OptionChain, MarketDataError> {
        let _ = (symbol, expiry);
        Err(MarketDataError::not_supported(self.id(), "option_chain"))
    }

    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::not_supported(self.id(), "fundamentals"))
    }

    async fn get_sentiment(&self, symbol: &str) -> Result<Sentiment, MarketDataError> {
        let _ = symbol;
        Err(MarketDataError::not_supported(self.id(), "sentiment"))
    }

    /// Dispatch a waterfall request to the matching method.
    async fn fetch(&self, request: &ResourceRequest) -> Result<Payload, MarketDataError> {
        match request {
            ResourceRequest::Quote { symbol } => {
                self.get_latest_quote(symbol).await.map(Payload::Quote)
            }
            ResourceRequest::Bars { symbol, timeframe } => {
                let end = Utc::now();
                let start = end - timeframe.lookback();
                self.get_historical_bars(symbol, *timeframe, start, end)
                    .await
                    .map(Payload::Bars)
            }
            ResourceRequest::OptionChain { symbol, expiry } => self
                .get_option_chain(symbol, *expiry)
                .await
                .map(Payload::OptionChain),
            ResourceRequest::Fundamentals { symbol } => {
                self.get_fundamentals(symbol).await.map(Payload::Fundamentals)
            }
            ResourceRequest::Sentiment { symbol } => {
                self.get_sentiment(symbol).await.map(Payload::Sentiment)
            }
        }
    }
}
