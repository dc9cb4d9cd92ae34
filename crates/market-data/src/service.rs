//! Orchestrator-facing fetch contracts.
//!
//! [`MarketDataService`] puts the resource cache in front of the waterfall:
//! a fresh entry is served as `Cached`, otherwise one coalesced waterfall run
//! answers every concurrent caller (`Live`). When the waterfall is exhausted
//! an expired entry is served as `Stale`; only when nothing was ever cached
//! does the caller see absence.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};

use crate::cache::{CacheLookup, ResourceCache};
use crate::errors::MarketDataError;
use crate::models::{
    normalize_symbol, Bar, Freshness, Fundamentals, OptionChain, Payload, Quote, ResourceKind,
    ResourceRequest, Sentiment, Sourced, Timeframe,
};
use crate::registry::WaterfallResolver;

/// Data access used by the analytics layer.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_live_quote(&self, symbol: &str) -> Option<Sourced<Quote>>;

    async fn fetch_live_price(&self, symbol: &str) -> Option<Sourced<f64>> {
        self.fetch_live_quote(symbol)
            .await
            .map(|quote| quote.map(|q| q.price))
    }

    /// Absence is reported as `NotFound`.
    async fn fetch_historical_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Sourced<Vec<Bar>>, MarketDataError>;

    async fn fetch_option_chain(
        &self,
        symbol: &str,
        expiry: Option<NaiveDate>,
    ) -> Option<Sourced<OptionChain>>;

    async fn fetch_fundamentals(&self, symbol: &str) -> Option<Sourced<Fundamentals>>;

    async fn fetch_sentiment(&self, symbol: &str) -> Option<Sourced<Sentiment>>;
}

/// Freshness window per resource family. Bars use [`Timeframe::cache_ttl`].
#[derive(Clone, Debug, PartialEq)]
pub struct CacheTtls {
    pub quote: Duration,
    pub option_chain: Duration,
    pub fundamentals: Duration,
    pub sentiment: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(10),
            option_chain: Duration::from_secs(5 * 60),
            fundamentals: Duration::from_secs(24 * 60 * 60),
            sentiment: Duration::from_secs(30 * 60),
        }
    }
}

impl CacheTtls {
    pub fn for_request(&self, request: &ResourceRequest) -> Duration {
        match request {
            ResourceRequest::Quote { .. } => self.quote,
            ResourceRequest::Bars { timeframe, .. } => timeframe.cache_ttl(),
            ResourceRequest::OptionChain { .. } => self.option_chain,
            ResourceRequest::Fundamentals { .. } => self.fundamentals,
            ResourceRequest::Sentiment { .. } => self.sentiment,
        }
    }
}

pub struct MarketDataService {
    resolver: Arc<WaterfallResolver>,
    cache: ResourceCache<ResourceRequest, Sourced<Payload>, MarketDataError>,
    ttls: CacheTtls,
}

impl MarketDataService {
    pub fn new(resolver: Arc<WaterfallResolver>) -> Self {
        Self::with_ttls(resolver, CacheTtls::default())
    }

    pub fn with_ttls(resolver: Arc<WaterfallResolver>, ttls: CacheTtls) -> Self {
        Self {
            resolver,
            cache: ResourceCache::new(),
            ttls,
        }
    }

    pub fn resolver(&self) -> &WaterfallResolver {
        &self.resolver
    }

    /// Cache, then coalesced waterfall, then stale fallback.
    pub async fn fetch(
        &self,
        request: &ResourceRequest,
    ) -> Result<Sourced<Payload>, MarketDataError> {
        let ttl = self.ttls.for_request(request);
        let lookup = self
            .cache
            .get_or_fetch(request, ttl, || self.resolver.resolve(request))
            .await;

        match lookup {
            Ok(CacheLookup::Fetched(sourced)) => Ok(sourced),
            Ok(CacheLookup::Cached(sourced)) => {
                debug!("{}: served from cache ({})", request, sourced.source.provider);
                let source = sourced.source.with_freshness(Freshness::Cached);
                Ok(Sourced::new(sourced.data, source))
            }
            Err(e) => match self.cache.get_stale(request) {
                Some(stale) => {
                    warn!(
                        "{}: every provider failed, serving stale data from {}",
                        request, stale.source.provider
                    );
                    let source = stale.source.with_freshness(Freshness::Stale);
                    Ok(Sourced::new(stale.data, source))
                }
                None => Err(e),
            },
        }
    }

    /// Like [`fetch`](Self::fetch) but reports absence as `None`.
    async fn fetch_optional<T>(
        &self,
        request: ResourceRequest,
        extract: fn(Payload) -> Result<T, MarketDataError>,
    ) -> Option<Sourced<T>> {
        let kind: ResourceKind = request.kind();
        match self.fetch(&request).await {
            Ok(sourced) => match extract(sourced.data) {
                Ok(data) => Some(Sourced::new(data, sourced.source)),
                Err(e) => {
                    warn!("{}: unexpected payload for {}: {}", request, kind, e);
                    None
                }
            },
            Err(e) => {
                debug!("{}: {}", request, e);
                None
            }
        }
    }
}

#[async_trait]
impl MarketDataSource for MarketDataService {
    async fn fetch_live_quote(&self, symbol: &str) -> Option<Sourced<Quote>> {
        let request = ResourceRequest::Quote {
            symbol: normalize_symbol(symbol),
        };
        self.fetch_optional(request, Payload::into_quote).await
    }

    async fn fetch_historical_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Sourced<Vec<Bar>>, MarketDataError> {
        let request = ResourceRequest::Bars {
            symbol: normalize_symbol(symbol),
            timeframe,
        };
        let sourced = self.fetch(&request).await?;
        let bars = sourced.data.into_bars()?;
        Ok(Sourced::new(bars, sourced.source))
    }

    async fn fetch_option_chain(
        &self,
        symbol: &str,
        expiry: Option<NaiveDate>,
    ) -> Option<Sourced<OptionChain>> {
        let request = ResourceRequest::OptionChain {
            symbol: normalize_symbol(symbol),
            expiry,
        };
        self.fetch_optional(request, Payload::into_option_chain)
            .await
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Option<Sourced<Fundamentals>> {
        let request = ResourceRequest::Fundamentals {
            symbol: normalize_symbol(symbol),
        };
        self.fetch_optional(request, Payload::into_fundamentals)
            .await
    }

    async fn fetch_sentiment(&self, symbol: &str) -> Option<Sourced<Sentiment>> {
        let request = ResourceRequest::Sentiment {
            symbol: normalize_symbol(symbol),
        };
        self.fetch_optional(request, Payload::into_sentiment).await
    }
}
