//! Deterministic provider waterfall.
//!
//! Providers are tried strictly one after another in priority order. The
//! first validated success wins and later tiers are never called. Every
//! failure, local refusal or timeout moves on to the next tier; exhausting
//! the list yields `NotFound`.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use super::{DataValidator, FetchDiagnostics, SkipReason};
use crate::errors::MarketDataError;
use crate::models::{DataSource, Payload, ProviderId, ResourceKind, ResourceRequest, Sourced};
use crate::provider::MarketDataProvider;

/// Deadline for a single provider tier.
pub const DEFAULT_TIER_TIMEOUT: Duration = Duration::from_secs(8);

pub struct WaterfallResolver {
    providers: Vec<Arc<dyn MarketDataProvider>>,
    /// Configured order (provider_id -> rank). Lower values = higher priority.
    /// Providers without an entry fall back to their own priority.
    custom_priorities: HashMap<String, i32>,
    validator: DataValidator,
    tier_timeout: Duration,
}

impl WaterfallResolver {
    pub fn new(providers: Vec<Arc<dyn MarketDataProvider>>) -> Self {
        Self::with_priorities(providers, HashMap::new())
    }

    pub fn with_priorities(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        custom_priorities: HashMap<String, i32>,
    ) -> Self {
        for provider in &providers {
            let limit = provider.rate_limit();
            debug!(
                "Registered provider '{}' (priority {}, {}/{} req per {:?})",
                provider.id(),
                provider.priority(),
                limit.effective_limit(),
                limit.documented_limit,
                limit.window
            );
        }

        Self {
            providers,
            custom_priorities,
            validator: DataValidator::new(),
            tier_timeout: DEFAULT_TIER_TIMEOUT,
        }
    }

    pub fn with_tier_timeout(mut self, timeout: Duration) -> Self {
        self.tier_timeout = timeout;
        self
    }

    pub fn providers(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.providers
    }

    /// Providers able to serve `kind`, in the order they will be tried.
    pub fn ordered_providers(&self, kind: ResourceKind) -> Vec<&Arc<dyn MarketDataProvider>> {
        let mut providers: Vec<_> = self
            .providers
            .iter()
            .filter(|p| p.capabilities().supports(kind))
            .collect();
        self.sort_by_preference(&mut providers);
        providers
    }

    /// Stable sort: providers with equal rank keep registration order.
    fn sort_by_preference(&self, providers: &mut [&Arc<dyn MarketDataProvider>]) {
        providers.sort_by_key(|p| {
            self.custom_priorities
                .get(p.id())
                .copied()
                .unwrap_or_else(|| p.priority() as i32)
        });
    }

    /// Resolve a request, logging the per-tier summary.
    pub async fn resolve(
        &self,
        request: &ResourceRequest,
    ) -> Result<Sourced<Payload>, MarketDataError> {
        let (result, diagnostics) = self.resolve_with_diagnostics(request).await;
        match &result {
            Ok(_) if diagnostics.attempts.len() > 1 => {
                info!("{}: {}", request, diagnostics.summary())
            }
            Ok(_) => debug!("{}: {}", request, diagnostics.summary()),
            Err(_) => warn!("{}: all providers failed: {}", request, diagnostics.summary()),
        }
        result
    }

    pub async fn resolve_with_diagnostics(
        &self,
        request: &ResourceRequest,
    ) -> (Result<Sourced<Payload>, MarketDataError>, FetchDiagnostics) {
        let mut diagnostics = FetchDiagnostics::new();
        let kind = request.kind();

        for provider in &self.providers {
            if !provider.capabilities().supports(kind) {
                diagnostics.record_skip(
                    Cow::Borrowed(provider.id()),
                    SkipReason::ResourceNotSupported,
                );
            }
        }

        for provider in self.ordered_providers(kind) {
            let provider_id: ProviderId = Cow::Borrowed(provider.id());

            let outcome = match tokio::time::timeout(self.tier_timeout, provider.fetch(request)).await
            {
                Ok(result) => result.and_then(|payload| self.validate(provider.id(), payload)),
                Err(_) => Err(MarketDataError::Timeout {
                    provider: provider.id().to_string(),
                }),
            };

            match outcome {
                Ok(payload) => {
                    diagnostics.record_success(provider_id);
                    return (
                        Ok(Sourced::new(payload, DataSource::live(provider.id()))),
                        diagnostics,
                    );
                }
                Err(e) => {
                    debug!(
                        "Provider '{}' failed for {} ({:?}): {}, trying next provider",
                        provider.id(),
                        request,
                        e.retry_class(),
                        e
                    );
                    diagnostics.record_failure(provider_id, &e);
                }
            }
        }

        (
            Err(MarketDataError::NotFound(request.to_string())),
            diagnostics,
        )
    }

    fn validate(&self, provider: &str, payload: Payload) -> Result<Payload, MarketDataError> {
        match payload {
            Payload::Quote(quote) => {
                self.validator.validate_quote(provider, &quote)?;
                Ok(Payload::Quote(quote))
            }
            Payload::Bars(bars) => {
                let bars = self.validator.clean_bars(provider, bars)?;
                if bars.is_empty() {
                    return Err(MarketDataError::UpstreamError {
                        provider: provider.to_string(),
                        status: None,
                        message: "No bars returned".to_string(),
                    });
                }
                Ok(Payload::Bars(bars))
            }
            Payload::OptionChain(chain) => {
                self.validator.validate_chain(provider, &chain)?;
                Ok(Payload::OptionChain(chain))
            }
            Payload::Fundamentals(fundamentals) => {
                if fundamentals.is_empty() {
                    return Err(MarketDataError::UpstreamError {
                        provider: provider.to_string(),
                        status: None,
                        message: "No fundamentals returned".to_string(),
                    });
                }
                Ok(Payload::Fundamentals(fundamentals))
            }
            Payload::Sentiment(sentiment) => Ok(Payload::Sentiment(sentiment)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Quote, Timeframe};
    use crate::provider::ProviderCapabilities;
    use crate::registry::RateLimitConfig;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed,
        Fail,
        Throttle,
        Hang,
        BadPrice,
    }

    struct MockProvider {
        id: &'static str,
        priority: u8,
        behavior: Behavior,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: &'static str, priority: u8, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                priority,
                behavior,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> &'static str {
            self.id
        }

        fn priority(&self) -> u8 {
            self.priority
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                resources: &[ResourceKind::Quote, ResourceKind::Bars],
            }
        }

        fn rate_limit(&self) -> RateLimitConfig {
            RateLimitConfig::per_minute(100, Duration::from_secs(30))
        }

        async fn get_latest_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(Quote::new(symbol, 100.0, 1.0, 1000, Utc::now())),
                Behavior::BadPrice => Ok(Quote::new(symbol, -1.0, 0.0, 0, Utc::now())),
                Behavior::Fail => Err(MarketDataError::UpstreamError {
                    provider: self.id.to_string(),
                    status: Some(500),
                    message: "Mock failure".to_string(),
                }),
                Behavior::Throttle => Err(MarketDataError::Throttled {
                    provider: self.id.to_string(),
                    retry_after: None,
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }

        async fn get_historical_bars(
            &self,
            _symbol: &str,
            _timeframe: Timeframe,
            _start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<Bar>, MarketDataError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed => Ok(vec![Bar::new(end, 10.0, 11.0, 9.0, 10.5, 100.0)]),
                _ => Ok(vec![]),
            }
        }
    }

    fn quote_request() -> ResourceRequest {
        ResourceRequest::Quote {
            symbol: "AAPL".to_string(),
        }
    }

    fn as_dyn(providers: &[Arc<MockProvider>]) -> Vec<Arc<dyn MarketDataProvider>> {
        providers
            .iter()
            .map(|p| p.clone() as Arc<dyn MarketDataProvider>)
            .collect()
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let mocks = vec![
            MockProvider::new("A", 1, Behavior::Fail),
            MockProvider::new("B", 2, Behavior::Succeed),
            MockProvider::new("C", 3, Behavior::Succeed),
        ];
        let resolver = WaterfallResolver::new(as_dyn(&mocks));

        let (result, diagnostics) = resolver.resolve_with_diagnostics(&quote_request()).await;
        let sourced = result.unwrap();
        assert_eq!(sourced.source, DataSource::live("B"));
        assert_eq!(mocks[0].calls(), 1);
        assert_eq!(mocks[1].calls(), 1);
        assert_eq!(mocks[2].calls(), 0);
        assert_eq!(diagnostics.summary(), "A: ERROR (Upstream error: A (Some(500)) - Mock failure) -> B: SUCCESS");
    }

    #[tokio::test]
    async fn test_order_follows_priority_not_registration() {
        let mocks = vec![
            MockProvider::new("LOW", 20, Behavior::Succeed),
            MockProvider::new("HIGH", 5, Behavior::Succeed),
        ];
        let resolver = WaterfallResolver::new(as_dyn(&mocks));
        let sourced = resolver.resolve(&quote_request()).await.unwrap();
        assert_eq!(sourced.source.provider, "HIGH");
        assert_eq!(mocks[0].calls(), 0);
    }

    #[tokio::test]
    async fn test_custom_priorities_override_defaults() {
        let mocks = vec![
            MockProvider::new("A", 1, Behavior::Succeed),
            MockProvider::new("B", 2, Behavior::Succeed),
        ];
        let priorities = HashMap::from([("B".to_string(), 0), ("A".to_string(), 1)]);
        let resolver = WaterfallResolver::with_priorities(as_dyn(&mocks), priorities);

        let order: Vec<&str> = resolver
            .ordered_providers(ResourceKind::Quote)
            .iter()
            .map(|p| p.id())
            .collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_all_failures_yield_not_found() {
        let mocks = vec![
            MockProvider::new("A", 1, Behavior::Throttle),
            MockProvider::new("B", 2, Behavior::Fail),
            MockProvider::new("C", 3, Behavior::BadPrice),
        ];
        let resolver = WaterfallResolver::new(as_dyn(&mocks));

        let (result, diagnostics) = resolver.resolve_with_diagnostics(&quote_request()).await;
        assert!(matches!(result, Err(MarketDataError::NotFound(_))));
        assert_eq!(diagnostics.skip_reasons().len(), 1);
        assert_eq!(diagnostics.attempted(), vec!["B", "C"]);
        assert!(mocks.iter().all(|m| m.calls() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tier_timeout_moves_to_next_provider() {
        let mocks = vec![
            MockProvider::new("SLOW", 1, Behavior::Hang),
            MockProvider::new("FAST", 2, Behavior::Succeed),
        ];
        let resolver =
            WaterfallResolver::new(as_dyn(&mocks)).with_tier_timeout(Duration::from_secs(2));

        let (result, diagnostics) = resolver.resolve_with_diagnostics(&quote_request()).await;
        assert_eq!(result.unwrap().source.provider, "FAST");
        assert!(diagnostics.summary().starts_with("SLOW: ERROR (Timeout: SLOW)"));
    }

    #[tokio::test]
    async fn test_unsupported_resource_is_skipped_without_call() {
        let mocks = vec![MockProvider::new("A", 1, Behavior::Succeed)];
        let resolver = WaterfallResolver::new(as_dyn(&mocks));
        let request = ResourceRequest::OptionChain {
            symbol: "AAPL".to_string(),
            expiry: None,
        };

        let (result, diagnostics) = resolver.resolve_with_diagnostics(&request).await;
        assert!(result.is_err());
        assert_eq!(mocks[0].calls(), 0);
        assert_eq!(
            diagnostics.skip_reasons()[0].1,
            &SkipReason::ResourceNotSupported
        );
    }

    #[tokio::test]
    async fn test_empty_bar_series_falls_through() {
        let mocks = vec![
            MockProvider::new("EMPTY", 1, Behavior::Fail),
            MockProvider::new("FULL", 2, Behavior::Succeed),
        ];
        let resolver = WaterfallResolver::new(as_dyn(&mocks));
        let request = ResourceRequest::Bars {
            symbol: "AAPL".to_string(),
            timeframe: Timeframe::OneDay,
        };

        let sourced = resolver.resolve(&request).await.unwrap();
        assert_eq!(sourced.source.provider, "FULL");
        assert_eq!(sourced.data.into_bars().unwrap().len(), 1);
    }
}
