//! Provider credentials from the environment.
//!
//! A provider is enabled only when all of its credentials are present; a
//! disabled provider is never constructed, so the waterfall never tries it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::provider::alpaca::AlpacaProvider;
use crate::provider::finnhub::FinnhubProvider;
use crate::provider::schwab::SchwabProvider;
use crate::provider::tradier::TradierProvider;
use crate::provider::yahoo::YahooProvider;
use crate::provider::MarketDataProvider;
use crate::registry::WaterfallResolver;

#[derive(Clone)]
pub struct TradierSettings {
    pub api_key: String,
    pub sandbox: bool,
}

#[derive(Clone)]
pub struct SchwabSettings {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct AlpacaSettings {
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Default)]
pub struct ProviderSettings {
    pub tradier: Option<TradierSettings>,
    pub schwab: Option<SchwabSettings>,
    pub alpaca: Option<AlpacaSettings>,
    pub finnhub_api_key: Option<String>,
    pub yahoo_enabled: bool,
    /// Provider ids from `PROVIDER_ORDER`, highest priority first.
    pub provider_order: Vec<String>,
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

impl ProviderSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let tradier = get("TRADIER_API_KEY").map(|api_key| TradierSettings {
            api_key,
            sandbox: parse_bool(get("TRADIER_SANDBOX"), false),
        });

        let schwab = match (
            get("SCHWAB_CLIENT_ID"),
            get("SCHWAB_CLIENT_SECRET"),
            get("SCHWAB_REFRESH_TOKEN"),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Some(SchwabSettings {
                client_id,
                client_secret,
                refresh_token,
            }),
            (None, None, None) => None,
            _ => {
                warn!("Schwab credentials are incomplete; provider disabled");
                None
            }
        };

        let alpaca = match (get("ALPACA_API_KEY"), get("ALPACA_API_SECRET")) {
            (Some(api_key), Some(api_secret)) => Some(AlpacaSettings {
                api_key,
                api_secret,
            }),
            (None, None) => None,
            _ => {
                warn!("Alpaca credentials are incomplete; provider disabled");
                None
            }
        };

        let provider_order = get("PROVIDER_ORDER")
            .map(|order| {
                order
                    .split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            tradier,
            schwab,
            alpaca,
            finnhub_api_key: get("FINNHUB_API_KEY"),
            yahoo_enabled: parse_bool(get("YAHOO_ENABLED"), true),
            provider_order,
        }
    }

    pub fn enabled(&self, provider_id: &str) -> bool {
        match provider_id {
            "TRADIER" => self.tradier.is_some(),
            "SCHWAB" => self.schwab.is_some(),
            "ALPACA" => self.alpaca.is_some(),
            "FINNHUB" => self.finnhub_api_key.is_some(),
            "YAHOO" => self.yahoo_enabled,
            _ => false,
        }
    }

    pub fn enabled_providers(&self) -> Vec<&'static str> {
        ["TRADIER", "SCHWAB", "ALPACA", "FINNHUB", "YAHOO"]
            .into_iter()
            .filter(|id| self.enabled(id))
            .collect()
    }

    /// Construct a client for every enabled provider.
    pub fn build_providers(&self) -> Vec<Arc<dyn MarketDataProvider>> {
        let mut providers: Vec<Arc<dyn MarketDataProvider>> = Vec::new();

        if let Some(t) = &self.tradier {
            providers.push(Arc::new(TradierProvider::new(t.api_key.clone(), t.sandbox)));
        }
        if let Some(s) = &self.schwab {
            providers.push(Arc::new(SchwabProvider::new(
                s.client_id.clone(),
                s.client_secret.clone(),
                s.refresh_token.clone(),
            )));
        }
        if let Some(a) = &self.alpaca {
            providers.push(Arc::new(AlpacaProvider::new(
                a.api_key.clone(),
                a.api_secret.clone(),
            )));
        }
        if let Some(key) = &self.finnhub_api_key {
            providers.push(Arc::new(FinnhubProvider::new(key.clone())));
        }
        if self.yahoo_enabled {
            providers.push(Arc::new(YahooProvider::new()));
        }

        info!("Enabled market data providers: {:?}", self.enabled_providers());
        providers
    }

    /// Rank overrides from `PROVIDER_ORDER`. Listed providers rank ahead of
    /// every unlisted one, which keeps its built-in priority.
    pub fn priorities(&self) -> HashMap<String, i32> {
        self.provider_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i as i32 - 100))
            .collect()
    }

    pub fn build_resolver(&self, tier_timeout: Duration) -> WaterfallResolver {
        WaterfallResolver::with_priorities(self.build_providers(), self.priorities())
            .with_tier_timeout(tier_timeout)
    }
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("enabled", &self.enabled_providers())
            .field("tradier_sandbox", &self.tradier.as_ref().map(|t| t.sandbox))
            .field("provider_order", &self.provider_order)
            .finish()
    }
}
