use std::sync::Arc;

use optionscope_analytics::{IndicatorConfig, MultiTimeframeOrchestrator, OrchestratorConfig};
use optionscope_market_data::{MarketDataService, MarketDataSource, ProviderSettings};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::AnalyzerConfig;

pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Providers from the environment, behind the cached service.
pub fn build_orchestrator(
    config: &AnalyzerConfig,
    settings: &ProviderSettings,
) -> anyhow::Result<MultiTimeframeOrchestrator> {
    let enabled = settings.enabled_providers();
    if enabled.is_empty() {
        anyhow::bail!("No market data provider is enabled; set provider credentials or YAHOO_ENABLED=true");
    }
    tracing::info!("Providers: {:?}", enabled);

    let resolver = Arc::new(settings.build_resolver(config.provider_timeout));
    let service: Arc<dyn MarketDataSource> = Arc::new(MarketDataService::new(resolver));

    let orchestrator_config = OrchestratorConfig {
        timeframes: config.timeframes.clone(),
        indicator: IndicatorConfig {
            vwap_anchor: config.vwap_anchor,
        },
        ..Default::default()
    };
    Ok(MultiTimeframeOrchestrator::new(service, orchestrator_config))
}
