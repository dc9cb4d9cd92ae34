mod config;
mod main_lib;

use config::AnalyzerConfig;
use main_lib::{build_orchestrator, init_tracing};
use optionscope_market_data::ProviderSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AnalyzerConfig::from_env();
    init_tracing(config.json_logs);
    for value in &config.ignored {
        tracing::warn!("Ignoring invalid setting: {}", value);
    }

    let symbols: Vec<String> = std::env::args().skip(1).collect();
    if symbols.is_empty() {
        anyhow::bail!("usage: optionscope <SYMBOL>...");
    }

    let settings = ProviderSettings::from_env();
    tracing::debug!("{:?}", settings);
    let orchestrator = build_orchestrator(&config, &settings)?;

    let mut failures = 0;
    for (symbol, result) in orchestrator.analyze_many(&symbols).await {
        match result {
            Ok(analysis) => println!("{}", serde_json::to_string_pretty(&analysis)?),
            Err(e) => {
                failures += 1;
                tracing::error!("{}: {}", symbol, e);
            }
        }
    }

    if failures == symbols.len() {
        anyhow::bail!("No symbol could be analyzed");
    }
    Ok(())
}
