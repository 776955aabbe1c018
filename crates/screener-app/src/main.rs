use std::sync::Arc;

use anyhow::Result;

mod config;
mod notifier;
mod sink;

use config::AppConfig;
use data_gateway::DataGateway;
use narrative_client::NarrativeClient;
use notifier::{build_digest, WebhookNotifier};
use screener_core::{Notifier, SystemClock};
use screener_orchestrator::ScreeningOrchestrator;
use screening_engine::{ScoreConfig, ScoringEngine};
use sink::JsonFileSink;
use yahoo_client::YahooClient;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(env_filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
    }

    // Configuration problems abort here, before any fetching.
    let config = AppConfig::from_env()?;
    tracing::info!(
        profile = %config.profile,
        top_n = config.settings.top_n,
        "marketsift starting"
    );

    let clock = Arc::new(SystemClock);
    let provider = YahooClient::new(config.request_timeout);
    let gateway = Arc::new(DataGateway::new(
        provider,
        config.gateway.clone(),
        clock.clone(),
    )?);
    let scoring = ScoringEngine::new(ScoreConfig::standard())?;

    let mut orchestrator = ScreeningOrchestrator::new(
        gateway,
        config.filter_chain(),
        scoring,
        config.settings.clone(),
        clock,
    )?
    .with_sink(Arc::new(JsonFileSink::new(config.results_dir.clone())));

    if let Some(url) = &config.narrative_url {
        orchestrator = orchestrator.with_narrative(Arc::new(NarrativeClient::new(
            url.clone(),
            config.request_timeout,
        )));
    }

    let report = orchestrator.run(&config.universe).await;

    tracing::info!(
        finalists = report.candidates.len(),
        processed = report.processed,
        filtered_out = report.filtered_out,
        skipped = report.skipped.len(),
        "run complete"
    );
    for candidate in &report.candidates {
        tracing::info!(
            symbol = %candidate.symbol,
            score = candidate.score,
            "finalist"
        );
    }

    let notifier = WebhookNotifier::new(config.webhook_url.clone());
    if let Err(err) = notifier.notify(&build_digest(&report)).await {
        tracing::warn!("notification failed: {err}");
    }

    Ok(())
}
