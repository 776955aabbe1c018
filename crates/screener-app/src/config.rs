use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use data_gateway::{GatewayConfig, RetryPolicy};
use screener_orchestrator::{ScreenerSettings, Universe};
use screening_engine::FilterChain;

/// Everything the binary needs, read once from the environment at startup.
/// Invalid values abort before any fetching.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub universe: Universe,
    pub profile: String,
    pub settings: ScreenerSettings,
    pub gateway: GatewayConfig,
    pub request_timeout: Duration,
    pub narrative_url: Option<String>,
    pub webhook_url: String,
    pub results_dir: PathBuf,
}

fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid {key}: {value}")),
        Err(_) => Ok(default),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let universe = match env::var("SCREENER_UNIVERSE")
            .unwrap_or_else(|_| "penny".to_string())
            .as_str()
        {
            "penny" => Universe::PennyStocks,
            "large_caps" => Universe::LargeCaps,
            list => Universe::Custom(
                list.split(',')
                    .map(|s| s.trim().to_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
        };

        let profile = env::var("SCREENER_PROFILE").unwrap_or_else(|_| "penny".to_string());
        if !matches!(profile.as_str(), "penny" | "broad_market") {
            bail!("SCREENER_PROFILE must be 'penny' or 'broad_market', got '{profile}'");
        }

        let mut settings = ScreenerSettings {
            lookback_days: parse_var("SCREENER_LOOKBACK_DAYS", 365u32)?,
            min_score: parse_var("SCREENER_MIN_SCORE", 7.0f64)?,
            top_n: parse_var("SCREENER_TOP_N", 10usize)?,
            early_stop_at: None,
            concurrency: parse_var("SCREENER_CONCURRENCY", 4usize)?,
            ..Default::default()
        };
        if let Ok(value) = env::var("SCREENER_EARLY_STOP_AT") {
            settings.early_stop_at = Some(
                value
                    .parse()
                    .with_context(|| format!("invalid SCREENER_EARLY_STOP_AT: {value}"))?,
            );
        }
        settings.indicators.atr_stop_multiplier = parse_var("SCREENER_ATR_MULTIPLIER", 2.0f64)?;

        let request_timeout = Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS", 10u64)?);
        let gateway = GatewayConfig {
            retry: RetryPolicy {
                max_retries: parse_var("PROVIDER_MAX_RETRIES", 3u32)?,
                base_delay: Duration::from_millis(parse_var("PROVIDER_RETRY_BASE_MS", 1_000u64)?),
                max_delay: Duration::from_millis(parse_var("PROVIDER_RETRY_MAX_MS", 8_000u64)?),
            },
            cache_ttl: Duration::from_secs(parse_var("PROVIDER_CACHE_TTL_SECS", 3_600u64)?),
            request_timeout,
            pace_every: parse_var("PROVIDER_PACE_EVERY", 3usize)?,
            pace_delay: Duration::from_millis(parse_var("PROVIDER_PACE_DELAY_MS", 500u64)?),
        };

        let narrative_url = env::var("NARRATIVE_SERVICE_URL").ok().filter(|v| !v.is_empty());
        let webhook_url = env::var("NOTIFY_WEBHOOK_URL").unwrap_or_default();
        let results_dir = env::var("RESULTS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("results"));

        Ok(Self {
            universe,
            profile,
            settings,
            gateway,
            request_timeout,
            narrative_url,
            webhook_url,
            results_dir,
        })
    }

    pub fn filter_chain(&self) -> FilterChain {
        match self.profile.as_str() {
            "broad_market" => FilterChain::broad_market(),
            _ => FilterChain::penny(),
        }
    }
}
