pub mod summary;
pub mod universe;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;

use screener_core::{
    Candidate, CandidateSink, Clock, MarketDataProvider, Metric, MetricSet,
    NarrativeAnalyzer, ScreenError,
};
use screening_engine::{compute_options_metrics, FilterChain, ScoringEngine};
use technical_indicators::{IndicatorParams, TechnicalSnapshot};

pub use summary::format_metric_summary;
pub use universe::Universe;

/// Shown for a finalist whose narrative collaborator failed.
pub const NARRATIVE_PLACEHOLDER: &str = "Narrative analysis unavailable.";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenerSettings {
    /// Calendar days of history requested per symbol.
    pub lookback_days: u32,
    /// Candidates below this initial score are dropped before selection.
    /// Zero disables the cut.
    pub min_score: f64,
    pub top_n: usize,
    /// Stop issuing symbols once this many candidates have been collected.
    pub early_stop_at: Option<usize>,
    /// In-flight symbol evaluations in the bulk phase.
    pub concurrency: usize,
    pub indicators: IndicatorParams,
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        Self {
            lookback_days: 365,
            min_score: 7.0,
            top_n: 10,
            early_stop_at: None,
            concurrency: 4,
            indicators: IndicatorParams::default(),
        }
    }
}

impl ScreenerSettings {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.top_n == 0 {
            return Err(ScreenError::Configuration("top_n must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(ScreenError::Configuration(
                "concurrency must be at least 1".into(),
            ));
        }
        if !(0.0..=10.0).contains(&self.min_score) {
            return Err(ScreenError::Configuration(format!(
                "min_score {} outside [0, 10]",
                self.min_score
            )));
        }
        if self.lookback_days == 0 {
            return Err(ScreenError::Configuration(
                "lookback_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Why a symbol produced no candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipRecord {
    pub symbol: String,
    pub reason: ScreenError,
}

/// Outcome of one full run: the ranked finalists plus observability counts.
/// A run always completes; per-symbol problems end up in `skipped`, never
/// as an error from `run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub candidates: Vec<Candidate>,
    pub universe_size: usize,
    /// Symbols fully evaluated (passed or filtered out).
    pub processed: usize,
    /// Evaluated symbols rejected by the filter chain or the score cut.
    pub filtered_out: usize,
    pub skipped: Vec<SkipRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

enum SymbolOutcome {
    Passed(Candidate),
    Filtered { symbol: String, metric: Metric },
    Skipped { symbol: String, reason: ScreenError },
}

/// Drives the two-phase pipeline: a cheap full-universe pass (fetch, filter,
/// score), then expensive options enrichment for the surviving top-N only.
pub struct ScreeningOrchestrator {
    provider: Arc<dyn MarketDataProvider>,
    filters: FilterChain,
    scoring: ScoringEngine,
    settings: ScreenerSettings,
    clock: Arc<dyn Clock>,
    narrative: Option<Arc<dyn NarrativeAnalyzer>>,
    sink: Option<Arc<dyn CandidateSink>>,
}

impl ScreeningOrchestrator {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        filters: FilterChain,
        scoring: ScoringEngine,
        settings: ScreenerSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScreenError> {
        settings.validate()?;
        filters.validate()?;
        Ok(Self {
            provider,
            filters,
            scoring,
            settings,
            clock,
            narrative: None,
            sink: None,
        })
    }

    pub fn with_narrative(mut self, narrative: Arc<dyn NarrativeAnalyzer>) -> Self {
        self.narrative = Some(narrative);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn CandidateSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub async fn run(&self, universe: &Universe) -> RunReport {
        let started_at = self.clock.now();
        let symbols = universe.symbols();
        let universe_size = symbols.len();
        tracing::info!(
            universe_size,
            profile = %self.filters.name,
            "starting screening run"
        );

        let (mut candidates, processed, mut filtered_out, skipped) =
            self.bulk_phase(symbols).await;

        // Selection: score cut, rank, truncate.
        if self.settings.min_score > 0.0 {
            let before = candidates.len();
            candidates.retain(|c| c.score >= self.settings.min_score);
            filtered_out += before - candidates.len();
        }
        sort_by_score(&mut candidates);
        candidates.truncate(self.settings.top_n);
        tracing::info!(
            finalists = candidates.len(),
            processed,
            filtered_out,
            skipped = skipped.len(),
            "bulk phase complete"
        );

        self.enrichment_phase(&mut candidates).await;
        sort_by_score(&mut candidates);

        if let Some(narrative) = &self.narrative {
            for candidate in &mut candidates {
                let summary = format_metric_summary(candidate);
                candidate.commentary = match narrative
                    .commentary(&candidate.symbol, &summary)
                    .await
                {
                    Ok(text) => Some(text),
                    Err(err) => {
                        tracing::warn!(symbol = %candidate.symbol, "narrative failed: {err}");
                        Some(NARRATIVE_PLACEHOLDER.to_string())
                    }
                };
            }
        }

        if let Some(sink) = &self.sink {
            if let Err(err) = sink.persist(&candidates).await {
                tracing::error!("failed to persist candidates: {err}");
            }
        }

        RunReport {
            candidates,
            universe_size,
            processed,
            filtered_out,
            skipped,
            started_at,
            finished_at: self.clock.now(),
        }
    }

    /// Evaluate the whole universe with a bounded number of in-flight
    /// symbol tasks. Once the early-stop target is reached, no further
    /// symbols are issued and already-issued work is drained and discarded.
    async fn bulk_phase(
        &self,
        symbols: Vec<String>,
    ) -> (Vec<Candidate>, usize, usize, Vec<SkipRecord>) {
        let mut pending = symbols.into_iter();
        let mut inflight: JoinSet<SymbolOutcome> = JoinSet::new();
        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut processed = 0usize;
        let mut filtered_out = 0usize;
        let mut halted = false;

        loop {
            while !halted && inflight.len() < self.settings.concurrency {
                let Some(symbol) = pending.next() else { break };
                let provider = Arc::clone(&self.provider);
                let filters = self.filters.clone();
                let scoring = self.scoring.clone();
                let params = self.settings.indicators.clone();
                let lookback = self.settings.lookback_days;
                inflight.spawn(evaluate_symbol(
                    provider, filters, scoring, params, lookback, symbol,
                ));
            }

            let Some(joined) = inflight.join_next().await else { break };
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::error!("symbol task failed: {err}");
                    continue;
                }
            };
            if halted {
                continue;
            }

            match outcome {
                SymbolOutcome::Passed(candidate) => {
                    processed += 1;
                    tracing::debug!(symbol = %candidate.symbol, score = candidate.score, "candidate passed");
                    candidates.push(candidate);
                    if let Some(target) = self.settings.early_stop_at {
                        if candidates.len() >= target {
                            tracing::info!(target, "candidate target reached, stopping early");
                            halted = true;
                        }
                    }
                }
                SymbolOutcome::Filtered { symbol, metric } => {
                    processed += 1;
                    filtered_out += 1;
                    tracing::debug!(%symbol, rule = %metric, "rejected by filter");
                }
                SymbolOutcome::Skipped { symbol, reason } => {
                    tracing::warn!(%symbol, "skipped: {reason}");
                    skipped.push(SkipRecord { symbol, reason });
                }
            }
        }

        (candidates, processed, filtered_out, skipped)
    }

    /// Fetch options sentiment for exactly the finalists and re-score them.
    /// A fetch or computation failure marks the candidate instead of
    /// dropping it.
    async fn enrichment_phase(&self, finalists: &mut [Candidate]) {
        let today = self.clock.now().date_naive();
        for candidate in finalists.iter_mut() {
            match self.provider.options_chain(&candidate.symbol).await {
                Ok(chain) => match compute_options_metrics(&chain, today) {
                    Ok(metrics) => {
                        tracing::debug!(
                            symbol = %candidate.symbol,
                            expiry = ?metrics.selected_expiry,
                            "options sentiment attached"
                        );
                        candidate.metrics.options_metrics = Some(metrics);
                    }
                    Err(err) => {
                        tracing::warn!(symbol = %candidate.symbol, "options metrics failed: {err}");
                        candidate.metrics.options_error = Some(err.to_string());
                    }
                },
                Err(err) => {
                    tracing::warn!(symbol = %candidate.symbol, "options fetch failed: {err}");
                    candidate.metrics.options_error = Some(err.to_string());
                }
            }
            candidate.score = self.scoring.score(&candidate.metrics);
        }
    }
}

fn sort_by_score(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// One symbol's bulk-phase evaluation: fetch, assemble metrics, compute
/// indicators, filter, score. Every failure maps to a skip outcome so a bad
/// symbol can never abort the run.
async fn evaluate_symbol(
    provider: Arc<dyn MarketDataProvider>,
    filters: FilterChain,
    scoring: ScoringEngine,
    params: IndicatorParams,
    lookback_days: u32,
    symbol: String,
) -> SymbolOutcome {
    let (history, fundamentals) = tokio::join!(
        provider.price_history(&symbol, lookback_days),
        provider.fundamentals(&symbol),
    );

    let bars = match history {
        Ok(bars) => bars,
        Err(reason) => return SymbolOutcome::Skipped { symbol, reason },
    };
    let fundamentals = match fundamentals {
        Ok(f) => f,
        Err(reason) => return SymbolOutcome::Skipped { symbol, reason },
    };

    let Some(last_bar) = bars.last() else {
        return SymbolOutcome::Skipped {
            symbol,
            reason: ScreenError::InsufficientData("no price history".into()),
        };
    };

    let mut metrics = MetricSet::default();
    metrics.price = Some(last_bar.close);
    metrics.volume = Some(last_bar.volume);
    metrics.apply_fundamentals(&fundamentals);

    // Derive trailing P/E when the provider did not report one.
    if metrics.pe_ratio.is_none() {
        if let (Some(price), Some(eps)) = (metrics.price, metrics.eps) {
            if eps > 0.0 {
                metrics.pe_ratio = Some(price / eps);
            }
        }
    }

    TechnicalSnapshot::compute(&bars, &params).apply(&mut metrics);

    if let Some(rule) = filters.evaluate(&metrics) {
        return SymbolOutcome::Filtered {
            symbol,
            metric: rule.metric,
        };
    }

    let score = scoring.score(&metrics);
    SymbolOutcome::Passed(Candidate {
        symbol,
        metrics,
        score,
        commentary: None,
    })
}
