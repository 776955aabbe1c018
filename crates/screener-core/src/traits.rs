use async_trait::async_trait;

use crate::{Candidate, Fundamentals, OptionsChain, ScreenError};
use crate::types::Bar;

/// Source of market data for one symbol. Implemented by the live adapter,
/// by the resilient gateway that wraps it, and by fixtures in tests.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars covering `lookback_days`. An empty vec means the upstream
    /// source has no history for the symbol, which is not an error here.
    async fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<Bar>, ScreenError>;

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, ScreenError>;

    async fn options_chain(&self, symbol: &str) -> Result<OptionsChain, ScreenError>;
}

/// Persistence collaborator: receives the ranked candidate list once at the
/// end of a run. Storage format is its own business.
#[async_trait]
pub trait CandidateSink: Send + Sync {
    async fn persist(&self, candidates: &[Candidate]) -> Result<(), ScreenError>;
}

/// Narrative collaborator: turns a formatted metric summary into free-text
/// commentary for one finalist. Callers degrade to a placeholder on failure.
#[async_trait]
pub trait NarrativeAnalyzer: Send + Sync {
    async fn commentary(&self, symbol: &str, summary: &str) -> Result<String, ScreenError>;
}

/// Notification collaborator: fire-and-forget delivery of a pre-built digest.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, digest: &str) -> Result<(), ScreenError>;
}
