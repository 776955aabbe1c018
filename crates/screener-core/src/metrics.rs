use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::Fundamentals;

/// Average volume below this is too thin for the volume-ratio metric to
/// mean anything.
pub const VOLUME_RATIO_FLOOR: f64 = 10_000.0;

/// Derivative-market sentiment for one underlying, computed from a raw
/// options chain during the enrichment phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsMetrics {
    pub selected_expiry: Option<NaiveDate>,
    pub pc_volume_ratio: Option<f64>,
    pub pc_oi_ratio: Option<f64>,
    /// Open-interest-weighted average implied volatility.
    pub average_iv: Option<f64>,
    pub total_volume: f64,
    pub total_open_interest: f64,
}

/// Everything known about one symbol at one point in the run. Every field is
/// optional because upstream data is frequently incomplete; absence flows
/// through the filter and scoring engines as "fails the rule" / "zero
/// points", never as a crash or a fabricated zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricSet {
    // Fundamentals
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub price: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub gross_margin_pct: Option<f64>,
    pub profit_margin_pct: Option<f64>,
    pub cash_runway_years: Option<f64>,
    pub institutional_ownership_pct: Option<f64>,
    pub recent_insider_buys: Option<u32>,
    pub recent_insider_net_shares: Option<f64>,

    // Liquidity
    pub volume: Option<f64>,
    pub avg_volume: Option<f64>,
    pub avg_dollar_volume: Option<f64>,

    // 52-week range
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub pct_off_52w_high: Option<f64>,
    pub pct_off_52w_low: Option<f64>,
    pub near_52w_high: Option<bool>,
    pub near_52w_low: Option<bool>,

    // Technicals
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub atr_14: Option<f64>,
    pub hist_volatility_60d_annualized: Option<f64>,
    pub price_above_sma_20: Option<bool>,
    pub price_above_sma_50: Option<bool>,
    pub price_above_sma_200: Option<bool>,
    pub sma_50_above_200: Option<bool>,
    pub recent_golden_cross: Option<bool>,
    pub recent_death_cross: Option<bool>,
    pub breakout_60d: Option<bool>,
    pub volume_spike: Option<bool>,
    pub suggested_stop: Option<f64>,

    // Options sentiment (finalists only)
    pub options_metrics: Option<OptionsMetrics>,
    pub options_error: Option<String>,
}

/// Named metrics the filter and scoring engines can reference. Derived
/// ratios (volume ratio, SMA50/SMA200) are computed on access so rule
/// configurations stay purely declarative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Price,
    MarketCap,
    PeRatio,
    Eps,
    Beta,
    DividendYield,
    DebtToEquity,
    GrossMarginPct,
    ProfitMarginPct,
    CashRunwayYears,
    InstitutionalOwnershipPct,
    RecentInsiderBuys,
    Volume,
    AvgVolume,
    AvgDollarVolume,
    VolumeRatio,
    Rsi14,
    HistVolatility60d,
    Sma50Sma200Ratio,
    Atr14,
    PctOff52wHigh,
    PctOff52wLow,
    PutCallRatio,
    AverageIv,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::MarketCap => "market_cap",
            Metric::PeRatio => "pe_ratio",
            Metric::Eps => "eps",
            Metric::Beta => "beta",
            Metric::DividendYield => "dividend_yield",
            Metric::DebtToEquity => "debt_to_equity",
            Metric::GrossMarginPct => "gross_margin_pct",
            Metric::ProfitMarginPct => "profit_margin_pct",
            Metric::CashRunwayYears => "cash_runway_years",
            Metric::InstitutionalOwnershipPct => "institutional_ownership_pct",
            Metric::RecentInsiderBuys => "recent_insider_buys",
            Metric::Volume => "volume",
            Metric::AvgVolume => "avg_volume",
            Metric::AvgDollarVolume => "avg_dollar_volume",
            Metric::VolumeRatio => "volume_ratio",
            Metric::Rsi14 => "rsi_14",
            Metric::HistVolatility60d => "hist_volatility_60d",
            Metric::Sma50Sma200Ratio => "sma_50_200_ratio",
            Metric::Atr14 => "atr_14",
            Metric::PctOff52wHigh => "pct_off_52w_high",
            Metric::PctOff52wLow => "pct_off_52w_low",
            Metric::PutCallRatio => "put_call_ratio",
            Metric::AverageIv => "average_iv",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MetricSet {
    /// Copy provider fundamentals into the metric set.
    pub fn apply_fundamentals(&mut self, f: &Fundamentals) {
        self.company_name = f.company_name.clone();
        self.sector = f.sector.clone();
        self.industry = f.industry.clone();
        self.market_cap = f.market_cap;
        self.pe_ratio = f.pe_ratio;
        self.eps = f.eps;
        self.beta = f.beta;
        self.dividend_yield = f.dividend_yield;
        self.debt_to_equity = f.debt_to_equity;
        self.gross_margin_pct = f.gross_margin_pct;
        self.profit_margin_pct = f.profit_margin_pct;
        self.cash_runway_years = f.cash_runway_years();
        self.institutional_ownership_pct = f.institutional_ownership_pct;
        self.recent_insider_buys = f.recent_insider_buys;
        self.recent_insider_net_shares = f.recent_insider_net_shares;
    }

    /// Numeric value of a named metric, or `None` when it cannot be
    /// meaningfully computed. Non-positive P/E and volume ratios over a
    /// near-zero base are treated as absent here so every consumer agrees.
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Price => self.price,
            Metric::MarketCap => self.market_cap,
            Metric::PeRatio => self.pe_ratio.filter(|pe| *pe > 0.0),
            Metric::Eps => self.eps,
            Metric::Beta => self.beta,
            Metric::DividendYield => self.dividend_yield,
            Metric::DebtToEquity => self.debt_to_equity,
            Metric::GrossMarginPct => self.gross_margin_pct,
            Metric::ProfitMarginPct => self.profit_margin_pct,
            Metric::CashRunwayYears => self.cash_runway_years,
            Metric::InstitutionalOwnershipPct => self.institutional_ownership_pct,
            Metric::RecentInsiderBuys => self.recent_insider_buys.map(|n| n as f64),
            Metric::Volume => self.volume,
            Metric::AvgVolume => self.avg_volume,
            Metric::AvgDollarVolume => self.avg_dollar_volume,
            Metric::VolumeRatio => match (self.volume, self.avg_volume) {
                (Some(v), Some(avg)) if avg > VOLUME_RATIO_FLOOR => Some(v / avg),
                _ => None,
            },
            Metric::Rsi14 => self.rsi_14,
            Metric::HistVolatility60d => self.hist_volatility_60d_annualized,
            Metric::Sma50Sma200Ratio => match (self.sma_50, self.sma_200) {
                (Some(fast), Some(slow)) if slow != 0.0 => Some(fast / slow),
                _ => None,
            },
            Metric::Atr14 => self.atr_14,
            Metric::PctOff52wHigh => self.pct_off_52w_high,
            Metric::PctOff52wLow => self.pct_off_52w_low,
            // Open-interest ratio is the steadier signal; fall back to the
            // volume ratio when OI is unavailable.
            Metric::PutCallRatio => self
                .options_metrics
                .as_ref()
                .and_then(|o| o.pc_oi_ratio.or(o.pc_volume_ratio)),
            Metric::AverageIv => self.options_metrics.as_ref().and_then(|o| o.average_iv),
        }
    }
}

/// A symbol that survived the filter chain, with its metrics and composite
/// score. Immutable after scoring except for the enrichment-phase options
/// fields and the final re-score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: String,
    pub metrics: MetricSet,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentary: Option<String>,
}
