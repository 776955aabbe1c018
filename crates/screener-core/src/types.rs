use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Partial fundamentals for one symbol, as reported by the provider.
/// Missing upstream fields stay `None` — the adapter never substitutes zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub eps: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub gross_margin_pct: Option<f64>,
    pub profit_margin_pct: Option<f64>,
    pub cash: Option<f64>,
    pub free_cash_flow_ttm: Option<f64>,
    pub institutional_ownership_pct: Option<f64>,
    pub recent_insider_buys: Option<u32>,
    pub recent_insider_net_shares: Option<f64>,
}

impl Fundamentals {
    /// Years of cash left at the trailing burn rate. Non-negative free cash
    /// flow means the company is not burning cash: infinite runway.
    pub fn cash_runway_years(&self) -> Option<f64> {
        match (self.cash, self.free_cash_flow_ttm) {
            (Some(_), Some(fcf)) if fcf >= 0.0 => Some(f64::INFINITY),
            (Some(cash), Some(fcf)) => {
                let burn = fcf.abs();
                if burn > 0.0 {
                    Some(cash / burn)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

/// One listed option contract from the provider's chain snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub contract_type: OptionType,
    pub expiration: NaiveDate,
    pub strike: f64,
    pub volume: Option<f64>,
    pub open_interest: Option<f64>,
    pub implied_volatility: Option<f64>,
}

/// Raw options chain for an underlying: the full expiration calendar plus
/// contracts for the near-term expiries the adapter fetched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionsChain {
    pub symbol: String,
    pub expirations: Vec<NaiveDate>,
    pub contracts: Vec<OptionContract>,
}

impl OptionsChain {
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
