use screener_core::{Metric, MetricSet, ScreenError};
use serde::{Deserialize, Serialize};

/// One declarative threshold rule: the named metric must fall inside the
/// configured bounds (inclusive). A metric the set cannot produce fails the
/// rule — absence never passes by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRule {
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl FilterRule {
    pub fn at_least(metric: Metric, min: f64) -> Self {
        Self {
            metric,
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(metric: Metric, max: f64) -> Self {
        Self {
            metric,
            min: None,
            max: Some(max),
        }
    }

    pub fn between(metric: Metric, min: f64, max: f64) -> Self {
        Self {
            metric,
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn passes(&self, metrics: &MetricSet) -> bool {
        let Some(value) = metrics.metric(self.metric) else {
            return false;
        };
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

/// Conjunctive rule set for one strategy profile. Evaluation short-circuits
/// on the first failing rule; order never changes the pass/fail outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterChain {
    pub name: String,
    pub rules: Vec<FilterRule>,
}

impl FilterChain {
    pub fn new(name: impl Into<String>, rules: Vec<FilterRule>) -> Self {
        Self {
            name: name.into(),
            rules,
        }
    }

    /// First failing rule, or `None` when the metric set passes everything.
    pub fn evaluate<'a>(&'a self, metrics: &MetricSet) -> Option<&'a FilterRule> {
        self.rules.iter().find(|rule| !rule.passes(metrics))
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        for rule in &self.rules {
            if rule.min.is_none() && rule.max.is_none() {
                return Err(ScreenError::Configuration(format!(
                    "filter '{}' on {} has no bounds",
                    self.name, rule.metric
                )));
            }
            if [rule.min, rule.max]
                .into_iter()
                .flatten()
                .any(|bound| !bound.is_finite())
            {
                return Err(ScreenError::Configuration(format!(
                    "filter '{}' on {} has a non-finite bound",
                    self.name, rule.metric
                )));
            }
            if let (Some(min), Some(max)) = (rule.min, rule.max) {
                if min > max {
                    return Err(ScreenError::Configuration(format!(
                        "filter '{}' on {}: min {} exceeds max {}",
                        self.name, rule.metric, min, max
                    )));
                }
            }
        }
        Ok(())
    }

    /// Speculative low-priced names: tight price band, liquidity floor,
    /// oversold-leaning technicals, volatility cap.
    pub fn penny() -> Self {
        Self::new(
            "penny",
            vec![
                FilterRule::between(Metric::Price, 0.10, 5.0),
                FilterRule::at_least(Metric::Volume, 100_000.0),
                FilterRule::at_least(Metric::MarketCap, 50_000_000.0),
                FilterRule::at_most(Metric::Rsi14, 40.0),
                FilterRule::at_least(Metric::Sma50Sma200Ratio, 0.8),
                FilterRule::at_least(Metric::Beta, 1.2),
                FilterRule::at_least(Metric::AvgDollarVolume, 500_000.0),
                FilterRule::at_most(Metric::HistVolatility60d, 150.0),
            ],
        )
    }

    /// Established names in an uptrend with sane valuation.
    pub fn broad_market() -> Self {
        Self::new(
            "broad_market",
            vec![
                FilterRule::at_least(Metric::Price, 5.0),
                FilterRule::at_least(Metric::MarketCap, 2_000_000_000.0),
                FilterRule::at_least(Metric::AvgDollarVolume, 20_000_000.0),
                FilterRule::at_most(Metric::PeRatio, 40.0),
                FilterRule::between(Metric::Rsi14, 30.0, 70.0),
                FilterRule::at_least(Metric::Sma50Sma200Ratio, 0.95),
                FilterRule::at_most(Metric::HistVolatility60d, 60.0),
            ],
        )
    }
}
