use screener_core::{Metric, MetricSet, ScreenError};
use serde::{Deserialize, Serialize};

/// One scoring band. A value matches when it is strictly above `min` and
/// strictly below `max` (whichever bounds are present). Buckets are checked
/// in order; the first match wins. Points may be negative for penalty bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBucket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    pub points: f64,
}

impl ScoreBucket {
    pub fn below(max: f64, points: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
            points,
        }
    }

    pub fn above(min: f64, points: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
            points,
        }
    }

    fn matches(&self, value: f64) -> bool {
        if let Some(min) = self.min {
            if value <= min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value >= max {
                return false;
            }
        }
        true
    }
}

/// Independent, additive scoring category over one named metric. An absent
/// metric contributes zero points and never disqualifies the candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCategory {
    pub name: String,
    pub metric: Metric,
    /// Theoretical maximum for this category, used for normalization.
    pub max_points: f64,
    pub buckets: Vec<ScoreBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreConfig {
    pub categories: Vec<ScoreCategory>,
}

impl ScoreConfig {
    /// Point values lifted from the original screener settings: cheap entry
    /// price, unusual volume, low P/E, and bullish options positioning.
    pub fn standard() -> Self {
        Self {
            categories: vec![
                ScoreCategory {
                    name: "price_level".into(),
                    metric: Metric::Price,
                    max_points: 15.0,
                    buckets: vec![
                        ScoreBucket::below(1.0, 15.0),
                        ScoreBucket::below(3.0, 10.0),
                        ScoreBucket::below(5.0, 5.0),
                    ],
                },
                ScoreCategory {
                    name: "relative_volume".into(),
                    metric: Metric::VolumeRatio,
                    max_points: 15.0,
                    buckets: vec![
                        ScoreBucket::above(2.0, 15.0),
                        ScoreBucket::above(1.5, 10.0),
                        ScoreBucket::above(1.0, 5.0),
                    ],
                },
                ScoreCategory {
                    name: "valuation".into(),
                    metric: Metric::PeRatio,
                    max_points: 10.0,
                    buckets: vec![ScoreBucket::below(10.0, 10.0)],
                },
                ScoreCategory {
                    name: "options_sentiment".into(),
                    metric: Metric::PutCallRatio,
                    max_points: 10.0,
                    buckets: vec![
                        ScoreBucket::below(0.7, 10.0),
                        ScoreBucket::below(0.9, 5.0),
                        ScoreBucket::above(1.2, -5.0),
                    ],
                },
            ],
        }
    }

    /// Sum of category maxima; the denominator for normalization.
    pub fn max_total(&self) -> f64 {
        self.categories.iter().map(|c| c.max_points).sum()
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.categories.is_empty() {
            return Err(ScreenError::Configuration(
                "score config has no categories".into(),
            ));
        }
        for category in &self.categories {
            if !category.max_points.is_finite() || category.max_points <= 0.0 {
                return Err(ScreenError::Configuration(format!(
                    "category '{}' max_points must be positive",
                    category.name
                )));
            }
            if category.buckets.is_empty() {
                return Err(ScreenError::Configuration(format!(
                    "category '{}' has no buckets",
                    category.name
                )));
            }
            for bucket in &category.buckets {
                if bucket.min.is_none() && bucket.max.is_none() {
                    return Err(ScreenError::Configuration(format!(
                        "category '{}' has an unbounded bucket",
                        category.name
                    )));
                }
                if !bucket.points.is_finite() || bucket.points > category.max_points {
                    return Err(ScreenError::Configuration(format!(
                        "category '{}' bucket awards {} points, above its max {}",
                        category.name, bucket.points, category.max_points
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Maps a metric set to a normalized composite score in [0, 10].
///
/// Raw category points are summed, divided by the theoretical maximum across
/// all categories, scaled to 10 and rounded to two decimals. The same
/// evaluator runs twice in the pipeline: once without options sentiment for
/// ranking, once after enrichment.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    config: ScoreConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoreConfig) -> Result<Self, ScreenError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScoreConfig {
        &self.config
    }

    pub fn score(&self, metrics: &MetricSet) -> f64 {
        let raw: f64 = self
            .config
            .categories
            .iter()
            .map(|category| Self::category_points(category, metrics))
            .sum();

        let max_total = self.config.max_total();
        let normalized = (raw / max_total * 10.0).clamp(0.0, 10.0);
        (normalized * 100.0).round() / 100.0
    }

    fn category_points(category: &ScoreCategory, metrics: &MetricSet) -> f64 {
        let Some(value) = metrics.metric(category.metric) else {
            return 0.0;
        };
        category
            .buckets
            .iter()
            .find(|bucket| bucket.matches(value))
            .map(|bucket| bucket.points)
            .unwrap_or(0.0)
    }
}
