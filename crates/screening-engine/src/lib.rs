pub mod filters;
pub mod scoring;
pub mod sentiment;

pub use filters::{FilterChain, FilterRule};
pub use scoring::{ScoreBucket, ScoreCategory, ScoreConfig, ScoringEngine};
pub use sentiment::compute_options_metrics;
