pub mod indicators;
pub mod snapshot;

mod indicators_tests;

pub use indicators::*;
pub use snapshot::{IndicatorParams, TechnicalSnapshot};
