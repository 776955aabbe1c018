use screener_core::{Bar, MetricSet};
use serde::{Deserialize, Serialize};

use crate::indicators::{annualized_volatility, atr, macd, rsi, sma};

/// Tunable windows and multipliers for the indicator engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// Bars required before any indicator is computed.
    pub min_bars: usize,
    pub sma_periods: [usize; 3],
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
    pub volatility_window: usize,
    pub breakout_window: usize,
    pub volume_ma_period: usize,
    /// Today's volume must exceed this multiple of the trailing average to
    /// count as a spike.
    pub volume_spike_ratio: f64,
    /// "Near" the 52-week extreme means within this percentage of it.
    pub near_extreme_pct: f64,
    /// Lookback (in bars) for the golden/death cross flags.
    pub cross_lookback: usize,
    pub atr_stop_multiplier: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            min_bars: 200,
            sma_periods: [20, 50, 200],
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            volatility_window: 60,
            breakout_window: 60,
            volume_ma_period: 20,
            volume_spike_ratio: 2.5,
            near_extreme_pct: 10.0,
            cross_lookback: 5,
            atr_stop_multiplier: 2.0,
        }
    }
}

/// Point-in-time technical picture of one symbol, derived from its daily
/// bars. Every field is optional: with fewer than `min_bars` bars the whole
/// snapshot is absent, and any individual indicator with a zero denominator
/// or missing base stays `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub atr_14: Option<f64>,
    pub hist_volatility_annualized: Option<f64>,
    pub avg_volume: Option<f64>,
    pub avg_dollar_volume: Option<f64>,
    pub high_52w: Option<f64>,
    pub low_52w: Option<f64>,
    pub pct_off_52w_high: Option<f64>,
    pub pct_off_52w_low: Option<f64>,
    pub near_52w_high: Option<bool>,
    pub near_52w_low: Option<bool>,
    pub price_above_sma_20: Option<bool>,
    pub price_above_sma_50: Option<bool>,
    pub price_above_sma_200: Option<bool>,
    pub sma_50_above_200: Option<bool>,
    pub recent_golden_cross: Option<bool>,
    pub recent_death_cross: Option<bool>,
    pub breakout: Option<bool>,
    pub volume_spike: Option<bool>,
    pub suggested_stop: Option<f64>,
}

impl TechnicalSnapshot {
    pub fn compute(bars: &[Bar], params: &IndicatorParams) -> Self {
        if bars.is_empty() || bars.len() < params.min_bars {
            return Self::default();
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let price = *closes.last().expect("non-empty bars");

        let mut snap = Self::default();

        let [fast, mid, slow] = params.sma_periods;
        let sma_fast = sma(&closes, fast);
        let sma_mid = sma(&closes, mid);
        let sma_slow = sma(&closes, slow);
        snap.sma_20 = sma_fast.last().copied();
        snap.sma_50 = sma_mid.last().copied();
        snap.sma_200 = sma_slow.last().copied();

        snap.rsi_14 = rsi(&closes, params.rsi_period).last().copied();

        let macd_series = macd(&closes, params.macd_fast, params.macd_slow, params.macd_signal);
        snap.macd_line = macd_series.line.last().copied();
        snap.macd_signal = macd_series.signal.last().copied();
        snap.macd_histogram = macd_series.histogram.last().copied();

        snap.atr_14 = atr(bars, params.atr_period).last().copied();
        snap.hist_volatility_annualized =
            annualized_volatility(&closes, params.volatility_window);

        snap.avg_volume = mean(&volumes);
        let dollar_volumes: Vec<f64> = bars.iter().map(|b| b.close * b.volume).collect();
        snap.avg_dollar_volume = mean(&dollar_volumes);

        let high_52w = highs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let low_52w = lows.iter().copied().fold(f64::INFINITY, f64::min);
        snap.high_52w = Some(high_52w);
        snap.low_52w = Some(low_52w);
        if high_52w > 0.0 {
            let off_high = (high_52w - price) / high_52w * 100.0;
            snap.pct_off_52w_high = Some(off_high);
            snap.near_52w_high = Some(off_high <= params.near_extreme_pct);
        }
        if low_52w > 0.0 {
            let off_low = (price - low_52w) / low_52w * 100.0;
            snap.pct_off_52w_low = Some(off_low);
            snap.near_52w_low = Some(off_low <= params.near_extreme_pct);
        }

        snap.price_above_sma_20 = snap.sma_20.map(|s| price > s);
        snap.price_above_sma_50 = snap.sma_50.map(|s| price > s);
        snap.price_above_sma_200 = snap.sma_200.map(|s| price > s);
        snap.sma_50_above_200 = match (snap.sma_50, snap.sma_200) {
            (Some(f), Some(s)) => Some(f > s),
            _ => None,
        };

        let (golden, death) = recent_cross(&sma_mid, &sma_slow, params.cross_lookback);
        snap.recent_golden_cross = Some(golden);
        snap.recent_death_cross = Some(death);

        if bars.len() > params.breakout_window {
            let window = &highs[highs.len() - 1 - params.breakout_window..highs.len() - 1];
            let prior_high = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            snap.breakout = Some(price > prior_high);
        }

        if bars.len() > params.volume_ma_period {
            let window =
                &volumes[volumes.len() - 1 - params.volume_ma_period..volumes.len() - 1];
            if let Some(baseline) = mean(window) {
                if baseline > 0.0 {
                    let today = *volumes.last().expect("non-empty bars");
                    snap.volume_spike = Some(today > params.volume_spike_ratio * baseline);
                }
            }
        }

        snap.suggested_stop = snap
            .atr_14
            .map(|a| price - a * params.atr_stop_multiplier)
            .filter(|stop| *stop > 0.0);

        snap
    }

    /// Fold this snapshot into a symbol's metric set.
    pub fn apply(&self, m: &mut MetricSet) {
        m.sma_20 = self.sma_20;
        m.sma_50 = self.sma_50;
        m.sma_200 = self.sma_200;
        m.rsi_14 = self.rsi_14;
        m.macd_line = self.macd_line;
        m.macd_signal = self.macd_signal;
        m.macd_histogram = self.macd_histogram;
        m.atr_14 = self.atr_14;
        m.hist_volatility_60d_annualized = self.hist_volatility_annualized;
        m.avg_volume = self.avg_volume;
        m.avg_dollar_volume = self.avg_dollar_volume;
        m.high_52w = self.high_52w;
        m.low_52w = self.low_52w;
        m.pct_off_52w_high = self.pct_off_52w_high;
        m.pct_off_52w_low = self.pct_off_52w_low;
        m.near_52w_high = self.near_52w_high;
        m.near_52w_low = self.near_52w_low;
        m.price_above_sma_20 = self.price_above_sma_20;
        m.price_above_sma_50 = self.price_above_sma_50;
        m.price_above_sma_200 = self.price_above_sma_200;
        m.sma_50_above_200 = self.sma_50_above_200;
        m.recent_golden_cross = self.recent_golden_cross;
        m.recent_death_cross = self.recent_death_cross;
        m.breakout_60d = self.breakout;
        m.volume_spike = self.volume_spike;
        m.suggested_stop = self.suggested_stop;
    }
}

fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Detect a fast/slow SMA cross within the last `lookback` bar transitions.
/// Both series are aligned to the end of the price series, so index them
/// from the back. Returns (golden, death).
pub(crate) fn recent_cross(fast: &[f64], slow: &[f64], lookback: usize) -> (bool, bool) {
    let transitions = lookback.min(fast.len().saturating_sub(1)).min(slow.len().saturating_sub(1));
    let mut golden = false;
    let mut death = false;

    for j in 0..transitions {
        let f_cur = fast[fast.len() - 1 - j];
        let f_prev = fast[fast.len() - 2 - j];
        let s_cur = slow[slow.len() - 1 - j];
        let s_prev = slow[slow.len() - 2 - j];

        if f_prev <= s_prev && f_cur > s_cur {
            golden = true;
        }
        if f_prev >= s_prev && f_cur < s_cur {
            death = true;
        }
    }

    (golden, death)
}
