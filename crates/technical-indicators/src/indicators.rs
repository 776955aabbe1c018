use screener_core::Bar;
use statrs::statistics::Statistics;

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Exponential Moving Average
pub fn ema(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.is_empty() {
        return vec![];
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // Seed with SMA of the first full period
    if data.len() < period {
        return vec![data.iter().sum::<f64>() / data.len() as f64];
    }

    let mut result = Vec::with_capacity(data.len());
    let seed: f64 = data[..period].iter().sum::<f64>() / period as f64;
    result.push(seed);

    for i in 1..data.len() {
        let prev = result[i - 1];
        result.push((data[i] - prev) * multiplier + prev);
    }

    result
}

/// Relative Strength Index with Wilder's average-gain/average-loss smoothing.
/// Output is a 0-100 oscillator.
pub fn rsi(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period + 1 {
        return vec![];
    }

    let mut gains = Vec::with_capacity(data.len() - 1);
    let mut losses = Vec::with_capacity(data.len() - 1);

    for w in data.windows(2) {
        let change = w[1] - w[0];
        if change > 0.0 {
            gains.push(change);
            losses.push(0.0);
        } else {
            gains.push(0.0);
            losses.push(change.abs());
        }
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;

    let mut values = Vec::with_capacity(gains.len() - period + 1);
    values.push(rsi_from_averages(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
        values.push(rsi_from_averages(avg_gain, avg_loss));
    }

    values
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// MACD line, signal line and histogram series.
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(data: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    if fast == 0 || slow == 0 || signal_period == 0 || slow < fast || data.len() < slow {
        return MacdSeries {
            line: vec![],
            signal: vec![],
            histogram: vec![],
        };
    }

    let ema_fast = ema(data, fast);
    let ema_slow = ema(data, slow);

    // EMA vectors are aligned to the end of the input; trim the fast series
    // to the slow one's length before differencing.
    let offset = ema_fast.len() - ema_slow.len();
    let line: Vec<f64> = ema_slow
        .iter()
        .enumerate()
        .map(|(i, slow_v)| ema_fast[i + offset] - slow_v)
        .collect();

    let signal = ema(&line, signal_period);

    let hist_offset = line.len().saturating_sub(signal.len());
    let histogram: Vec<f64> = signal
        .iter()
        .enumerate()
        .map(|(i, s)| line[i + hist_offset] - s)
        .collect();

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

/// Average True Range, Wilder-smoothed. True range is the largest of
/// high-low, |high-prev close|, |low-prev close|.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    if period == 0 || bars.len() < period + 1 {
        return vec![];
    }

    let mut true_ranges = Vec::with_capacity(bars.len() - 1);
    for i in 1..bars.len() {
        let high_low = bars[i].high - bars[i].low;
        let high_close = (bars[i].high - bars[i - 1].close).abs();
        let low_close = (bars[i].low - bars[i - 1].close).abs();
        true_ranges.push(high_low.max(high_close).max(low_close));
    }

    let mut values = Vec::with_capacity(true_ranges.len() - period + 1);
    let mut current = true_ranges[..period].iter().sum::<f64>() / period as f64;
    values.push(current);

    for tr in &true_ranges[period..] {
        current = (current * (period - 1) as f64 + tr) / period as f64;
        values.push(current);
    }

    values
}

/// Annualized historical volatility over the trailing `window` bars:
/// standard deviation of daily log returns scaled by sqrt(252), as a
/// percentage. `None` when there are not enough bars or a close is
/// non-positive (log return undefined).
pub fn annualized_volatility(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window + 1 {
        return None;
    }

    let tail = &closes[closes.len() - window - 1..];
    if tail.iter().any(|c| *c <= 0.0) {
        return None;
    }

    let log_returns: Vec<f64> = tail.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
    let std_dev = log_returns.std_dev();
    if !std_dev.is_finite() {
        return None;
    }

    Some(std_dev * (252.0_f64).sqrt() * 100.0)
}
