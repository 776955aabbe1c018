#[cfg(test)]
mod tests {
    use crate::indicators::*;
    use chrono::{Duration, Utc};
    use screener_core::Bar;

    fn sample_prices() -> Vec<f64> {
        vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
            46.21, 46.25, 45.71, 46.45, 45.78, 45.35, 44.03, 44.18, 44.22, 44.57,
        ]
    }

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                timestamp: Utc::now() - Duration::days((closes.len() - i) as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    #[test]
    fn sma_basic() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&data, 3);

        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 1e-9);
        assert!((result[1] - 3.0).abs() < 1e-9);
        assert!((result[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn sma_insufficient_data() {
        assert!(sma(&[1.0, 2.0], 5).is_empty());
        assert!(sma(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn ema_starts_at_seed_sma() {
        let data = vec![22.0, 24.0, 23.0, 25.0, 26.0];
        let result = ema(&data, 3);

        assert_eq!(result.len(), data.len());
        let seed = (22.0 + 24.0 + 23.0) / 3.0;
        assert!((result[0] - seed).abs() < 1e-9);
    }

    #[test]
    fn ema_tracks_uptrend() {
        let data: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let result = ema(&data, 3);

        for w in result.windows(2) {
            assert!(w[1] > w[0]);
        }
    }

    #[test]
    fn rsi_stays_in_range() {
        let result = rsi(&sample_prices(), 14);

        assert!(!result.is_empty());
        for value in &result {
            assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn rsi_insufficient_data() {
        assert!(rsi(&[1.0, 2.0, 3.0], 14).is_empty());
    }

    #[test]
    fn rsi_overbought_on_straight_uptrend() {
        let uptrend: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let result = rsi(&uptrend, 14);

        assert!(*result.last().unwrap() > 70.0);
    }

    #[test]
    fn macd_histogram_is_line_minus_signal() {
        let result = macd(&sample_prices(), 12, 26, 9);

        assert!(!result.line.is_empty());
        assert!(!result.signal.is_empty());
        assert_eq!(result.histogram.len(), result.signal.len());

        let offset = result.line.len() - result.signal.len();
        for (i, hist) in result.histogram.iter().enumerate() {
            let expected = result.line[i + offset] - result.signal[i];
            assert!((hist - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn macd_rejects_bad_periods() {
        let result = macd(&sample_prices(), 26, 12, 9);
        assert!(result.line.is_empty());
    }

    #[test]
    fn atr_positive_and_bounded_by_range() {
        let bars = bars_from_closes(&sample_prices());
        let result = atr(&bars, 14);

        assert!(!result.is_empty());
        for value in &result {
            assert!(*value > 0.0);
        }
    }

    #[test]
    fn atr_insufficient_data() {
        let bars = bars_from_closes(&sample_prices()[..5]);
        assert!(atr(&bars, 14).is_empty());
    }

    #[test]
    fn atr_grows_with_wider_ranges() {
        let bars = bars_from_closes(&sample_prices());
        let calm = atr(&bars, 5);

        let mut wild = bars.clone();
        for bar in &mut wild {
            bar.high += 10.0;
            bar.low -= 10.0;
        }
        let volatile = atr(&wild, 5);

        assert!(volatile[0] > calm[0]);
    }

    #[test]
    fn volatility_zero_for_constant_prices() {
        let closes = vec![50.0; 80];
        let vol = annualized_volatility(&closes, 60).unwrap();
        assert!(vol.abs() < 1e-9);
    }

    #[test]
    fn volatility_none_when_window_not_covered() {
        let closes = vec![50.0; 30];
        assert_eq!(annualized_volatility(&closes, 60), None);
    }

    #[test]
    fn volatility_none_on_non_positive_close() {
        let mut closes = vec![50.0; 80];
        closes[70] = 0.0;
        assert_eq!(annualized_volatility(&closes, 60), None);
    }

    #[test]
    fn volatility_scales_with_swing_size() {
        let small: Vec<f64> = (0..80).map(|i| 100.0 + if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let large: Vec<f64> = (0..80).map(|i| 100.0 + if i % 2 == 0 { 5.0 } else { -5.0 }).collect();

        let small_vol = annualized_volatility(&small, 60).unwrap();
        let large_vol = annualized_volatility(&large, 60).unwrap();
        assert!(large_vol > small_vol);
    }
}
