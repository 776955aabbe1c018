use chrono::NaiveDate;
use screener_core::{OptionType, OptionsChain, OptionsMetrics, ScreenError};

/// Preferred days-to-expiry window for sentiment: near enough to be liquid,
/// far enough to carry positioning rather than gamma noise.
pub const EXPIRY_WINDOW_MIN_DAYS: i64 = 30;
pub const EXPIRY_WINDOW_MAX_DAYS: i64 = 60;

/// Derive put/call ratios and an open-interest-weighted average implied
/// volatility from a raw chain.
///
/// Contracts from the expiry closest to the 30-60 day window are used; when
/// no expiry lands in the window the nearest future one is taken instead.
/// Ratios with a zero call-side denominator stay `None`.
pub fn compute_options_metrics(
    chain: &OptionsChain,
    today: NaiveDate,
) -> Result<OptionsMetrics, ScreenError> {
    if chain.is_empty() {
        return Err(ScreenError::InsufficientData(format!(
            "no options contracts for {}",
            chain.symbol
        )));
    }

    let target = select_expiry(chain, today).ok_or_else(|| {
        ScreenError::InsufficientData(format!(
            "no future options expiration for {}",
            chain.symbol
        ))
    })?;

    let slice: Vec<_> = chain
        .contracts
        .iter()
        .filter(|c| c.expiration == target)
        .collect();

    let side_volume = |side: OptionType| -> f64 {
        slice
            .iter()
            .filter(|c| c.contract_type == side)
            .filter_map(|c| c.volume)
            .sum()
    };
    let side_oi = |side: OptionType| -> f64 {
        slice
            .iter()
            .filter(|c| c.contract_type == side)
            .filter_map(|c| c.open_interest)
            .sum()
    };

    let call_volume = side_volume(OptionType::Call);
    let put_volume = side_volume(OptionType::Put);
    let call_oi = side_oi(OptionType::Call);
    let put_oi = side_oi(OptionType::Put);

    let pc_volume_ratio = if call_volume > 0.0 {
        Some(round3(put_volume / call_volume))
    } else {
        None
    };
    let pc_oi_ratio = if call_oi > 0.0 {
        Some(round3(put_oi / call_oi))
    } else {
        None
    };

    // IV average weighted by open interest, skipping contracts without a
    // usable quote on either leg.
    let mut iv_x_oi = 0.0;
    let mut oi_for_iv = 0.0;
    for contract in &slice {
        if let (Some(iv), Some(oi)) = (contract.implied_volatility, contract.open_interest) {
            if iv > 0.0 && oi > 0.0 {
                iv_x_oi += iv * oi;
                oi_for_iv += oi;
            }
        }
    }
    let average_iv = if oi_for_iv > 0.0 {
        Some(round4(iv_x_oi / oi_for_iv))
    } else {
        None
    };

    Ok(OptionsMetrics {
        selected_expiry: Some(target),
        pc_volume_ratio,
        pc_oi_ratio,
        average_iv,
        total_volume: call_volume + put_volume,
        total_open_interest: call_oi + put_oi,
    })
}

/// Expiry closest to today inside the preferred window, else the nearest
/// strictly-future expiry, else `None`.
fn select_expiry(chain: &OptionsChain, today: NaiveDate) -> Option<NaiveDate> {
    let mut future: Vec<(i64, NaiveDate)> = chain
        .contracts
        .iter()
        .map(|c| c.expiration)
        .map(|expiry| ((expiry - today).num_days(), expiry))
        .filter(|(days, _)| *days > 0)
        .collect();
    future.sort();
    future.dedup();

    future
        .iter()
        .find(|(days, _)| (EXPIRY_WINDOW_MIN_DAYS..=EXPIRY_WINDOW_MAX_DAYS).contains(days))
        .or_else(|| future.first())
        .map(|(_, expiry)| *expiry)
}

fn round3(v: f64) -> f64 {
    (v * 1_000.0).round() / 1_000.0
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
