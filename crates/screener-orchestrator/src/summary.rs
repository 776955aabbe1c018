use screener_core::Candidate;

/// Plain-text rendering of a finalist for the narrative collaborator.
/// This is presentation code, so absent values become "n/a" here and only
/// here.
pub fn format_metric_summary(candidate: &Candidate) -> String {
    let m = &candidate.metrics;

    let fmt = |v: Option<f64>| match v {
        Some(x) if x.is_finite() => format!("{x:.2}"),
        Some(_) => "inf".to_string(),
        None => "n/a".to_string(),
    };
    let fmt_flag = |v: Option<bool>| match v {
        Some(true) => "yes",
        Some(false) => "no",
        None => "n/a",
    };

    let mut lines = vec![
        format!("Symbol: {} (score {:.2})", candidate.symbol, candidate.score),
        format!("Price: {} | Market cap: {}", fmt(m.price), fmt(m.market_cap)),
        format!(
            "P/E: {} | EPS: {} | Beta: {} | Debt/Equity: {}",
            fmt(m.pe_ratio),
            fmt(m.eps),
            fmt(m.beta),
            fmt(m.debt_to_equity)
        ),
        format!(
            "Profit margin %: {} | Cash runway (yrs): {} | Institutional %: {}",
            fmt(m.profit_margin_pct),
            fmt(m.cash_runway_years),
            fmt(m.institutional_ownership_pct)
        ),
        format!(
            "Avg dollar volume: {} | 60d volatility %: {}",
            fmt(m.avg_dollar_volume),
            fmt(m.hist_volatility_60d_annualized)
        ),
        format!(
            "RSI-14: {} | SMA 20/50/200: {} / {} / {}",
            fmt(m.rsi_14),
            fmt(m.sma_20),
            fmt(m.sma_50),
            fmt(m.sma_200)
        ),
        format!(
            "Above SMA200: {} | Recent golden cross: {} | 60d breakout: {} | Volume spike: {}",
            fmt_flag(m.price_above_sma_200),
            fmt_flag(m.recent_golden_cross),
            fmt_flag(m.breakout_60d),
            fmt_flag(m.volume_spike)
        ),
        format!("Suggested stop: {}", fmt(m.suggested_stop)),
    ];

    match (&m.options_metrics, &m.options_error) {
        (Some(o), _) => lines.push(format!(
            "Options: P/C vol {} | P/C OI {} | avg IV {}",
            fmt(o.pc_volume_ratio),
            fmt(o.pc_oi_ratio),
            fmt(o.average_iv)
        )),
        (None, Some(err)) => lines.push(format!("Options: unavailable ({err})")),
        (None, None) => lines.push("Options: not fetched".to_string()),
    }

    lines.join("\n")
}
