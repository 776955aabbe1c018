use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use screener_core::{
    Bar, Fundamentals, MarketDataProvider, OptionContract, OptionType, OptionsChain,
    ScreenError,
};

const BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; marketsift/0.1)";

/// Quote-summary modules fetched per symbol.
const QUOTE_SUMMARY_MODULES: &str =
    "assetProfile,price,summaryDetail,defaultKeyStatistics,financialData,insiderTransactions";

/// Only expiries this close are worth a chain sub-request; the sentiment
/// window is 30-60 days.
const EXPIRY_FETCH_HORIZON_DAYS: i64 = 90;
/// Extra per-expiry chain requests after the default (nearest) slice.
const MAX_EXPIRY_REQUESTS: usize = 4;

/// Insider purchases are counted over this trailing window.
const INSIDER_WINDOW_DAYS: i64 = 183;

/// Sliding-window rate limiter: at most `max_requests` per `window` duration.
#[derive(Clone)]
struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: StdDuration,
}

impl RateLimiter {
    fn new(max_requests: usize, window: StdDuration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    async fn acquire(&self) {
        loop {
            let mut ts = self.timestamps.lock().await;
            let now = Instant::now();

            while let Some(&front) = ts.front() {
                if now.duration_since(front) >= self.window {
                    ts.pop_front();
                } else {
                    break;
                }
            }

            if ts.len() < self.max_requests {
                ts.push_back(now);
                return;
            }

            let oldest = *ts.front().expect("non-empty window");
            let sleep_dur =
                self.window.saturating_sub(now.duration_since(oldest)) + StdDuration::from_millis(50);
            drop(ts);
            tracing::debug!("rate limiter: waiting {:.1}s for a Yahoo slot", sleep_dur.as_secs_f64());
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

/// Live Yahoo Finance adapter. The only component that talks to the outside
/// world; it classifies failures but never retries or caches — that is the
/// gateway's job.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    rate_limiter: RateLimiter,
    base_url: String,
}

impl YahooClient {
    pub fn new(request_timeout: StdDuration) -> Self {
        // Public endpoints tolerate roughly a request per second sustained.
        let rate_limit: usize = std::env::var("YAHOO_RATE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            rate_limiter: RateLimiter::new(rate_limit, StdDuration::from_secs(60)),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the client at a different host (recorded fixtures in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScreenError> {
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_status(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ScreenError::TransientProvider(format!("malformed response: {e}")))
    }
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<Bar>, ScreenError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let period2 = Utc::now().timestamp();
        let period1 = period2 - i64::from(lookback_days) * 86_400;

        let response: ChartResponse = self
            .get_json(
                &url,
                &[
                    ("interval", "1d".to_string()),
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                ],
            )
            .await?;

        parse_chart(symbol, response)
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, ScreenError> {
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);

        let response: QuoteSummaryResponse = self
            .get_json(&url, &[("modules", QUOTE_SUMMARY_MODULES.to_string())])
            .await?;

        parse_quote_summary(symbol, response, Utc::now())
    }

    async fn options_chain(&self, symbol: &str) -> Result<OptionsChain, ScreenError> {
        let url = format!("{}/v7/finance/options/{}", self.base_url, symbol);

        // First request: expiration calendar plus the nearest expiry's slice.
        let first: OptionsResponse = self.get_json(&url, &[]).await?;
        let mut chain = parse_options(symbol, first)?;

        // v7 serves one expiry per request. Pull the remaining near-term
        // slices so the enrichment layer can pick its own window.
        let today = Utc::now().date_naive();
        let fetched: Vec<NaiveDate> = chain.contracts.iter().map(|c| c.expiration).collect();
        let wanted: Vec<NaiveDate> = chain
            .expirations
            .iter()
            .copied()
            .filter(|expiry| {
                let days = (*expiry - today).num_days();
                days > 0 && days <= EXPIRY_FETCH_HORIZON_DAYS && !fetched.contains(expiry)
            })
            .take(MAX_EXPIRY_REQUESTS)
            .collect();

        for expiry in wanted {
            let epoch = expiry
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default();
            match self
                .get_json::<OptionsResponse>(&url, &[("date", epoch.to_string())])
                .await
            {
                Ok(response) => match parse_options(symbol, response) {
                    Ok(slice) => chain.contracts.extend(slice.contracts),
                    Err(err) => {
                        tracing::debug!(symbol, %expiry, "unusable options slice: {err}")
                    }
                },
                Err(err) => tracing::warn!(symbol, %expiry, "options slice fetch failed: {err}"),
            }
        }

        Ok(chain)
    }
}

fn classify_request_error(err: reqwest::Error) -> ScreenError {
    ScreenError::TransientProvider(format!("request failed: {err}"))
}

fn classify_http_status(status: u16, body: &str) -> ScreenError {
    let detail = format!("HTTP {status}: {}", body.chars().take(200).collect::<String>());
    match status {
        404 => ScreenError::PermanentProvider(detail),
        429 => ScreenError::TransientProvider(detail),
        400..=499 => ScreenError::PermanentProvider(detail),
        _ => ScreenError::TransientProvider(detail),
    }
}

// ---- chart (price history) ----

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}

fn parse_chart(symbol: &str, response: ChartResponse) -> Result<Vec<Bar>, ScreenError> {
    if let Some(error) = response.chart.error {
        return Err(classify_api_error(symbol, error));
    }

    let Some(data) = response.chart.result.and_then(|mut r| r.pop()) else {
        return Ok(Vec::new());
    };
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };
    let Some(quote) = data.indicators.quote.into_iter().next() else {
        return Ok(Vec::new());
    };

    let series = |v: &Option<Vec<Option<f64>>>, i: usize| -> Option<f64> {
        v.as_ref().and_then(|v| v.get(i).copied().flatten())
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    let mut last_ts: Option<i64> = None;
    for (i, &ts) in timestamps.iter().enumerate() {
        // Halted or padded rows come through as nulls; strictly increasing
        // timestamps are an invariant of the series.
        if last_ts.is_some_and(|prev| ts <= prev) {
            continue;
        }
        let (Some(close), Some(timestamp)) =
            (series(&quote.close, i), DateTime::from_timestamp(ts, 0))
        else {
            continue;
        };
        bars.push(Bar {
            timestamp,
            open: series(&quote.open, i).unwrap_or(close),
            high: series(&quote.high, i).unwrap_or(close),
            low: series(&quote.low, i).unwrap_or(close),
            close,
            volume: series(&quote.volume, i).unwrap_or(0.0),
        });
        last_ts = Some(ts);
    }

    Ok(bars)
}

fn classify_api_error(symbol: &str, error: ApiError) -> ScreenError {
    let code = error.code.unwrap_or_default();
    let description = error.description.unwrap_or_default();
    let detail = format!("{symbol}: {code} {description}");
    if code.eq_ignore_ascii_case("not found") || description.contains("delisted") {
        ScreenError::PermanentProvider(detail)
    } else {
        ScreenError::TransientProvider(detail)
    }
}

// ---- quote summary (fundamentals) ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummaryEnvelope,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryEnvelope {
    result: Option<Vec<QuoteSummaryModules>>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryModules {
    asset_profile: Option<AssetProfile>,
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetail>,
    default_key_statistics: Option<KeyStatistics>,
    financial_data: Option<FinancialData>,
    insider_transactions: Option<InsiderTransactionsModule>,
}

/// Yahoo wraps every number as `{"raw": ..., "fmt": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

impl RawValue {
    fn value(opt: &Option<RawValue>) -> Option<f64> {
        opt.as_ref().and_then(|v| v.raw)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetProfile {
    sector: Option<String>,
    industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    short_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    market_cap: Option<RawValue>,
    trailing_pe: Option<RawValue>,
    dividend_yield: Option<RawValue>,
    beta: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    trailing_eps: Option<RawValue>,
    beta: Option<RawValue>,
    held_percent_institutions: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    debt_to_equity: Option<RawValue>,
    gross_margins: Option<RawValue>,
    profit_margins: Option<RawValue>,
    total_cash: Option<RawValue>,
    free_cashflow: Option<RawValue>,
}

#[derive(Debug, Default, Deserialize)]
struct InsiderTransactionsModule {
    transactions: Option<Vec<InsiderTransaction>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsiderTransaction {
    shares: Option<RawValue>,
    start_date: Option<RawValue>,
}

fn parse_quote_summary(
    symbol: &str,
    response: QuoteSummaryResponse,
    now: DateTime<Utc>,
) -> Result<Fundamentals, ScreenError> {
    if let Some(error) = response.quote_summary.error {
        return Err(classify_api_error(symbol, error));
    }

    let modules = response
        .quote_summary
        .result
        .and_then(|mut r| r.pop())
        .unwrap_or_default();

    let profile = modules.asset_profile.unwrap_or_default();
    let price = modules.price.unwrap_or_default();
    let detail = modules.summary_detail.unwrap_or_default();
    let stats = modules.default_key_statistics.unwrap_or_default();
    let financial = modules.financial_data.unwrap_or_default();

    let mut fundamentals = Fundamentals {
        symbol: symbol.to_string(),
        company_name: price.short_name,
        sector: profile.sector,
        industry: profile.industry,
        market_cap: RawValue::value(&detail.market_cap),
        pe_ratio: RawValue::value(&detail.trailing_pe),
        eps: RawValue::value(&stats.trailing_eps),
        beta: RawValue::value(&detail.beta).or(RawValue::value(&stats.beta)),
        dividend_yield: RawValue::value(&detail.dividend_yield),
        // Yahoo reports debt/equity as a percentage.
        debt_to_equity: RawValue::value(&financial.debt_to_equity).map(|v| v / 100.0),
        gross_margin_pct: RawValue::value(&financial.gross_margins).map(|v| v * 100.0),
        profit_margin_pct: RawValue::value(&financial.profit_margins).map(|v| v * 100.0),
        cash: RawValue::value(&financial.total_cash),
        free_cash_flow_ttm: RawValue::value(&financial.free_cashflow),
        institutional_ownership_pct: RawValue::value(&stats.held_percent_institutions)
            .map(|v| v * 100.0),
        recent_insider_buys: None,
        recent_insider_net_shares: None,
    };

    if let Some(transactions) = modules
        .insider_transactions
        .and_then(|m| m.transactions)
    {
        let cutoff = (now - Duration::days(INSIDER_WINDOW_DAYS)).timestamp() as f64;
        let recent_buys: Vec<f64> = transactions
            .iter()
            .filter(|tx| {
                RawValue::value(&tx.start_date).is_some_and(|start| start >= cutoff)
            })
            .filter_map(|tx| RawValue::value(&tx.shares))
            .filter(|shares| *shares > 0.0)
            .collect();
        fundamentals.recent_insider_buys = Some(recent_buys.len() as u32);
        fundamentals.recent_insider_net_shares = Some(recent_buys.iter().sum());
    }

    Ok(fundamentals)
}

// ---- options ----

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionsResponse {
    option_chain: OptionChainEnvelope,
}

#[derive(Debug, Deserialize)]
struct OptionChainEnvelope {
    result: Option<Vec<OptionChainData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionChainData {
    expiration_dates: Option<Vec<i64>>,
    options: Option<Vec<OptionSlice>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionSlice {
    expiration_date: Option<i64>,
    calls: Option<Vec<RawContract>>,
    puts: Option<Vec<RawContract>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContract {
    strike: Option<f64>,
    volume: Option<f64>,
    open_interest: Option<f64>,
    implied_volatility: Option<f64>,
}

fn parse_options(symbol: &str, response: OptionsResponse) -> Result<OptionsChain, ScreenError> {
    if let Some(error) = response.option_chain.error {
        return Err(classify_api_error(symbol, error));
    }

    let data = response
        .option_chain
        .result
        .and_then(|mut r| r.pop())
        .unwrap_or_default();

    let expirations: Vec<NaiveDate> = data
        .expiration_dates
        .unwrap_or_default()
        .into_iter()
        .filter_map(epoch_to_date)
        .collect();

    let mut contracts = Vec::new();
    for slice in data.options.unwrap_or_default() {
        let Some(expiration) = slice.expiration_date.and_then(epoch_to_date) else {
            continue;
        };
        let mut push_side = |raw: Option<Vec<RawContract>>, side: OptionType| {
            for contract in raw.unwrap_or_default() {
                let Some(strike) = contract.strike else { continue };
                contracts.push(OptionContract {
                    contract_type: side,
                    expiration,
                    strike,
                    volume: contract.volume,
                    open_interest: contract.open_interest,
                    implied_volatility: contract.implied_volatility,
                });
            }
        };
        push_side(slice.calls, OptionType::Call);
        push_side(slice.puts, OptionType::Put);
    }

    Ok(OptionsChain {
        symbol: symbol.to_string(),
        expirations,
        contracts,
    })
}

fn epoch_to_date(epoch: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch, 0).map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_parsing_skips_null_rows_and_keeps_order() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1700000000, 1700086400, 1700172800],
                    "indicators": {
                        "quote": [{
                            "open":   [10.0, null, 10.4],
                            "high":   [10.5, null, 10.9],
                            "low":    [9.8,  null, 10.2],
                            "close":  [10.2, null, 10.7],
                            "volume": [500000, null, 620000]
                        }]
                    }
                }],
                "error": null
            }
        }"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        let bars = parse_chart("ACME", response).unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 10.2);
        assert_eq!(bars[1].close, 10.7);
        assert!(bars[0].timestamp < bars[1].timestamp);
    }

    #[test]
    fn chart_not_found_is_permanent() {
        let body = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        let err = parse_chart("GONE", response).unwrap_err();
        assert!(matches!(err, ScreenError::PermanentProvider(_)));
    }

    #[test]
    fn empty_chart_result_is_just_empty_history() {
        let body = r#"{"chart": {"result": null, "error": null}}"#;
        let response: ChartResponse = serde_json::from_str(body).unwrap();
        assert!(parse_chart("ACME", response).unwrap().is_empty());
    }

    #[test]
    fn quote_summary_maps_raw_values_and_scales_percentages() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "assetProfile": {"sector": "Technology", "industry": "Software"},
                    "price": {"shortName": "Acme Corp"},
                    "summaryDetail": {
                        "marketCap": {"raw": 120000000.0},
                        "trailingPE": {"raw": 8.5},
                        "beta": {"raw": 1.6}
                    },
                    "defaultKeyStatistics": {
                        "trailingEps": {"raw": 0.31},
                        "heldPercentInstitutions": {"raw": 0.42}
                    },
                    "financialData": {
                        "debtToEquity": {"raw": 150.0},
                        "profitMargins": {"raw": -0.08},
                        "totalCash": {"raw": 50000000.0},
                        "freeCashflow": {"raw": -10000000.0}
                    }
                }],
                "error": null
            }
        }"#;
        let response: QuoteSummaryResponse = serde_json::from_str(body).unwrap();
        let f = parse_quote_summary("ACME", response, Utc::now()).unwrap();

        assert_eq!(f.company_name.as_deref(), Some("Acme Corp"));
        assert_eq!(f.market_cap, Some(120_000_000.0));
        assert_eq!(f.pe_ratio, Some(8.5));
        assert_eq!(f.beta, Some(1.6));
        assert_eq!(f.debt_to_equity, Some(1.5));
        assert_eq!(f.profit_margin_pct, Some(-8.0));
        assert_eq!(f.institutional_ownership_pct, Some(42.0));
        assert_eq!(f.cash_runway_years(), Some(5.0));
    }

    #[test]
    fn insider_buys_count_only_recent_positive_transactions() {
        let now = Utc::now();
        let recent = (now - Duration::days(30)).timestamp();
        let stale = (now - Duration::days(400)).timestamp();
        let body = format!(
            r#"{{
                "quoteSummary": {{
                    "result": [{{
                        "insiderTransactions": {{
                            "transactions": [
                                {{"shares": {{"raw": 5000.0}}, "startDate": {{"raw": {recent}}}}},
                                {{"shares": {{"raw": 2000.0}}, "startDate": {{"raw": {recent}}}}},
                                {{"shares": {{"raw": -9000.0}}, "startDate": {{"raw": {recent}}}}},
                                {{"shares": {{"raw": 70000.0}}, "startDate": {{"raw": {stale}}}}}
                            ]
                        }}
                    }}],
                    "error": null
                }}
            }}"#
        );
        let response: QuoteSummaryResponse = serde_json::from_str(&body).unwrap();
        let f = parse_quote_summary("ACME", response, now).unwrap();

        assert_eq!(f.recent_insider_buys, Some(2));
        assert_eq!(f.recent_insider_net_shares, Some(7000.0));
    }

    #[test]
    fn missing_modules_yield_absent_fields_not_zeros() {
        let body = r#"{"quoteSummary": {"result": [{}], "error": null}}"#;
        let response: QuoteSummaryResponse = serde_json::from_str(body).unwrap();
        let f = parse_quote_summary("ACME", response, Utc::now()).unwrap();

        assert_eq!(f.market_cap, None);
        assert_eq!(f.pe_ratio, None);
        assert_eq!(f.recent_insider_buys, None);
    }

    #[test]
    fn options_parsing_splits_calls_and_puts() {
        let body = r#"{
            "optionChain": {
                "result": [{
                    "expirationDates": [1750000000, 1755000000],
                    "options": [{
                        "expirationDate": 1750000000,
                        "calls": [
                            {"strike": 2.5, "volume": 120, "openInterest": 900, "impliedVolatility": 0.55}
                        ],
                        "puts": [
                            {"strike": 2.5, "volume": 60, "openInterest": 450, "impliedVolatility": 0.61},
                            {"strike": 3.0, "openInterest": 10, "impliedVolatility": 0.7}
                        ]
                    }]
                }],
                "error": null
            }
        }"#;
        let response: OptionsResponse = serde_json::from_str(body).unwrap();
        let chain = parse_options("ACME", response).unwrap();

        assert_eq!(chain.expirations.len(), 2);
        assert_eq!(chain.contracts.len(), 3);
        let calls = chain
            .contracts
            .iter()
            .filter(|c| c.contract_type == OptionType::Call)
            .count();
        assert_eq!(calls, 1);
        // Missing volume stays absent, never becomes zero.
        assert_eq!(chain.contracts[2].volume, None);
    }

    #[test]
    fn status_classification_matches_retry_semantics() {
        assert!(matches!(
            classify_http_status(404, "not found"),
            ScreenError::PermanentProvider(_)
        ));
        assert!(matches!(
            classify_http_status(429, "slow down"),
            ScreenError::TransientProvider(_)
        ));
        assert!(matches!(
            classify_http_status(500, "boom"),
            ScreenError::TransientProvider(_)
        ));
        assert!(matches!(
            classify_http_status(401, "denied"),
            ScreenError::PermanentProvider(_)
        ));
    }
}
