pub mod cache;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use screener_core::{
    Bar, Clock, Fundamentals, MarketDataProvider, OptionsChain, ScreenError,
};
use tokio::time::{sleep, timeout};

pub use cache::{CacheKey, CachedValue, RequestKind, TtlCache};

/// Bounded retry with exponential backoff, applied to transient failures
/// only.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first call.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): base doubling each
    /// attempt, capped.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub retry: RetryPolicy,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    /// Every `pace_every`-th upstream request sleeps `pace_delay` first, so
    /// bursts are spaced out instead of fired simultaneously.
    pub pace_every: usize,
    pub pace_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(10),
            pace_every: 3,
            pace_delay: Duration::from_millis(500),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.pace_every == 0 {
            return Err(ScreenError::Configuration(
                "gateway pace_every must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ScreenError::Configuration(
                "gateway request_timeout must be positive".into(),
            ));
        }
        if self.retry.base_delay > self.retry.max_delay {
            return Err(ScreenError::Configuration(
                "retry base_delay exceeds max_delay".into(),
            ));
        }
        Ok(())
    }
}

/// Makes every provider call bounded and idempotent-safe: per-call timeout,
/// bounded retry on transient failures, inter-request pacing, and a TTL
/// cache of successful responses.
///
/// The gateway implements `MarketDataProvider` itself, so it slots between
/// the orchestrator and the live adapter by plain injection. The cache sits
/// outside the retry loop: hits never touch the network, and only successes
/// are stored.
pub struct DataGateway<P> {
    provider: P,
    cache: TtlCache,
    clock: Arc<dyn Clock>,
    config: GatewayConfig,
    request_seq: AtomicUsize,
}

impl<P: MarketDataProvider> DataGateway<P> {
    pub fn new(
        provider: P,
        config: GatewayConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ScreenError> {
        config.validate()?;
        Ok(Self {
            provider,
            cache: TtlCache::new(config.cache_ttl),
            clock,
            config,
            request_seq: AtomicUsize::new(0),
        })
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    async fn pace(&self) {
        let seq = self.request_seq.fetch_add(1, Ordering::Relaxed);
        if seq > 0 && seq % self.config.pace_every == 0 && !self.config.pace_delay.is_zero() {
            sleep(self.config.pace_delay).await;
        }
    }

    async fn call_bounded<T, F, Fut>(
        &self,
        what: &str,
        symbol: &str,
        mut op: F,
    ) -> Result<T, ScreenError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ScreenError>>,
    {
        let mut attempt = 0u32;
        loop {
            self.pace().await;

            let outcome = match timeout(self.config.request_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ScreenError::TransientProvider(format!(
                    "{what} for {symbol} timed out after {:?}",
                    self.config.request_timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.config.retry.max_retries => {
                    let delay = self.config.retry.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        symbol,
                        attempt,
                        max = self.config.retry.max_retries,
                        "{what} failed ({err}), retrying in {delay:?}"
                    );
                    sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<P: MarketDataProvider> MarketDataProvider for DataGateway<P> {
    async fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<Bar>, ScreenError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            kind: RequestKind::History { lookback_days },
        };
        if let Some(CachedValue::History(bars)) = self.cache.get(&key, self.clock.now()) {
            tracing::debug!(symbol, "price history cache hit");
            return Ok(bars);
        }

        let bars = self
            .call_bounded("price history", symbol, || {
                self.provider.price_history(symbol, lookback_days)
            })
            .await?;
        self.cache
            .insert(key, CachedValue::History(bars.clone()), self.clock.now());
        Ok(bars)
    }

    async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, ScreenError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            kind: RequestKind::Fundamentals,
        };
        if let Some(CachedValue::Fundamentals(f)) = self.cache.get(&key, self.clock.now()) {
            tracing::debug!(symbol, "fundamentals cache hit");
            return Ok(f);
        }

        let fundamentals = self
            .call_bounded("fundamentals", symbol, || self.provider.fundamentals(symbol))
            .await?;
        self.cache.insert(
            key,
            CachedValue::Fundamentals(fundamentals.clone()),
            self.clock.now(),
        );
        Ok(fundamentals)
    }

    async fn options_chain(&self, symbol: &str) -> Result<OptionsChain, ScreenError> {
        let key = CacheKey {
            symbol: symbol.to_string(),
            kind: RequestKind::OptionsChain,
        };
        if let Some(CachedValue::Options(chain)) = self.cache.get(&key, self.clock.now()) {
            tracing::debug!(symbol, "options chain cache hit");
            return Ok(chain);
        }

        let chain = self
            .call_bounded("options chain", symbol, || {
                self.provider.options_chain(symbol)
            })
            .await?;
        self.cache
            .insert(key, CachedValue::Options(chain.clone()), self.clock.now());
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};
    use std::sync::Mutex;

    struct FakeClock(Mutex<DateTime<Utc>>);

    impl FakeClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(
                DateTime::parse_from_rfc3339("2024-06-03T14:30:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            )))
        }

        fn advance(&self, delta: TimeDelta) {
            *self.0.lock().unwrap() += delta;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    /// Scripted provider: fails the first `fail_first` calls per endpoint,
    /// optionally with a permanent error, and counts upstream hits.
    #[derive(Default)]
    struct ScriptedProvider {
        fail_first: usize,
        permanent: bool,
        delay: Option<Duration>,
        history_calls: AtomicUsize,
        fundamentals_calls: AtomicUsize,
        options_calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn failure(&self) -> ScreenError {
            if self.permanent {
                ScreenError::PermanentProvider("unknown symbol".into())
            } else {
                ScreenError::TransientProvider("connection reset".into())
            }
        }

        async fn respond<T>(&self, counter: &AtomicUsize, value: T) -> Result<T, ScreenError> {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            if call < self.fail_first {
                return Err(self.failure());
            }
            Ok(value)
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        async fn price_history(
            &self,
            _symbol: &str,
            _lookback_days: u32,
        ) -> Result<Vec<Bar>, ScreenError> {
            self.respond(&self.history_calls, Vec::new()).await
        }

        async fn fundamentals(&self, symbol: &str) -> Result<Fundamentals, ScreenError> {
            self.respond(
                &self.fundamentals_calls,
                Fundamentals {
                    symbol: symbol.to_string(),
                    ..Default::default()
                },
            )
            .await
        }

        async fn options_chain(&self, symbol: &str) -> Result<OptionsChain, ScreenError> {
            self.respond(
                &self.options_calls,
                OptionsChain {
                    symbol: symbol.to_string(),
                    ..Default::default()
                },
            )
            .await
        }
    }

    fn fast_config() -> GatewayConfig {
        GatewayConfig {
            retry: RetryPolicy {
                max_retries: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(4),
            },
            cache_ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(5),
            pace_every: 3,
            pace_delay: Duration::ZERO,
        }
    }

    fn gateway(provider: ScriptedProvider) -> DataGateway<ScriptedProvider> {
        DataGateway::new(provider, fast_config(), FakeClock::new()).unwrap()
    }

    #[tokio::test]
    async fn second_call_within_ttl_hits_cache() {
        let gw = gateway(ScriptedProvider::default());

        gw.fundamentals("ACME").await.unwrap();
        gw.fundamentals("ACME").await.unwrap();

        assert_eq!(gw.provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_is_refetched() {
        let clock = FakeClock::new();
        let gw = DataGateway::new(ScriptedProvider::default(), fast_config(), clock.clone())
            .unwrap();

        gw.fundamentals("ACME").await.unwrap();
        clock.advance(TimeDelta::seconds(3601));
        gw.fundamentals("ACME").await.unwrap();

        assert_eq!(gw.provider.fundamentals_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn request_shape_is_part_of_the_key() {
        let gw = gateway(ScriptedProvider::default());

        gw.price_history("ACME", 180).await.unwrap();
        gw.price_history("ACME", 365).await.unwrap();

        assert_eq!(gw.provider.history_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn always_transient_provider_is_called_one_plus_max_retries_times() {
        let gw = gateway(ScriptedProvider {
            fail_first: usize::MAX,
            ..Default::default()
        });

        let err = gw.price_history("ACME", 365).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(gw.provider.history_calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_failure_propagates_without_retry() {
        let gw = gateway(ScriptedProvider {
            fail_first: usize::MAX,
            permanent: true,
            ..Default::default()
        });

        let err = gw.fundamentals("GONE").await.unwrap_err();
        assert!(matches!(err, ScreenError::PermanentProvider(_)));
        assert_eq!(gw.provider.fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_blip_recovers_within_budget() {
        let gw = gateway(ScriptedProvider {
            fail_first: 2,
            ..Default::default()
        });

        gw.options_chain("ACME").await.unwrap();
        assert_eq!(gw.provider.options_calls.load(Ordering::SeqCst), 3);

        // The success is cached; the earlier failures were not.
        gw.options_chain("ACME").await.unwrap();
        assert_eq!(gw.provider.options_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_never_cached() {
        let gw = gateway(ScriptedProvider {
            fail_first: 5,
            ..Default::default()
        });

        // 4 attempts, all failing.
        assert!(gw.price_history("ACME", 365).await.is_err());
        // Fifth upstream call fails, sixth succeeds.
        gw.price_history("ACME", 365).await.unwrap();
        assert_eq!(gw.provider.history_calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn timeout_counts_as_transient_and_retries() {
        let mut config = fast_config();
        config.request_timeout = Duration::from_millis(5);
        config.retry.max_retries = 1;

        let provider = ScriptedProvider {
            delay: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let gw = DataGateway::new(provider, config, FakeClock::new()).unwrap();

        let err = gw.fundamentals("SLOW").await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(gw.provider.fundamentals_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_up_front() {
        let mut config = fast_config();
        config.pace_every = 0;
        let result = DataGateway::new(ScriptedProvider::default(), config, FakeClock::new());
        assert!(matches!(result, Err(ScreenError::Configuration(_))));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(8));
    }
}
