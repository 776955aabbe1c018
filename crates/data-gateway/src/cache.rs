use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use screener_core::{Bar, Fundamentals, OptionsChain};
use std::time::Duration;

/// Request shape, including parameters that change the response. Two
/// lookback windows for the same symbol are distinct cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKind {
    History { lookback_days: u32 },
    Fundamentals,
    OptionsChain,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub kind: RequestKind,
}

#[derive(Debug, Clone)]
pub enum CachedValue {
    History(Vec<Bar>),
    Fundamentals(Fundamentals),
    Options(OptionsChain),
}

struct CacheEntry {
    value: CachedValue,
    cached_at: DateTime<Utc>,
}

/// Time-bounded memoization of successful provider responses. Entries carry
/// their own retrieval time; staleness is judged against the caller's clock
/// at read time, and stale entries are dropped on read.
pub struct TtlCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: TimeDelta,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
        }
    }

    pub fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CachedValue> {
        let stale = match self.entries.get(key) {
            Some(entry) => {
                if now.signed_duration_since(entry.cached_at) <= self.ttl {
                    return Some(entry.value.clone());
                }
                true
            }
            None => false,
        };
        if stale {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: CacheKey, value: CachedValue, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                cached_at: now,
            },
        );
    }

    /// Drop every entry older than the TTL.
    pub fn expire(&self, now: DateTime<Utc>) {
        self.entries
            .retain(|_, entry| now.signed_duration_since(entry.cached_at) <= self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
