//! In-memory TTL cache for accepted quotes and series.
//!
//! Entries are expired lazily: a lookup compares the entry age against the
//! TTL stored with it at write time. Nothing is evicted proactively; stale
//! entries stay until overwritten or until [`TtlCache::clear`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::market_hours::{system_clock, TtlPolicy, WallClock};
use crate::{AssetClass, HistoricalSeries, Interval, Quote, Symbol};

/// Values that may be stored in a [`TtlCache`].
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Values returning `false` are silently dropped by `put`.
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl CacheValue for Quote {
    fn is_cacheable(&self) -> bool {
        !self.simulated
    }
}

impl CacheValue for HistoricalSeries {}

/// `{asset_class}:{symbol}`
pub fn quote_key(asset_class: AssetClass, symbol: &Symbol) -> String {
    format!("{}:{}", asset_class.as_str(), symbol.as_str())
}

/// `{asset_class}:{symbol}:{days}:{interval}`
pub fn series_key(asset_class: AssetClass, symbol: &Symbol, days: u32, interval: Interval) -> String {
    format!(
        "{}:{}:{}:{}",
        asset_class.as_str(),
        symbol.as_str(),
        days,
        interval.as_str()
    )
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl_at_write: Duration,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl_at_write
    }
}

/// Thread-safe TTL cache keyed by string.
#[derive(Clone)]
pub struct TtlCache<V> {
    inner: Arc<RwLock<HashMap<String, CacheEntry<V>>>>,
    policy: TtlPolicy,
    clock: WallClock,
}

impl<V: CacheValue> TtlCache<V> {
    pub fn new(policy: TtlPolicy) -> Self {
        Self::with_clock(policy, system_clock())
    }

    pub fn with_clock(policy: TtlPolicy, clock: WallClock) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            policy,
            clock,
        }
    }

    /// TTL that a write issued now would receive.
    pub fn current_ttl(&self) -> Duration {
        self.policy.ttl_at((self.clock)())
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let store = self.inner.read().await;
        let entry = store.get(key)?;
        if entry.is_fresh(Instant::now()) {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub async fn put(&self, key: String, value: V) {
        if !value.is_cacheable() {
            debug!(%key, "refusing to cache non-cacheable value");
            return;
        }

        let ttl_at_write = self.current_ttl();
        if ttl_at_write.is_zero() {
            return;
        }

        let mut store = self.inner.write().await;
        store.insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl_at_write,
            },
        );
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
