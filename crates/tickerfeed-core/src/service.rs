//! Caller-facing facade.
//!
//! Every fetch follows the same path: normalize, classify (unless the class
//! is given), look up the TTL cache, and on a miss join or start the
//! coalesced fetch for the cache key. The coalesced fetch runs the fallback
//! chain and writes an accepted value through to the cache before any waiter
//! sees it.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::aliases::normalize;
use crate::cache::{quote_key, series_key, TtlCache};
use crate::classify::classify;
use crate::coalesce::Coalescer;
use crate::config::TickerfeedConfig;
use crate::data_source::{DataSource, HistoryRequest};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::market_hours::{TtlPolicy, WallClock};
use crate::routing::{AttemptRecord, FallbackRouter, Resolved};
use crate::{
    AssetClass, FetchError, HistoricalSeries, Interval, Quote, QuoteOutcome, Symbol,
};

type QuoteFlight = Result<Resolved<Quote>, FetchError>;
type SeriesFlight = Result<Resolved<HistoricalSeries>, FetchError>;

/// Quote plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteReport {
    pub quote: Quote,
    pub cache_hit: bool,
    /// Empty on a cache hit.
    pub attempts: Vec<AttemptRecord>,
}

/// Series plus how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryReport {
    pub series: HistoricalSeries,
    pub cache_hit: bool,
    pub attempts: Vec<AttemptRecord>,
}

/// Market data facade. Cheap to share behind an `Arc`; all methods take `&self`.
pub struct MarketDataService {
    router: Arc<FallbackRouter>,
    quotes: TtlCache<Quote>,
    series: TtlCache<HistoricalSeries>,
    quote_flights: Coalescer<QuoteFlight>,
    series_flights: Coalescer<SeriesFlight>,
}

impl MarketDataService {
    pub fn new(router: FallbackRouter, ttl: TtlPolicy) -> Self {
        Self {
            router: Arc::new(router),
            quotes: TtlCache::new(ttl),
            series: TtlCache::new(ttl),
            quote_flights: Coalescer::new(),
            series_flights: Coalescer::new(),
        }
    }

    /// Production service: real adapters over a shared `reqwest` client.
    pub fn from_config(config: &TickerfeedConfig) -> Self {
        let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
        Self::new(
            FallbackRouter::from_config(config, http_client),
            config.ttl_policy(),
        )
    }

    /// Service over caller-supplied sources, e.g. in-memory test doubles.
    pub fn with_sources(sources: Vec<Arc<dyn DataSource>>, config: &TickerfeedConfig) -> Self {
        Self::new(
            FallbackRouter::with_config(sources, config),
            config.ttl_policy(),
        )
    }

    /// Replaces both caches with empty ones reading time from `clock`.
    pub fn with_cache_clock(mut self, ttl: TtlPolicy, clock: WallClock) -> Self {
        self.quotes = TtlCache::with_clock(ttl, Arc::clone(&clock));
        self.series = TtlCache::with_clock(ttl, clock);
        self
    }

    pub fn router(&self) -> &FallbackRouter {
        &self.router
    }

    pub async fn fetch_stock_price(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.fetch_as(symbol, AssetClass::Equity).await
    }

    pub async fn fetch_crypto_price(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.fetch_as(symbol, AssetClass::Crypto).await
    }

    pub async fn fetch_commodity_price(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.fetch_as(symbol, AssetClass::Commodity).await
    }

    pub async fn fetch_forex_rate(&self, pair: &str) -> Result<Quote, FetchError> {
        self.fetch_as(pair, AssetClass::Forex).await
    }

    /// Auto-detecting entry point. Never fails: every failure path resolves
    /// to [`QuoteOutcome::Error`] carrying the symbol and reason.
    pub async fn fetch_market_data(
        &self,
        raw: &str,
        asset_class: Option<AssetClass>,
    ) -> QuoteOutcome {
        let symbol = match normalize(raw) {
            Ok(symbol) => symbol,
            Err(error) => {
                let asset_class = asset_class.unwrap_or(AssetClass::Equity);
                return QuoteOutcome::Error(FetchError::invalid_request(raw, asset_class, error));
            }
        };
        let asset_class = asset_class.unwrap_or_else(|| classify(&symbol));

        self.fetch_quote_report(&symbol, asset_class)
            .await
            .map(|report| report.quote)
            .into()
    }

    /// Fetches every symbol concurrently; each outcome is independent and
    /// results keep the input order.
    pub async fn fetch_multiple<S: AsRef<str>>(
        &self,
        symbols: &[S],
        asset_class: Option<AssetClass>,
    ) -> Vec<QuoteOutcome> {
        join_all(
            symbols
                .iter()
                .map(|symbol| self.fetch_market_data(symbol.as_ref(), asset_class)),
        )
        .await
    }

    pub async fn fetch_historical_data(
        &self,
        raw: &str,
        days: u32,
        interval: Interval,
        asset_class: Option<AssetClass>,
    ) -> Result<HistoricalSeries, FetchError> {
        let symbol = normalize(raw).map_err(|error| {
            FetchError::invalid_request(raw, asset_class.unwrap_or(AssetClass::Equity), error)
        })?;
        let asset_class = asset_class.unwrap_or_else(|| classify(&symbol));

        self.fetch_history_report(&symbol, asset_class, days, interval)
            .await
            .map(|report| report.series)
    }

    pub async fn fetch_quote_report(
        &self,
        symbol: &Symbol,
        asset_class: AssetClass,
    ) -> Result<QuoteReport, FetchError> {
        let key = quote_key(asset_class, symbol);
        if let Some(quote) = self.quotes.get(&key).await {
            debug!(%key, "quote cache hit");
            return Ok(QuoteReport {
                quote,
                cache_hit: true,
                attempts: Vec::new(),
            });
        }
        debug!(%key, "quote cache miss");

        let router = Arc::clone(&self.router);
        let cache = self.quotes.clone();
        let symbol = symbol.clone();
        let write_key = key.clone();
        let resolved = self
            .quote_flights
            .run(&key, move || async move {
                let resolved = router.resolve_quote(&symbol, asset_class).await?;
                cache.put(write_key, resolved.value.clone()).await;
                Ok::<_, FetchError>(resolved)
            })
            .await?;

        Ok(QuoteReport {
            quote: resolved.value,
            cache_hit: false,
            attempts: resolved.attempts,
        })
    }

    pub async fn fetch_history_report(
        &self,
        symbol: &Symbol,
        asset_class: AssetClass,
        days: u32,
        interval: Interval,
    ) -> Result<HistoryReport, FetchError> {
        let request = HistoryRequest::new(symbol.clone(), asset_class, days, interval)
            .map_err(|error| FetchError::invalid_request(symbol.as_str(), asset_class, error))?;

        let key = series_key(asset_class, symbol, days, interval);
        if let Some(series) = self.series.get(&key).await {
            debug!(%key, "series cache hit");
            return Ok(HistoryReport {
                series,
                cache_hit: true,
                attempts: Vec::new(),
            });
        }
        debug!(%key, "series cache miss");

        let router = Arc::clone(&self.router);
        let cache = self.series.clone();
        let write_key = key.clone();
        let resolved = self
            .series_flights
            .run(&key, move || async move {
                let resolved = router.resolve_history(&request).await?;
                cache.put(write_key, resolved.value.clone()).await;
                Ok::<_, FetchError>(resolved)
            })
            .await?;

        Ok(HistoryReport {
            series: resolved.value,
            cache_hit: false,
            attempts: resolved.attempts,
        })
    }

    /// Drops every cached quote and series. In-flight fetches are unaffected.
    pub async fn clear_cache(&self) {
        self.quotes.clear().await;
        self.series.clear().await;
    }

    /// Stored entries across both caches, expired ones included.
    pub async fn cache_size(&self) -> usize {
        self.quotes.len().await + self.series.len().await
    }

    /// Coalesced fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.quote_flights.in_flight() + self.series_flights.in_flight()
    }

    async fn fetch_as(&self, raw: &str, asset_class: AssetClass) -> Result<Quote, FetchError> {
        let symbol = normalize(raw)
            .map_err(|error| FetchError::invalid_request(raw, asset_class, error))?;
        self.fetch_quote_report(&symbol, asset_class)
            .await
            .map(|report| report.quote)
    }
}
