//! Cache freshness and request coalescing as seen through the service facade.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tickerfeed_core::market_hours::{system_clock, WallClock};
use tickerfeed_core::{
    AssetClass, Interval, ProviderId, SourceError, Symbol, TradingWindow, TtlPolicy,
};
use tickerfeed_tests::{service, ScriptedSource};
use time::OffsetDateTime;

const EQUITY: &[AssetClass] = &[AssetClass::Equity];

/// Wednesday 2024-06-12 15:00 UTC, inside the default session.
const WED_IN_SESSION: i64 = 1_718_204_400;
/// Wednesday 2024-06-12 22:00 UTC, after the close.
const WED_AFTER_CLOSE: i64 = 1_718_229_600;

fn settable_clock(start: i64) -> (WallClock, Arc<AtomicI64>) {
    let now = Arc::new(AtomicI64::new(start));
    let reader = Arc::clone(&now);
    let clock: WallClock = Arc::new(move || {
        OffsetDateTime::from_unix_timestamp(reader.load(Ordering::SeqCst))
            .expect("valid timestamp")
    });
    (clock, now)
}

fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

// =============================================================================
// Coalescing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_requests_for_one_symbol_share_a_single_fetch() {
    // Given: a slow primary
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 195.5)
        .with_delay(Duration::from_secs(1))
        .shared();
    let service = service(&[primary.clone()]);

    // When: ten callers ask for the same quote at once
    let quotes = join_all((0..10).map(|_| service.fetch_stock_price("AAPL"))).await;

    // Then: one upstream call, ten identical answers
    assert_eq!(primary.calls(), 1);
    let quotes: Vec<_> = quotes
        .into_iter()
        .map(|quote| quote.expect("every caller gets the quote"))
        .collect();
    assert!(quotes.iter().all(|quote| quote == &quotes[0]));
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_failures_are_shared_too() {
    let primary = ScriptedSource::failing(
        ProviderId::Primary,
        EQUITY,
        SourceError::unavailable("down"),
    )
    .with_delay(Duration::from_millis(200))
    .shared();
    let service = service(&[primary.clone()]);

    let outcomes = join_all((0..4).map(|_| service.fetch_stock_price("ZZZZ"))).await;

    assert_eq!(primary.calls(), 1);
    assert!(outcomes.iter().all(Result::is_err));
    assert_eq!(service.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn different_symbols_are_not_coalesced() {
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 100.0)
        .with_delay(Duration::from_millis(100))
        .shared();
    let service = service(&[primary.clone()]);

    let (first, second) = tokio::join!(
        service.fetch_stock_price("AAPL"),
        service.fetch_stock_price("MSFT")
    );

    assert!(first.is_ok() && second.is_ok());
    assert_eq!(primary.calls(), 2);
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn repeated_request_within_ttl_is_served_from_cache() {
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 195.5).shared();
    let service = service(&[primary.clone()]);

    let first = service
        .fetch_quote_report(&symbol("AAPL"), AssetClass::Equity)
        .await
        .expect("fresh fetch");
    let second = service
        .fetch_quote_report(&symbol("AAPL"), AssetClass::Equity)
        .await
        .expect("cached");

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert!(second.attempts.is_empty());
    assert_eq!(first.quote.fetched_at, second.quote.fetched_at);
    assert_eq!(primary.calls(), 1);
    assert_eq!(service.cache_size().await, 1);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let primary = ScriptedSource::failing(
        ProviderId::Primary,
        EQUITY,
        SourceError::unavailable("down"),
    )
    .shared();
    let service = service(&[primary.clone()]);

    assert!(service.fetch_stock_price("ZZZZ").await.is_err());
    assert!(service.fetch_stock_price("ZZZZ").await.is_err());

    assert_eq!(primary.calls(), 2);
    assert_eq!(service.cache_size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn entries_expire_after_their_ttl() {
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 195.5).shared();
    let service = service(&[primary.clone()])
        .with_cache_clock(TtlPolicy::fixed(Duration::from_secs(60)), system_clock());

    service.fetch_stock_price("AAPL").await.expect("fresh");
    tokio::time::advance(Duration::from_secs(59)).await;
    service.fetch_stock_price("AAPL").await.expect("cached");
    assert_eq!(primary.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    service.fetch_stock_price("AAPL").await.expect("refetched");
    assert_eq!(primary.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn entry_keeps_the_ttl_in_force_when_written() {
    // Given: 15s in session, 60s outside, and a clock after the close
    let policy = TtlPolicy {
        market_open_ttl: Duration::from_secs(15),
        market_closed_ttl: Duration::from_secs(60),
        window: TradingWindow::default(),
    };
    let (clock, now) = settable_clock(WED_AFTER_CLOSE);
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 195.5).shared();
    let service = service(&[primary.clone()]).with_cache_clock(policy, clock);

    // When: a quote is written after the close and the session then opens
    service.fetch_stock_price("AAPL").await.expect("fresh");
    now.store(WED_IN_SESSION, Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(30)).await;

    // Then: the after-close entry is still fresh at 30s
    service.fetch_stock_price("AAPL").await.expect("cached");
    assert_eq!(primary.calls(), 1);

    // And: an in-session entry is gone after 20s
    service.fetch_stock_price("MSFT").await.expect("fresh");
    tokio::time::advance(Duration::from_secs(20)).await;
    service.fetch_stock_price("MSFT").await.expect("refetched");
    assert_eq!(primary.calls(), 3);
}

#[tokio::test]
async fn history_cache_key_includes_range_and_interval() {
    let closes: Vec<f64> = (0..30).map(|n| 2_500.0 + f64::from(n)).collect();
    let primary = ScriptedSource::pricing(ProviderId::Primary, &[AssetClass::Commodity], 2_600.0)
        .with_history(closes)
        .shared();
    let service = service(&[primary.clone()]);
    let gold = symbol("GC");

    let month = service
        .fetch_history_report(&gold, AssetClass::Commodity, 30, Interval::OneDay)
        .await
        .expect("fresh");
    service
        .fetch_history_report(&gold, AssetClass::Commodity, 7, Interval::OneDay)
        .await
        .expect("different range");
    let again = service
        .fetch_history_report(&gold, AssetClass::Commodity, 30, Interval::OneDay)
        .await
        .expect("cached");

    assert!(!month.cache_hit);
    assert!(again.cache_hit);
    assert_eq!(again.series, month.series);
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn clear_cache_forces_a_refetch() {
    let primary = ScriptedSource::pricing(ProviderId::Primary, EQUITY, 195.5).shared();
    let service = service(&[primary.clone()]);

    service.fetch_stock_price("AAPL").await.expect("fresh");
    service.clear_cache().await;
    assert_eq!(service.cache_size().await, 0);

    service.fetch_stock_price("AAPL").await.expect("refetched");
    assert_eq!(primary.calls(), 2);
}

#[tokio::test]
async fn quote_cache_is_partitioned_by_asset_class() {
    let primary = ScriptedSource::pricing(ProviderId::Primary, &AssetClass::ALL, 50.0).shared();
    let service = service(&[primary.clone()]);

    service
        .fetch_market_data("ABC", Some(AssetClass::Equity))
        .await
        .into_result()
        .expect("equity");
    service
        .fetch_market_data("ABC", Some(AssetClass::Forex))
        .await
        .into_result()
        .expect("forex");

    assert_eq!(primary.calls(), 2);
    assert_eq!(service.cache_size().await, 2);
}
