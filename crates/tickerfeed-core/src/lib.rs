//! # Tickerfeed Core
//!
//! Multi-provider market data resolution for equities, crypto, commodities
//! and currency pairs.
//!
//! ## Overview
//!
//! - **Symbol normalization** from free spellings (`bitcoin`, `gold`, `$aapl`)
//!   to canonical symbols, plus asset-class detection
//! - **Provider adapters** behind one [`DataSource`] contract
//! - **Fallback chains** per asset class with retry, timeout, circuit breaking
//!   and plausibility checks
//! - **TTL cache** whose TTL follows the trading session
//! - **Request coalescing** so concurrent callers share one upstream fetch
//! - **Degraded-mode synthesis** for a whitelist of heavily traded equities
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Yahoo, Finnhub, Alpha Vantage and CoinGecko adapters |
//! | [`aliases`] | Alias table and symbol normalizer |
//! | [`cache`] | Lazily expiring TTL cache |
//! | [`circuit_breaker`] | Per-provider circuit breaker |
//! | [`classify`] | Asset-class detection |
//! | [`coalesce`] | In-flight request coalescing |
//! | [`config`] | Runtime configuration |
//! | [`data_source`] | Adapter contract and request types |
//! | [`domain`] | Symbol, Quote, HistoricalSeries and friends |
//! | [`error`] | Validation and fetch errors |
//! | [`history`] | Series cleaning and gap interpolation |
//! | [`http_client`] | HTTP transport seam |
//! | [`market_hours`] | Trading-window TTL policy |
//! | [`retry`] | Bounded backoff around one provider call |
//! | [`routing`] | Fallback orchestration |
//! | [`service`] | Caller-facing facade |
//! | [`synthetic`] | Simulated quotes for exhausted equity chains |
//! | [`throttling`] | Request budget for rate-limited providers |
//! | [`validation`] | Plausibility table |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tickerfeed_core::{MarketDataService, TickerfeedConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = MarketDataService::from_config(&TickerfeedConfig::from_env());
//!
//!     match service.fetch_market_data("gold", None).await.into_result() {
//!         Ok(quote) => println!("{} {:.2} {}", quote.symbol, quote.price, quote.currency),
//!         Err(error) => eprintln!("{error}"),
//!     }
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ MarketDataService│── normalize / classify
//! └────────┬─────────┘
//!          │ miss
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ TtlCache +       │────▶│ FallbackRouter   │── retry / timeout / circuit
//! │ Coalescer        │     └────────┬─────────┘
//! └──────────────────┘              │
//!                                   ▼
//!                          ┌──────────────────┐     ┌──────────────┐
//!                          │ DataSource       │────▶│ HttpClient   │
//!                          │ (adapters)       │     │ (reqwest)    │
//!                          └──────────────────┘     └──────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures are absorbed by the chain and kept as attempt records.
//! Callers only see a [`FetchError`]:
//!
//! ```rust
//! use tickerfeed_core::{FetchError, FetchErrorKind};
//!
//! fn describe(error: &FetchError) -> &'static str {
//!     match error.kind() {
//!         FetchErrorKind::UnknownSymbol => "no provider lists this symbol",
//!         FetchErrorKind::AllProvidersExhausted => "every provider failed",
//!         FetchErrorKind::InvalidRequest => "check the input",
//!         FetchErrorKind::ProviderUnavailable | FetchErrorKind::ImplausibleData => "upstream problem",
//!     }
//! }
//! ```

pub mod adapters;
pub mod aliases;
pub mod cache;
pub mod circuit_breaker;
pub mod classify;
pub mod coalesce;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod history;
pub mod http_client;
pub mod market_hours;
pub mod retry;
pub mod routing;
pub mod service;
pub mod source;
pub mod synthetic;
pub mod throttling;
pub mod validation;

// Adapter implementations
pub use adapters::{AlphaVantageAdapter, CoinGeckoAdapter, FinnhubAdapter, YahooAdapter};

// Normalization and classification
pub use aliases::normalize;
pub use classify::classify;

// Caching and coalescing
pub use cache::{CacheValue, TtlCache};
pub use coalesce::Coalescer;

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::TickerfeedConfig;

// Data source trait and types
pub use data_source::{
    CapabilitySet, DataSource, HistoryRequest, QuoteRequest, SourceError, SourceErrorKind,
    SourceFuture,
};

// Domain models
pub use domain::{
    AssetClass, HistoricalSeries, Interval, PricePoint, Quote, QuoteOutcome, QuotePrices, Symbol,
    UtcDateTime, CHANGE_PERCENT_TOLERANCE,
};

// Error types
pub use error::{CoreError, FetchError, FetchErrorKind, ValidationError};

// HTTP client types
pub use http_client::{HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};

// Session-aware TTL
pub use market_hours::{TradingWindow, TtlPolicy};

// Retry logic
pub use retry::RetryConfig;

// Routing types
pub use routing::{AttemptObserver, AttemptOutcome, AttemptRecord, FallbackRouter, Resolved};

// Facade
pub use service::{HistoryReport, MarketDataService, QuoteReport};

// Source identifiers
pub use source::ProviderId;

// Synthesis
pub use synthetic::Synthesizer;

// Throttling
pub use throttling::RequestBudget;

// Plausibility
pub use validation::{PlausibilityTable, PriceBand};
