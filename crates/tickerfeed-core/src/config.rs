//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON document (or no document at
//! all) yields a working configuration. API keys come from the environment.
//!
//! # Environment Variables
//!
//! | Provider | Primary Env Var | Fallback Env Var |
//! |----------|----------------|------------------|
//! | Finnhub (secondary) | `TICKERFEED_FINNHUB_API_KEY` | `FINNHUB_API_KEY` |
//! | Alpha Vantage (tertiary) | `TICKERFEED_ALPHAVANTAGE_API_KEY` | `ALPHAVANTAGE_API_KEY` |
//! | Yahoo (primary) | (no key required) | - |
//! | CoinGecko (crypto aggregator) | (no key required) | - |
//!
//! A missing or blank key disables that provider; it is left out of every
//! fallback chain instead of failing the chain.

use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::market_hours::{TradingWindow, TtlPolicy};
use crate::retry::RetryConfig;
use crate::validation::PlausibilityTable;
use crate::CoreError;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TickerfeedConfig {
    pub finnhub_api_key: Option<String>,
    pub alphavantage_api_key: Option<String>,
    /// Upper bound for a single provider call, retries excluded.
    pub provider_timeout_ms: u64,
    pub retry_max_attempts: u32,
    /// Linear backoff step: attempt `n` waits `n * retry_base_delay_ms`.
    pub retry_base_delay_ms: u64,
    pub market_open_ttl_secs: u64,
    pub market_closed_ttl_secs: u64,
    pub trading_window: TradingWindow,
    pub circuit_failure_threshold: u32,
    pub circuit_open_secs: u64,
    /// Request budget per minute for the rate-limited tertiary provider.
    pub tertiary_quota_per_minute: u32,
    pub plausibility: PlausibilityTable,
}

impl Default for TickerfeedConfig {
    fn default() -> Self {
        Self {
            finnhub_api_key: None,
            alphavantage_api_key: None,
            provider_timeout_ms: 10_000,
            retry_max_attempts: 2,
            retry_base_delay_ms: 500,
            market_open_ttl_secs: 15,
            market_closed_ttl_secs: 60,
            trading_window: TradingWindow::default(),
            circuit_failure_threshold: 3,
            circuit_open_secs: 30,
            tertiary_quota_per_minute: 5,
            plausibility: PlausibilityTable::default(),
        }
    }
}

impl TickerfeedConfig {
    /// Defaults plus API keys read from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_keys()
    }

    /// Parses an override document; absent fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, CoreError> {
        let config: Self = serde_json::from_str(raw)?;
        Ok(config)
    }

    /// Fills keys that are not already set from the environment.
    pub fn with_env_keys(mut self) -> Self {
        if self.finnhub_api_key.is_none() {
            self.finnhub_api_key = read_key("TICKERFEED_FINNHUB_API_KEY", "FINNHUB_API_KEY");
        }
        if self.alphavantage_api_key.is_none() {
            self.alphavantage_api_key =
                read_key("TICKERFEED_ALPHAVANTAGE_API_KEY", "ALPHAVANTAGE_API_KEY");
        }
        self
    }

    pub fn finnhub_key(&self) -> Option<&str> {
        usable_key(self.finnhub_api_key.as_deref())
    }

    pub fn alphavantage_key(&self) -> Option<&str> {
        usable_key(self.alphavantage_api_key.as_deref())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.retry_max_attempts.max(1),
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            market_open_ttl: Duration::from_secs(self.market_open_ttl_secs),
            market_closed_ttl: Duration::from_secs(self.market_closed_ttl_secs),
            window: self.trading_window,
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_failure_threshold.max(1),
            open_timeout: Duration::from_secs(self.circuit_open_secs),
        }
    }
}

fn read_key(primary: &str, fallback: &str) -> Option<String> {
    env::var(primary)
        .or_else(|_| env::var(fallback))
        .ok()
        .filter(|key| !key.trim().is_empty())
}

fn usable_key(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|key| !key.is_empty())
}
