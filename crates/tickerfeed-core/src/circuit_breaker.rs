//! Per-provider circuit breaker.
//!
//! Only transport-level failures (unavailable, timeout, malformed payload)
//! count against a provider. Once `failure_threshold` of them happen in a
//! row the circuit opens and the provider is skipped without being called
//! until `open_timeout` has passed; the next call is then let through as a
//! probe, and its outcome closes or reopens the circuit.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    /// Open timeout elapsed; calls are let through until one settles the state.
    Probing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Tally {
    state: CircuitState,
    failures_in_row: u32,
    open_until: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    tally: Mutex<Tally>,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            tally: Mutex::new(Tally {
                state: CircuitState::Closed,
                failures_in_row: 0,
                open_until: None,
            }),
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    fn tally(&self) -> MutexGuard<'_, Tally> {
        self.tally.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the provider may be called now. Moves an open circuit whose
    /// timeout has elapsed to [`CircuitState::Probing`].
    pub fn allow_request(&self) -> bool {
        let mut tally = self.tally();
        if tally.state != CircuitState::Open {
            return true;
        }

        let expired = tally.open_until.is_some_and(|until| Instant::now() >= until);
        if expired {
            debug!(provider = %self.provider, "circuit timeout elapsed; probing provider");
            tally.state = CircuitState::Probing;
            tally.open_until = None;
        }
        expired
    }

    pub fn record_success(&self) {
        let mut tally = self.tally();
        if tally.state != CircuitState::Closed {
            info!(provider = %self.provider, "provider recovered; circuit closed");
        }
        tally.state = CircuitState::Closed;
        tally.failures_in_row = 0;
        tally.open_until = None;
    }

    pub fn record_failure(&self) {
        let mut tally = self.tally();
        tally.failures_in_row = tally.failures_in_row.saturating_add(1);

        let trips = tally.state == CircuitState::Probing
            || tally.failures_in_row >= self.config.failure_threshold;
        if trips && tally.state != CircuitState::Open {
            warn!(
                provider = %self.provider,
                failures = tally.failures_in_row,
                open_secs = self.config.open_timeout.as_secs(),
                "circuit opened"
            );
        }
        if trips {
            tally.state = CircuitState::Open;
            tally.open_until = Some(Instant::now() + self.config.open_timeout);
        }
    }

    pub fn state(&self) -> CircuitState {
        self.tally().state
    }

    pub fn failures_in_row(&self) -> u32 {
        self.tally().failures_in_row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, open_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            ProviderId::Secondary,
            CircuitBreakerConfig {
                failure_threshold,
                open_timeout: Duration::from_secs(open_secs),
            },
        )
    }

    #[test]
    fn opens_after_threshold_failures_in_a_row() {
        let breaker = breaker(2, 30);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }

    #[test]
    fn success_resets_the_count() {
        let breaker = breaker(2, 30);

        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failures_in_row(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn probes_after_timeout_then_closes_on_success() {
        let breaker = breaker(1, 30);

        breaker.record_failure();
        assert!(!breaker.allow_request());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.allow_request());
        assert_eq!(breaker.state(), CircuitState::Probing);

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failures_in_row(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_immediately() {
        let breaker = breaker(5, 1);

        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(breaker.allow_request());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow_request());
    }
}
