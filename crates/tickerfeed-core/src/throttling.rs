use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget for a provider with a hard upstream quota.
///
/// Requests beyond the budget are not queued; the chain treats the provider as
/// skipped and moves on.
#[derive(Clone)]
pub struct RequestBudget {
    limiter: Arc<DirectRateLimiter>,
    per_minute: u32,
}

impl RequestBudget {
    pub fn per_minute(limit: u32) -> Self {
        let cells = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(cells))),
            per_minute: cells.get(),
        }
    }

    /// Consumes one unit of budget when available.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn limit_per_minute(&self) -> u32 {
        self.per_minute
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("per_minute", &self.per_minute)
            .finish()
    }
}
