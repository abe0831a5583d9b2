//! Trading-session aware TTL selection.
//!
//! The TTL is a pure function of wall-clock time, evaluated whenever a cache
//! entry is written. Entries keep the TTL that was in force at write time.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use time::{OffsetDateTime, Weekday};

/// Source of wall-clock time; injectable so session boundaries can be tested.
pub type WallClock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

pub fn system_clock() -> WallClock {
    Arc::new(OffsetDateTime::now_utc)
}

/// Weekday trading window expressed in UTC minutes since midnight.
///
/// The default `13:30..20:00` matches the US cash session during daylight
/// saving time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TradingWindow {
    pub open_minute_utc: u16,
    pub close_minute_utc: u16,
}

impl Default for TradingWindow {
    fn default() -> Self {
        Self {
            open_minute_utc: 13 * 60 + 30,
            close_minute_utc: 20 * 60,
        }
    }
}

impl TradingWindow {
    pub fn contains(&self, at: OffsetDateTime) -> bool {
        let at = at.to_offset(time::UtcOffset::UTC);
        if matches!(at.weekday(), Weekday::Saturday | Weekday::Sunday) {
            return false;
        }

        let minute = u16::from(at.hour()) * 60 + u16::from(at.minute());
        minute >= self.open_minute_utc && minute < self.close_minute_utc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub market_open_ttl: Duration,
    pub market_closed_ttl: Duration,
    pub window: TradingWindow,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            market_open_ttl: Duration::from_secs(15),
            market_closed_ttl: Duration::from_secs(60),
            window: TradingWindow::default(),
        }
    }
}

impl TtlPolicy {
    /// Fixed TTL regardless of session; used by tests and disabled caches.
    pub fn fixed(ttl: Duration) -> Self {
        Self {
            market_open_ttl: ttl,
            market_closed_ttl: ttl,
            window: TradingWindow::default(),
        }
    }

    pub fn ttl_at(&self, at: OffsetDateTime) -> Duration {
        if self.window.contains(at) {
            self.market_open_ttl
        } else {
            self.market_closed_ttl
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn weekday_session_uses_short_ttl() {
        let policy = TtlPolicy::default();

        // Wednesday 15:00 UTC
        let ttl = policy.ttl_at(datetime!(2024-06-12 15:00 UTC));
        assert_eq!(ttl, Duration::from_secs(15));
    }

    #[test]
    fn outside_session_uses_long_ttl() {
        let policy = TtlPolicy::default();

        assert_eq!(
            policy.ttl_at(datetime!(2024-06-12 13:29 UTC)),
            Duration::from_secs(60)
        );
        assert_eq!(
            policy.ttl_at(datetime!(2024-06-12 20:00 UTC)),
            Duration::from_secs(60)
        );
        // Saturday mid-session hours
        assert_eq!(
            policy.ttl_at(datetime!(2024-06-15 15:00 UTC)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn window_honours_non_utc_offsets() {
        let window = TradingWindow::default();

        // 10:00 in New York (UTC-4) is 14:00 UTC
        assert!(window.contains(datetime!(2024-06-12 10:00 -4)));
    }
}
