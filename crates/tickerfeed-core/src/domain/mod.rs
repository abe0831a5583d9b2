//! # Domain Models
//!
//! Canonical types every adapter must produce or explicitly fail to produce.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Canonical uppercase identifier |
//! | [`AssetClass`] | Equity, Crypto, Commodity or Forex |
//! | [`Quote`] | Current price with derived change fields |
//! | [`HistoricalSeries`] | Ascending close series |
//! | [`QuoteOutcome`] | Quote or error object for the auto-detecting entry point |
//! | [`Interval`] | Series sampling interval |
//! | [`UtcDateTime`] | UTC timestamp |

mod interval;
mod models;
mod symbol;
mod timestamp;

pub use interval::Interval;
pub use models::{
    AssetClass, HistoricalSeries, PricePoint, Quote, QuoteOutcome, QuotePrices,
    CHANGE_PERCENT_TOLERANCE,
};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
