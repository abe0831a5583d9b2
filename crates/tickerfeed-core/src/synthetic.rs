//! Degraded-mode quote synthesis for heavily traded equities.
//!
//! Used only after every equity provider failed. Output is always flagged
//! `simulated = true` with source [`ProviderId::Synthetic`], so the cache
//! refuses it and callers can tell it apart from real data.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use crate::{AssetClass, ProviderId, Quote, QuotePrices, Symbol};

/// Reference closes for the whitelist of symbols eligible for synthesis.
const REFERENCE_PRICES: &[(&str, f64)] = &[
    ("AAPL", 190.0),
    ("MSFT", 415.0),
    ("GOOGL", 170.0),
    ("AMZN", 185.0),
    ("TSLA", 180.0),
    ("NVDA", 120.0),
    ("META", 500.0),
    ("NFLX", 640.0),
    ("BRK-B", 410.0),
    ("JPM", 200.0),
    ("V", 275.0),
    ("SPY", 530.0),
    ("QQQ", 460.0),
];

/// Maximum absolute daily change applied to the reference price, in percent.
pub const MAX_DAILY_CHANGE_PERCENT: f64 = 5.0;

#[derive(Clone)]
pub struct Synthesizer {
    rng: Arc<Mutex<fastrand::Rng>>,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        Self {
            rng: Arc::new(Mutex::new(fastrand::Rng::new())),
        }
    }

    /// Deterministic output for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(fastrand::Rng::with_seed(seed))),
        }
    }

    pub fn reference_price(symbol: &Symbol) -> Option<f64> {
        REFERENCE_PRICES
            .iter()
            .find(|(ticker, _)| *ticker == symbol.as_str())
            .map(|(_, price)| *price)
    }

    pub fn supports(symbol: &Symbol) -> bool {
        Self::reference_price(symbol).is_some()
    }

    /// Returns `None` for symbols outside the whitelist.
    pub fn synthesize(&self, symbol: &Symbol) -> Option<Quote> {
        let reference = Self::reference_price(symbol)?;

        let unit = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            rng.f64() * 2.0 - 1.0
        };
        let change_percent = unit * MAX_DAILY_CHANGE_PERCENT;
        let price = round_cents(reference * (1.0 + change_percent / 100.0));

        let prices = QuotePrices {
            price,
            open: reference,
            high: price.max(reference),
            low: price.min(reference),
            previous_close: reference,
            volume: None,
        };

        let quote = Quote::new(symbol.clone(), AssetClass::Equity, prices, ProviderId::Synthetic)
            .ok()?
            .into_simulated();
        info!(%symbol, price = quote.price, "synthesized degraded-mode quote");
        Some(quote)
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
