//! Plausibility checks applied to structurally valid provider data.
//!
//! Hard issues reject the response and the fallback chain moves on to the
//! next provider. Soft issues are logged and the data is accepted.
//!
//! | Rule | Severity |
//! |------|----------|
//! | price outside the configured band for the symbol and asset class | hard |
//! | zero change with `open == price` against a known previous close (stale snapshot) | hard |
//! | `high < low` | soft |
//! | price outside `[low, high]` | soft |

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::{AssetClass, HistoricalSeries, Quote};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Reject and advance to the next provider.
    Hard,
    /// Accept and log.
    Soft,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message,
        }
    }

    fn soft(message: String) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message,
        }
    }
}

/// Inclusive price range considered plausible for one symbol of one asset
/// class. Bands only apply to quotes of that class, so an equity ticker that
/// happens to spell a futures root is never checked against the future.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
    #[serde(default = "commodity")]
    pub asset_class: AssetClass,
}

const fn commodity() -> AssetClass {
    AssetClass::Commodity
}

impl PriceBand {
    /// Commodity band.
    pub const fn new(min: f64, max: f64) -> Self {
        Self::for_class(AssetClass::Commodity, min, max)
    }

    pub const fn for_class(asset_class: AssetClass, min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            asset_class,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Per-symbol bands keyed by canonical symbol, plus global switches.
///
/// The bands are a heuristic; symbols without a band are only checked for the
/// stale-snapshot rule.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlausibilityTable {
    pub bands: BTreeMap<String, PriceBand>,
    pub reject_stale_snapshots: bool,
}

impl Default for PlausibilityTable {
    fn default() -> Self {
        let bands = [
            ("GC", PriceBand::new(1500.0, 3000.0)),
            ("SI", PriceBand::new(10.0, 100.0)),
            ("PL", PriceBand::new(500.0, 2500.0)),
            ("PA", PriceBand::new(500.0, 4000.0)),
            ("CL", PriceBand::new(10.0, 200.0)),
            ("BZ", PriceBand::new(10.0, 200.0)),
            ("NG", PriceBand::new(0.5, 20.0)),
            ("HG", PriceBand::new(1.0, 10.0)),
        ]
        .into_iter()
        .map(|(symbol, band)| (symbol.to_owned(), band))
        .collect();

        Self {
            bands,
            reject_stale_snapshots: true,
        }
    }
}

impl PlausibilityTable {
    /// Table with no bands and no stale check; accepts any well-formed value.
    pub fn permissive() -> Self {
        Self {
            bands: BTreeMap::new(),
            reject_stale_snapshots: false,
        }
    }

    pub fn band(&self, asset_class: AssetClass, symbol: &str) -> Option<&PriceBand> {
        self.bands
            .get(symbol)
            .filter(|band| band.asset_class == asset_class)
    }

    pub fn with_band(mut self, symbol: impl Into<String>, band: PriceBand) -> Self {
        self.bands.insert(symbol.into(), band);
        self
    }

    pub fn quote_issues(&self, quote: &Quote) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if let Some(band) = self.band(quote.asset_class, quote.symbol.as_str()) {
            if !band.contains(quote.price) {
                issues.push(ValidationIssue::hard(format!(
                    "price {} for {} outside plausible band [{}, {}]",
                    quote.price, quote.symbol, band.min, band.max
                )));
            }
        }

        if self.reject_stale_snapshots
            && quote.previous_close > 0.0
            && quote.change_percent == 0.0
            && quote.open == quote.price
        {
            issues.push(ValidationIssue::hard(format!(
                "stale snapshot for {}: zero change with open equal to price",
                quote.symbol
            )));
        }

        if quote.high < quote.low {
            issues.push(ValidationIssue::soft(format!(
                "high {} below low {}",
                quote.high, quote.low
            )));
        } else if quote.price < quote.low || quote.price > quote.high {
            issues.push(ValidationIssue::soft(format!(
                "price {} outside day range [{}, {}]",
                quote.price, quote.low, quote.high
            )));
        }

        issues
    }

    /// Returns the joined hard-issue messages when the quote must be rejected.
    pub fn check_quote(&self, quote: &Quote) -> Result<(), String> {
        reduce(quote.symbol.as_str(), self.quote_issues(quote))
    }

    /// Checks the most recent close of a cleaned series against the band.
    pub fn check_series(&self, series: &HistoricalSeries) -> Result<(), String> {
        let Some(latest) = series.latest_close() else {
            return Err(format!("series for {} has no usable points", series.symbol));
        };

        let mut issues = Vec::new();
        if let Some(band) = self.band(series.asset_class, series.symbol.as_str()) {
            if !band.contains(latest) {
                issues.push(ValidationIssue::hard(format!(
                    "latest close {} for {} outside plausible band [{}, {}]",
                    latest, series.symbol, band.min, band.max
                )));
            }
        }

        reduce(series.symbol.as_str(), issues)
    }
}

fn reduce(symbol: &str, issues: Vec<ValidationIssue>) -> Result<(), String> {
    let mut hard = Vec::new();
    for issue in issues {
        match issue.severity {
            ValidationSeverity::Hard => hard.push(issue.message),
            ValidationSeverity::Soft => warn!(%symbol, message = %issue.message, "accepted with warning"),
        }
    }

    if hard.is_empty() {
        Ok(())
    } else {
        Err(hard.join("; "))
    }
}
