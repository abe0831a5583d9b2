use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{FetchError, Interval, ProviderId, Symbol, UtcDateTime, ValidationError};

/// Tolerance used when checking `change_percent` against `change / previous_close`.
pub const CHANGE_PERCENT_TOLERANCE: f64 = 1e-6;

/// Asset class; selects the provider chain and the cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Crypto,
    Commodity,
    Forex,
}

impl AssetClass {
    pub const ALL: [Self; 4] = [Self::Equity, Self::Crypto, Self::Commodity, Self::Forex];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equity => "equity",
            Self::Crypto => "crypto",
            Self::Commodity => "commodity",
            Self::Forex => "forex",
        }
    }

    /// Parses a selector where `auto` (or an empty string) means "detect".
    pub fn parse_selector(value: &str) -> Result<Option<Self>, ValidationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(None),
            other => Self::from_str(other).map(Some),
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetClass {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "equity" | "stock" | "stocks" => Ok(Self::Equity),
            "crypto" | "cryptocurrency" => Ok(Self::Crypto),
            "commodity" | "commodities" | "future" | "futures" => Ok(Self::Commodity),
            "forex" | "fx" | "currency" => Ok(Self::Forex),
            other => Err(ValidationError::InvalidAssetClass {
                value: other.to_owned(),
            }),
        }
    }
}

/// Raw price fields an adapter extracts before a [`Quote`] is built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotePrices {
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub previous_close: f64,
    pub volume: Option<u64>,
}

impl QuotePrices {
    /// Fills open/high/low with the last price when the provider only reports
    /// a price and a reference close.
    pub fn from_last(price: f64, previous_close: f64) -> Self {
        Self {
            price,
            open: price,
            high: price,
            low: price,
            previous_close,
            volume: None,
        }
    }
}

/// Normalized current quote.
///
/// `change` and `change_percent` are always derived from `price` and
/// `previous_close` at construction, so the two stay consistent no matter
/// what the provider reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub asset_class: AssetClass,
    pub price: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub volume: Option<u64>,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    pub currency: String,
    pub unit: Option<String>,
    pub fetched_at: UtcDateTime,
    pub source: ProviderId,
    pub simulated: bool,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        asset_class: AssetClass,
        prices: QuotePrices,
        source: ProviderId,
    ) -> Result<Self, ValidationError> {
        validate_positive("price", prices.price)?;
        validate_finite("open", prices.open)?;
        validate_finite("high", prices.high)?;
        validate_finite("low", prices.low)?;
        validate_finite("previous_close", prices.previous_close)?;

        let (change, change_percent) = if prices.previous_close > 0.0 {
            let change = prices.price - prices.previous_close;
            (change, change / prices.previous_close * 100.0)
        } else {
            (0.0, 0.0)
        };

        Ok(Self {
            symbol,
            asset_class,
            price: prices.price,
            open: prices.open,
            high: prices.high,
            low: prices.low,
            volume: prices.volume,
            previous_close: prices.previous_close,
            change,
            change_percent,
            currency: String::from("USD"),
            unit: None,
            fetched_at: UtcDateTime::now(),
            source,
            simulated: false,
        })
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().to_ascii_uppercase();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_fetched_at(mut self, fetched_at: UtcDateTime) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    pub(crate) fn into_simulated(mut self) -> Self {
        self.simulated = true;
        self.source = ProviderId::Synthetic;
        self
    }

    /// Checks `change_percent` against `change / previous_close`.
    pub fn change_is_consistent(&self) -> bool {
        if self.previous_close <= 0.0 {
            return self.change == 0.0 && self.change_percent == 0.0;
        }
        let expected = self.change / self.previous_close * 100.0;
        (expected - self.change_percent).abs() <= CHANGE_PERCENT_TOLERANCE
            && ((self.price - self.previous_close) - self.change).abs() <= CHANGE_PERCENT_TOLERANCE
    }
}

/// One sample of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Midnight UTC for daily and coarser intervals.
    pub timestamp: UtcDateTime,
    pub close: f64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<u64>,
}

impl PricePoint {
    pub fn close_only(timestamp: UtcDateTime, close: f64) -> Self {
        Self {
            timestamp,
            close,
            open: None,
            high: None,
            low: None,
            volume: None,
        }
    }

    pub fn date(&self) -> time::Date {
        self.timestamp.date()
    }
}

/// Ordered close series for one symbol; timestamps are strictly ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub symbol: Symbol,
    pub asset_class: AssetClass,
    pub interval: Interval,
    pub source: ProviderId,
    pub points: Vec<PricePoint>,
}

impl HistoricalSeries {
    /// Sorts points and keeps the last sample for any repeated timestamp.
    pub fn new(
        symbol: Symbol,
        asset_class: AssetClass,
        interval: Interval,
        source: ProviderId,
        mut points: Vec<PricePoint>,
    ) -> Self {
        points.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.timestamp == point.timestamp => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            symbol,
            asset_class,
            interval,
            source,
            points: deduped,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.points.last().map(|point| point.close)
    }
}

/// Result shape of the auto-detecting entry point: a quote, or an error object
/// carrying the symbol and the reason. Never a panic.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuoteOutcome {
    Ok(Quote),
    Error(FetchError),
}

impl QuoteOutcome {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            Self::Ok(quote) => Some(quote),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            Self::Ok(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn price(&self) -> Option<f64> {
        self.quote().map(|quote| quote.price)
    }

    pub fn into_result(self) -> Result<Quote, FetchError> {
        match self {
            Self::Ok(quote) => Ok(quote),
            Self::Error(error) => Err(error),
        }
    }
}

impl From<Result<Quote, FetchError>> for QuoteOutcome {
    fn from(value: Result<Quote, FetchError>) -> Self {
        match value {
            Ok(quote) => Self::Ok(quote),
            Err(error) => Self::Error(error),
        }
    }
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}
