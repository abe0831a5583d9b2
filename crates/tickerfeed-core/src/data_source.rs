//! Provider adapter contract and request types.
//!
//! Every upstream implements [`DataSource`]. Adapters translate canonical
//! symbols into the provider's own notation, perform one request, and map the
//! response into a [`Quote`] or [`HistoricalSeries`]. Retries, timeouts,
//! plausibility checks and caching all live above this seam.
//!
//! | Operation | Request | Response |
//! |-----------|---------|----------|
//! | Quote | [`QuoteRequest`] | [`Quote`] |
//! | History | [`HistoryRequest`] | [`HistoricalSeries`] |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::http_client::HttpError;
use crate::{AssetClass, HistoricalSeries, Interval, ProviderId, Quote, Symbol, ValidationError};

/// Asset classes and operations a source can serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilitySet {
    pub equity: bool,
    pub crypto: bool,
    pub commodity: bool,
    pub forex: bool,
    pub history: bool,
}

impl CapabilitySet {
    pub const fn new(asset_classes: &[AssetClass], history: bool) -> Self {
        let mut set = Self {
            equity: false,
            crypto: false,
            commodity: false,
            forex: false,
            history,
        };
        let mut index = 0;
        while index < asset_classes.len() {
            match asset_classes[index] {
                AssetClass::Equity => set.equity = true,
                AssetClass::Crypto => set.crypto = true,
                AssetClass::Commodity => set.commodity = true,
                AssetClass::Forex => set.forex = true,
            }
            index += 1;
        }
        set
    }

    pub const fn supports(self, asset_class: AssetClass) -> bool {
        match asset_class {
            AssetClass::Equity => self.equity,
            AssetClass::Crypto => self.crypto,
            AssetClass::Commodity => self.commodity,
            AssetClass::Forex => self.forex,
        }
    }

    pub const fn supports_history(self, asset_class: AssetClass) -> bool {
        self.history && self.supports(asset_class)
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Transport failure or 5xx.
    Unavailable,
    Timeout,
    RateLimited,
    /// Response could not be parsed into the expected shape.
    Malformed,
    /// Provider positively reported the symbol as unknown.
    NotFound,
    /// The source does not serve this asset class or operation.
    Unsupported,
    /// Parsed value failed a plausibility check.
    Implausible,
}

impl SourceErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Malformed => "malformed",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Implausible => "implausible",
        }
    }
}

/// Structured source error used by the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Malformed,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(symbol: &Symbol) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: format!("symbol '{symbol}' is not listed by this source"),
            retryable: false,
        }
    }

    pub fn unsupported(source: ProviderId, asset_class: AssetClass) -> Self {
        Self {
            kind: SourceErrorKind::Unsupported,
            message: format!("source '{source}' does not serve {asset_class}"),
            retryable: false,
        }
    }

    pub fn implausible(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Implausible,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Unsupported => "source.unsupported",
            SourceErrorKind::Implausible => "source.implausible",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<HttpError> for SourceError {
    fn from(error: HttpError) -> Self {
        if error.timed_out() {
            Self::timeout(error.message())
        } else {
            Self::unavailable(error.message())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(error: serde_json::Error) -> Self {
        Self::malformed(format!("unexpected response shape: {error}"))
    }
}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::malformed(error.to_string())
    }
}

/// Maps a non-2xx status onto the error taxonomy.
pub fn status_error(source: ProviderId, status: u16) -> SourceError {
    match status {
        429 => SourceError::rate_limited(format!("{source} returned 429")),
        408 | 500..=599 => SourceError::unavailable(format!("{source} returned {status}")),
        _ => SourceError::malformed(format!("{source} returned unexpected status {status}")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbol: Symbol,
    pub asset_class: AssetClass,
}

impl QuoteRequest {
    pub fn new(symbol: Symbol, asset_class: AssetClass) -> Self {
        Self {
            symbol,
            asset_class,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub symbol: Symbol,
    pub asset_class: AssetClass,
    /// Calendar days back from today.
    pub days: u32,
    pub interval: Interval,
}

impl HistoryRequest {
    pub fn new(
        symbol: Symbol,
        asset_class: AssetClass,
        days: u32,
        interval: Interval,
    ) -> Result<Self, ValidationError> {
        if days == 0 {
            return Err(ValidationError::EmptyHistoryWindow);
        }

        Ok(Self {
            symbol,
            asset_class,
            days,
            interval,
        })
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Upstream adapter contract.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// chain that lists it.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote>;

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries>;
}
