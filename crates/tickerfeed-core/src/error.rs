use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::routing::AttemptRecord;
use crate::{AssetClass, Symbol};

/// Validation and contract errors exposed by `tickerfeed-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("invalid interval '{value}', expected one of 1h, 1d, 1wk, 1mo")]
    InvalidInterval { value: String },
    #[error("invalid asset class '{value}', expected one of auto, equity, crypto, commodity, forex")]
    InvalidAssetClass { value: String },
    #[error("history window must cover at least one day")]
    EmptyHistoryWindow,

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be positive")]
    NonPositiveValue { field: &'static str },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Caller-visible failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Transport, timeout or malformed response after retries.
    ProviderUnavailable,
    /// Structurally valid data that failed a plausibility check.
    ImplausibleData,
    /// Every provider in the chain failed or was skipped.
    AllProvidersExhausted,
    /// A provider positively reported the symbol as unknown.
    UnknownSymbol,
    /// The request itself was malformed.
    InvalidRequest,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ImplausibleData => "implausible_data",
            Self::AllProvidersExhausted => "all_providers_exhausted",
            Self::UnknownSymbol => "unknown_symbol",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure returned by the facade instead of a panic or exception.
///
/// Individual provider failures never surface on their own; they are folded
/// into `attempts` for diagnostics.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
#[error("{kind} for {symbol} ({asset_class}): {reason}")]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub reason: String,
    pub attempts: Vec<AttemptRecord>,
}

impl FetchError {
    pub fn new(
        kind: FetchErrorKind,
        symbol: &Symbol,
        asset_class: AssetClass,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            symbol: symbol.as_str().to_owned(),
            asset_class,
            reason: reason.into(),
            attempts: Vec::new(),
        }
    }

    pub fn invalid_request(
        raw_symbol: impl Into<String>,
        asset_class: AssetClass,
        error: ValidationError,
    ) -> Self {
        Self {
            kind: FetchErrorKind::InvalidRequest,
            symbol: raw_symbol.into(),
            asset_class,
            reason: error.to_string(),
            attempts: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.attempts = attempts;
        self
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }
}

/// Top-level error type for setup operations (configuration, client construction).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
