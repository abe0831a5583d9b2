use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Identifies which upstream produced a quote.
///
/// Identifiers name the role a source plays in the fallback chains rather than
/// the vendor behind it, so a vendor swap does not change cached or reported
/// `source` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Low-latency REST quote/history source (Yahoo chart API).
    Primary,
    /// Broad-coverage keyed source (Finnhub).
    Secondary,
    /// Rate-limited keyed source (Alpha Vantage).
    Tertiary,
    /// Crypto-specific aggregator (CoinGecko).
    CryptoAggregator,
    /// Degraded-mode synthesizer; never a real upstream.
    Synthetic,
}

impl ProviderId {
    pub const UPSTREAM: [Self; 4] = [
        Self::Primary,
        Self::Secondary,
        Self::Tertiary,
        Self::CryptoAggregator,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
            Self::CryptoAggregator => "crypto_aggregator",
            Self::Synthetic => "synthetic",
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "tertiary" => Ok(Self::Tertiary),
            "crypto_aggregator" => Ok(Self::CryptoAggregator),
            "synthetic" => Ok(Self::Synthetic),
            other => Err(ValidationError::InvalidConfig {
                message: format!("unknown provider '{other}'"),
            }),
        }
    }
}
