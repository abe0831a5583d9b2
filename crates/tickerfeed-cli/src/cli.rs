//! CLI argument definitions for tickerfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `quote` | Resolve one symbol or alias to a current quote |
//! | `history` | Fetch a cleaned close series |
//! | `multi` | Resolve several symbols concurrently |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--config` | none | JSON document overriding configuration defaults |
//! | `--timeout-ms` | `10000` | Per-provider call timeout |
//!
//! # Examples
//!
//! ```bash
//! tickerfeed quote bitcoin
//! tickerfeed quote GOLD --asset-class commodity --pretty
//! tickerfeed history AAPL --days 30 --interval 1d
//! tickerfeed multi AAPL MSFT EURUSD
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tickerfeed_core::{AssetClass, Interval};

/// Multi-provider quote and history lookup.
///
/// Provider keys are read from TICKERFEED_FINNHUB_API_KEY and
/// TICKERFEED_ALPHAVANTAGE_API_KEY; missing keys disable those providers.
#[derive(Debug, Parser)]
#[command(name = "tickerfeed", author, version, about = "Multi-provider market data lookup")]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// JSON file overriding configuration defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Per-provider call timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve a symbol or alias (e.g. `gold`, `btc`, `EURUSD`) to a quote.
    Quote(QuoteArgs),

    /// Fetch a historical close series.
    History(HistoryArgs),

    /// Resolve several symbols; each succeeds or fails on its own.
    Multi(MultiArgs),
}

/// Asset class selector; `auto` classifies the symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssetClassArg {
    Auto,
    Equity,
    Crypto,
    Commodity,
    Forex,
}

impl AssetClassArg {
    pub const fn resolve(self) -> Option<AssetClass> {
        match self {
            Self::Auto => None,
            Self::Equity => Some(AssetClass::Equity),
            Self::Crypto => Some(AssetClass::Crypto),
            Self::Commodity => Some(AssetClass::Commodity),
            Self::Forex => Some(AssetClass::Forex),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntervalArg {
    #[value(name = "1h")]
    OneHour,
    #[value(name = "1d")]
    OneDay,
    #[value(name = "1wk")]
    OneWeek,
    #[value(name = "1mo")]
    OneMonth,
}

impl From<IntervalArg> for Interval {
    fn from(value: IntervalArg) -> Self {
        match value {
            IntervalArg::OneHour => Self::OneHour,
            IntervalArg::OneDay => Self::OneDay,
            IntervalArg::OneWeek => Self::OneWeek,
            IntervalArg::OneMonth => Self::OneMonth,
        }
    }
}

#[derive(Debug, Args)]
pub struct QuoteArgs {
    pub symbol: String,

    #[arg(long, value_enum, default_value_t = AssetClassArg::Auto)]
    pub asset_class: AssetClassArg,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub symbol: String,

    /// Calendar days back from today.
    #[arg(long, default_value_t = 30)]
    pub days: u32,

    #[arg(long, value_enum, default_value_t = IntervalArg::OneDay)]
    pub interval: IntervalArg,

    #[arg(long, value_enum, default_value_t = AssetClassArg::Auto)]
    pub asset_class: AssetClassArg,
}

#[derive(Debug, Args)]
pub struct MultiArgs {
    #[arg(required = true)]
    pub symbols: Vec<String>,

    #[arg(long, value_enum, default_value_t = AssetClassArg::Auto)]
    pub asset_class: AssetClassArg,
}
