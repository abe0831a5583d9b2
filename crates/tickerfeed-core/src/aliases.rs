//! Raw user input → canonical [`Symbol`].
//!
//! Normalization case-folds the input, strips pair-style prefixes and
//! provider-specific suffixes, then resolves the remainder through an
//! exact-match alias table. Unresolved input is returned uppercased.

use crate::classify::{currency_pair, CRYPTO_SYMBOLS};
use crate::{Symbol, ValidationError};

const PAIR_PREFIXES: &[&str] = &["crypto:", "forex:", "fx:", "x:", "c:", "commodity:"];

const CRYPTO_QUOTE_SUFFIXES: &[&str] = &["-usdt", "-usd", "/usdt", "/usd", "usdt", "usd"];

/// Exact-match alias table; keys are lowercase with single spaces.
const ALIASES: &[(&str, &str)] = &[
    // equities
    ("apple", "AAPL"),
    ("microsoft", "MSFT"),
    ("google", "GOOGL"),
    ("alphabet", "GOOGL"),
    ("amazon", "AMZN"),
    ("tesla", "TSLA"),
    ("nvidia", "NVDA"),
    ("meta", "META"),
    ("facebook", "META"),
    ("netflix", "NFLX"),
    ("berkshire", "BRK-B"),
    ("berkshire hathaway", "BRK-B"),
    ("s&p 500", "SPY"),
    ("sp500", "SPY"),
    ("nasdaq", "QQQ"),
    // crypto
    ("bitcoin", "BTC"),
    ("xbt", "BTC"),
    ("ethereum", "ETH"),
    ("ether", "ETH"),
    ("solana", "SOL"),
    ("ripple", "XRP"),
    ("cardano", "ADA"),
    ("dogecoin", "DOGE"),
    ("polkadot", "DOT"),
    ("litecoin", "LTC"),
    ("binance coin", "BNB"),
    ("avalanche", "AVAX"),
    ("polygon", "MATIC"),
    ("chainlink", "LINK"),
    // commodities
    ("gold", "GC"),
    ("xau", "GC"),
    ("xauusd", "GC"),
    ("silver", "SI"),
    ("xag", "SI"),
    ("xagusd", "SI"),
    ("oil", "CL"),
    ("crude", "CL"),
    ("crude oil", "CL"),
    ("wti", "CL"),
    ("brent", "BZ"),
    ("brent crude", "BZ"),
    ("natural gas", "NG"),
    ("natgas", "NG"),
    ("gas", "NG"),
    ("copper", "HG"),
    ("platinum", "PL"),
    ("palladium", "PA"),
    ("corn", "ZC"),
    ("wheat", "ZW"),
    ("soybeans", "ZS"),
    ("coffee", "KC"),
    ("sugar", "SB"),
    ("cotton", "CT"),
    // forex
    ("euro", "EURUSD"),
    ("pound", "GBPUSD"),
    ("sterling", "GBPUSD"),
    ("cable", "GBPUSD"),
    ("yen", "USDJPY"),
    ("swissie", "USDCHF"),
    ("loonie", "USDCAD"),
    ("aussie", "AUDUSD"),
    ("kiwi", "NZDUSD"),
];

/// Resolves raw input to a canonical symbol. Pure; no I/O.
pub fn normalize(input: &str) -> Result<Symbol, ValidationError> {
    let folded = fold(input);
    if folded.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }

    if let Some(canonical) = lookup_alias(&folded) {
        return Symbol::parse(canonical);
    }

    let stripped = strip_decorations(&folded);
    if let Some(canonical) = lookup_alias(&stripped) {
        return Symbol::parse(canonical);
    }

    Symbol::parse(&stripped)
}

fn fold(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

fn lookup_alias(key: &str) -> Option<&'static str> {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
}

fn strip_decorations(folded: &str) -> String {
    let mut value = folded.trim_start_matches('$');

    for prefix in PAIR_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            value = rest;
            break;
        }
    }

    // futures (`GC=F`) and Yahoo forex (`EURUSD=X`) suffixes
    for suffix in ["=f", "=x"] {
        if let Some(rest) = value.strip_suffix(suffix) {
            value = rest;
            break;
        }
    }

    let compact = value.replace('/', "");
    let upper = compact.to_ascii_uppercase();
    if currency_pair(&upper).is_some() {
        return upper;
    }

    for suffix in CRYPTO_QUOTE_SUFFIXES {
        if let Some(base) = value.strip_suffix(suffix) {
            let base = base.to_ascii_uppercase();
            if CRYPTO_SYMBOLS.contains(&base.as_str()) {
                return base;
            }
        }
    }

    upper
}
