//! Asset-class detection for canonical symbols.
//!
//! Rules are evaluated in a fixed order and never touch the network:
//!
//! 1. six-letter pair of known currency codes → [`AssetClass::Forex`]
//! 2. member of the crypto set → [`AssetClass::Crypto`]
//! 3. member of the commodity set, or contains a commodity keyword → [`AssetClass::Commodity`]
//! 4. anything else → [`AssetClass::Equity`]

use crate::{AssetClass, Symbol};

pub(crate) const FIAT_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CHF", "CAD", "AUD", "NZD", "CNY", "HKD", "SGD", "SEK", "NOK",
    "DKK", "INR", "MXN", "ZAR", "TRY", "BRL", "KRW", "PLN",
];

pub(crate) const CRYPTO_SYMBOLS: &[&str] = &[
    "BTC", "ETH", "SOL", "XRP", "ADA", "DOGE", "DOT", "LTC", "BNB", "AVAX", "MATIC", "LINK",
    "SHIB", "UNI", "ATOM", "XLM", "TRX", "BCH", "NEAR", "APT",
];

pub(crate) const COMMODITY_SYMBOLS: &[&str] = &[
    "GC", "SI", "CL", "BZ", "NG", "HG", "PL", "PA", "HO", "RB", "ZC", "ZW", "ZS", "KC", "SB", "CT",
];

const COMMODITY_KEYWORDS: &[&str] = &[
    "GOLD", "SILVER", "OIL", "CRUDE", "BRENT", "NATGAS", "COPPER", "PLATINUM", "WHEAT", "CORN",
];

/// Classifies a canonical symbol. Pure and deterministic.
pub fn classify(symbol: &Symbol) -> AssetClass {
    let raw = symbol.as_str();

    if is_currency_pair(raw) {
        return AssetClass::Forex;
    }

    if CRYPTO_SYMBOLS.contains(&raw) {
        return AssetClass::Crypto;
    }

    if COMMODITY_SYMBOLS.contains(&raw)
        || COMMODITY_KEYWORDS
            .iter()
            .any(|keyword| raw.contains(keyword))
    {
        return AssetClass::Commodity;
    }

    AssetClass::Equity
}

/// Splits `EURUSD` into `("EUR", "USD")` when both halves are known fiat codes.
pub fn currency_pair(raw: &str) -> Option<(&str, &str)> {
    if raw.len() != 6 || !raw.bytes().all(|byte| byte.is_ascii_uppercase()) {
        return None;
    }

    let (base, quote) = raw.split_at(3);
    if base != quote && FIAT_CURRENCIES.contains(&base) && FIAT_CURRENCIES.contains(&quote) {
        Some((base, quote))
    } else {
        None
    }
}

fn is_currency_pair(raw: &str) -> bool {
    currency_pair(raw).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify_raw(raw: &str) -> AssetClass {
        classify(&Symbol::parse(raw).expect("valid symbol"))
    }

    #[test]
    fn detects_currency_pairs_before_other_rules() {
        assert_eq!(classify_raw("EURUSD"), AssetClass::Forex);
        assert_eq!(classify_raw("USDJPY"), AssetClass::Forex);
        assert_ne!(classify_raw("USDUSD"), AssetClass::Forex);
        assert_ne!(classify_raw("BTCUSD"), AssetClass::Forex);
    }

    #[test]
    fn detects_crypto_and_commodities() {
        assert_eq!(classify_raw("BTC"), AssetClass::Crypto);
        assert_eq!(classify_raw("DOGE"), AssetClass::Crypto);
        assert_eq!(classify_raw("GC"), AssetClass::Commodity);
        assert_eq!(classify_raw("CL"), AssetClass::Commodity);
        assert_eq!(classify_raw("GOLDUSD"), AssetClass::Commodity);
    }

    #[test]
    fn everything_else_is_equity() {
        assert_eq!(classify_raw("AAPL"), AssetClass::Equity);
        assert_eq!(classify_raw("BRK.B"), AssetClass::Equity);
        assert_eq!(classify_raw("7203.T"), AssetClass::Equity);
    }

    #[test]
    fn classification_is_deterministic() {
        let symbol = Symbol::parse("ETH").expect("valid symbol");
        let first = classify(&symbol);
        for _ in 0..100 {
            assert_eq!(classify(&symbol), first);
        }
    }
}
