use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{fetch, finish_quote};
use crate::data_source::{
    CapabilitySet, DataSource, HistoryRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    AssetClass, HistoricalSeries, Interval, PricePoint, ProviderId, Quote, QuotePrices, Symbol,
    UtcDateTime,
};

const API_BASE: &str = "https://api.coingecko.com/api/v3";

const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("LTC", "litecoin"),
    ("BNB", "binancecoin"),
    ("AVAX", "avalanche-2"),
    ("MATIC", "matic-network"),
    ("LINK", "chainlink"),
    ("SHIB", "shiba-inu"),
    ("UNI", "uniswap"),
    ("ATOM", "cosmos"),
    ("XLM", "stellar"),
    ("TRX", "tron"),
    ("BCH", "bitcoin-cash"),
    ("NEAR", "near"),
    ("APT", "aptos"),
];

/// Crypto aggregator: CoinGecko. Crypto only, no key needed.
#[derive(Clone)]
pub struct CoinGeckoAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl CoinGeckoAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// CoinGecko coin id for a canonical ticker, e.g. `BTC` → `bitcoin`.
    pub fn coin_id(symbol: &Symbol) -> Option<&'static str> {
        COIN_IDS
            .iter()
            .find(|(ticker, _)| *ticker == symbol.as_str())
            .map(|(_, id)| *id)
    }

    fn resolve(&self, symbol: &Symbol, asset_class: AssetClass) -> Result<&'static str, SourceError> {
        if asset_class != AssetClass::Crypto {
            return Err(SourceError::unsupported(ProviderId::CryptoAggregator, asset_class));
        }
        // a ticker missing from the id table may still be known to the next source
        Self::coin_id(symbol).ok_or_else(|| {
            SourceError::unsupported(ProviderId::CryptoAggregator, asset_class)
        })
    }

    async fn get(&self, url: String) -> Result<String, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout_ms(self.timeout_ms);
        let response = fetch(
            self.http_client.as_ref(),
            ProviderId::CryptoAggregator,
            request,
            &[],
        )
        .await?;
        Ok(response.body)
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let coin_id = self.resolve(&req.symbol, req.asset_class)?;
        let body = self
            .get(format!("{API_BASE}/coins/markets?vs_currency=usd&ids={coin_id}"))
            .await?;
        let markets: Vec<CoinMarket> = serde_json::from_str(&body)?;
        let market = markets
            .into_iter()
            .find(|market| market.id == coin_id)
            .ok_or_else(|| SourceError::not_found(&req.symbol))?;

        let price = market
            .current_price
            .ok_or_else(|| SourceError::malformed("coingecko market has no current_price"))?;
        let previous_close = market
            .price_change_24h
            .map(|change| price - change)
            .filter(|value| *value > 0.0)
            .unwrap_or(0.0);

        let prices = QuotePrices {
            price,
            open: if previous_close > 0.0 { previous_close } else { price },
            high: market.high_24h.unwrap_or(price),
            low: market.low_24h.unwrap_or(price),
            previous_close,
            volume: market
                .total_volume
                .filter(|value| value.is_finite() && *value >= 0.0)
                .map(|value| value.round() as u64),
        };

        let quote = Quote::new(req.symbol, req.asset_class, prices, ProviderId::CryptoAggregator)?;
        Ok(finish_quote(quote))
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<HistoricalSeries, SourceError> {
        let coin_id = self.resolve(&req.symbol, req.asset_class)?;
        let interval_param = match req.interval {
            Interval::OneDay => "&interval=daily",
            // hourly granularity is automatic for windows up to 90 days
            Interval::OneHour => "",
            Interval::OneWeek | Interval::OneMonth => {
                return Err(SourceError::unsupported(
                    ProviderId::CryptoAggregator,
                    req.asset_class,
                ))
            }
        };
        let body = self
            .get(format!(
                "{API_BASE}/coins/{coin_id}/market_chart?vs_currency=usd&days={}{interval_param}",
                req.days
            ))
            .await?;
        let chart: MarketChart = serde_json::from_str(&body)?;

        let points = chart
            .prices
            .iter()
            .enumerate()
            .filter_map(|(index, &(millis, close))| {
                let timestamp = UtcDateTime::from_unix_timestamp((millis / 1000.0) as i64)?;
                let volume = chart
                    .total_volumes
                    .get(index)
                    .map(|&(_, volume)| volume)
                    .filter(|value| value.is_finite() && *value >= 0.0)
                    .map(|value| value.round() as u64);
                Some(PricePoint {
                    volume,
                    ..PricePoint::close_only(timestamp, close.unwrap_or(f64::NAN))
                })
            })
            .collect();

        Ok(HistoricalSeries::new(
            req.symbol,
            req.asset_class,
            req.interval,
            ProviderId::CryptoAggregator,
            points,
        ))
    }
}

impl DataSource for CoinGeckoAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::CryptoAggregator
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&[AssetClass::Crypto], true)
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(self.fetch_history(req))
    }
}

#[derive(Debug, Deserialize)]
struct CoinMarket {
    id: String,
    #[serde(default)]
    current_price: Option<f64>,
    #[serde(default)]
    high_24h: Option<f64>,
    #[serde(default)]
    low_24h: Option<f64>,
    #[serde(default)]
    total_volume: Option<f64>,
    #[serde(default)]
    price_change_24h: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    #[serde(default)]
    prices: Vec<(f64, Option<f64>)>,
    #[serde(default)]
    total_volumes: Vec<(f64, f64)>,
}
