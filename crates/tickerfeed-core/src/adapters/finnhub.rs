use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{fetch, finish_quote, history_window};
use crate::data_source::{
    CapabilitySet, DataSource, HistoryRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    AssetClass, HistoricalSeries, Interval, PricePoint, ProviderId, Quote, QuotePrices,
    UtcDateTime,
};

const API_BASE: &str = "https://finnhub.io/api/v1";

/// Secondary source: Finnhub. Broad equity coverage; requires an API key.
#[derive(Clone)]
pub struct FinnhubAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    timeout_ms: u64,
}

impl FinnhubAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            timeout_ms: 10_000,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    fn request(&self, url: String) -> HttpRequest {
        HttpRequest::get(url)
            .with_header("X-Finnhub-Token", self.api_key.as_str())
            .with_timeout_ms(self.timeout_ms)
    }

    fn ensure_supported(&self, asset_class: AssetClass) -> Result<(), SourceError> {
        if self.capabilities().supports(asset_class) {
            Ok(())
        } else {
            Err(SourceError::unsupported(ProviderId::Secondary, asset_class))
        }
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        self.ensure_supported(req.asset_class)?;

        let url = format!(
            "{API_BASE}/quote?symbol={}",
            urlencoding::encode(req.symbol.as_str())
        );
        let response = fetch(self.http_client.as_ref(), ProviderId::Secondary, self.request(url), &[]).await?;
        let payload: FinnhubQuote = serde_json::from_str(&response.body)?;

        // unknown symbols come back as an all-zero payload
        let price = payload.current.unwrap_or(0.0);
        if price == 0.0 && payload.timestamp.unwrap_or(0) == 0 {
            return Err(SourceError::not_found(&req.symbol));
        }

        let prices = QuotePrices {
            price,
            open: payload.open.filter(|value| *value > 0.0).unwrap_or(price),
            high: payload.high.filter(|value| *value > 0.0).unwrap_or(price),
            low: payload.low.filter(|value| *value > 0.0).unwrap_or(price),
            previous_close: payload.previous_close.unwrap_or(0.0),
            volume: None,
        };

        let quote = Quote::new(req.symbol, req.asset_class, prices, ProviderId::Secondary)?;
        Ok(finish_quote(quote))
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<HistoricalSeries, SourceError> {
        self.ensure_supported(req.asset_class)?;

        let (from, to) = history_window(req.days);
        let resolution = match req.interval {
            Interval::OneHour => "60",
            Interval::OneDay => "D",
            Interval::OneWeek => "W",
            Interval::OneMonth => "M",
        };
        let url = format!(
            "{API_BASE}/stock/candle?symbol={}&resolution={resolution}&from={from}&to={to}",
            urlencoding::encode(req.symbol.as_str())
        );
        let response = fetch(self.http_client.as_ref(), ProviderId::Secondary, self.request(url), &[]).await?;
        let candles: FinnhubCandles = serde_json::from_str(&response.body)?;

        match candles.status.as_str() {
            "ok" => {}
            "no_data" => {
                return Err(SourceError::unavailable(format!(
                    "finnhub has no candles for {} in the requested window",
                    req.symbol
                )))
            }
            other => {
                return Err(SourceError::malformed(format!(
                    "finnhub candle status '{other}'"
                )))
            }
        }

        let points = candles
            .timestamps
            .iter()
            .enumerate()
            .filter_map(|(index, &seconds)| {
                let timestamp = UtcDateTime::from_unix_timestamp(seconds)?;
                Some(PricePoint {
                    timestamp,
                    close: candles.close.get(index).copied().unwrap_or(f64::NAN),
                    open: candles.open.get(index).copied(),
                    high: candles.high.get(index).copied(),
                    low: candles.low.get(index).copied(),
                    volume: candles
                        .volume
                        .get(index)
                        .copied()
                        .filter(|value| value.is_finite() && *value >= 0.0)
                        .map(|value| value.round() as u64),
                })
            })
            .collect();

        Ok(HistoricalSeries::new(
            req.symbol,
            req.asset_class,
            req.interval,
            ProviderId::Secondary,
            points,
        ))
    }
}

impl DataSource for FinnhubAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Secondary
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&[AssetClass::Equity], true)
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(self.fetch_history(req))
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuote {
    #[serde(rename = "c", default)]
    current: Option<f64>,
    #[serde(rename = "o", default)]
    open: Option<f64>,
    #[serde(rename = "h", default)]
    high: Option<f64>,
    #[serde(rename = "l", default)]
    low: Option<f64>,
    #[serde(rename = "pc", default)]
    previous_close: Option<f64>,
    #[serde(rename = "t", default)]
    timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FinnhubCandles {
    #[serde(rename = "s")]
    status: String,
    #[serde(rename = "t", default)]
    timestamps: Vec<i64>,
    #[serde(rename = "o", default)]
    open: Vec<f64>,
    #[serde(rename = "h", default)]
    high: Vec<f64>,
    #[serde(rename = "l", default)]
    low: Vec<f64>,
    #[serde(rename = "c", default)]
    close: Vec<f64>,
    #[serde(rename = "v", default)]
    volume: Vec<f64>,
}
