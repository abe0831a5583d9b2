use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{fetch, finish_quote, history_window};
use crate::data_source::{
    CapabilitySet, DataSource, HistoryRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{
    AssetClass, HistoricalSeries, Interval, PricePoint, ProviderId, Quote, QuotePrices, Symbol,
    UtcDateTime,
};

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Primary source: Yahoo chart API. Serves every asset class, no key needed.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    timeout_ms: u64,
}

impl YahooAdapter {
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

    /// `BTC` → `BTC-USD`, `GC` → `GC=F`, `EURUSD` → `EURUSD=X`, `BRK.B` → `BRK-B`.
    pub fn provider_symbol(symbol: &Symbol, asset_class: AssetClass) -> String {
        match asset_class {
            AssetClass::Equity => symbol.as_str().replace('.', "-"),
            AssetClass::Crypto => format!("{symbol}-USD"),
            AssetClass::Commodity => format!("{symbol}=F"),
            AssetClass::Forex => format!("{symbol}=X"),
        }
    }

    async fn chart(&self, symbol: &Symbol, url: String) -> Result<ChartResult, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("referer", "https://finance.yahoo.com/")
            .with_timeout_ms(self.timeout_ms);
        let response = fetch(self.http_client.as_ref(), ProviderId::Primary, request, &[404]).await?;

        let envelope: ChartEnvelope = serde_json::from_str(&response.body)?;
        if let Some(error) = envelope.chart.error {
            if error.code.eq_ignore_ascii_case("not found") {
                return Err(SourceError::not_found(symbol));
            }
            return Err(SourceError::unavailable(format!(
                "yahoo chart error {}: {}",
                error.code,
                error.description.unwrap_or_default()
            )));
        }
        if response.status == 404 {
            return Err(SourceError::not_found(symbol));
        }

        envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| SourceError::malformed("yahoo chart response has no result"))
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let url = format!(
            "{CHART_ENDPOINT}/{}?range=1d&interval=1d",
            urlencoding::encode(&Self::provider_symbol(&req.symbol, req.asset_class))
        );
        let result = self.chart(&req.symbol, url).await?;
        let meta = result.meta;

        let price = meta
            .regular_market_price
            .ok_or_else(|| SourceError::malformed("yahoo chart meta has no regularMarketPrice"))?;
        let series = result.indicators.quote.into_iter().next().unwrap_or_default();
        let open = first_present(&series.open).unwrap_or(price);

        let prices = QuotePrices {
            price,
            open,
            high: meta.regular_market_day_high.unwrap_or(price),
            low: meta.regular_market_day_low.unwrap_or(price),
            previous_close: meta
                .chart_previous_close
                .or(meta.previous_close)
                .unwrap_or(0.0),
            volume: meta.regular_market_volume.and_then(volume_from_f64),
        };

        let mut quote = Quote::new(req.symbol, req.asset_class, prices, ProviderId::Primary)?;
        if let Some(currency) = meta.currency {
            quote = quote.with_currency(currency);
        }
        Ok(finish_quote(quote))
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<HistoricalSeries, SourceError> {
        let (period1, period2) = history_window(req.days);
        let interval = match req.interval {
            Interval::OneHour => "60m",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
            Interval::OneMonth => "1mo",
        };
        let url = format!(
            "{CHART_ENDPOINT}/{}?period1={period1}&period2={period2}&interval={interval}",
            urlencoding::encode(&Self::provider_symbol(&req.symbol, req.asset_class))
        );
        let result = self.chart(&req.symbol, url).await?;
        let series = result.indicators.quote.into_iter().next().unwrap_or_default();

        let mut points = Vec::with_capacity(result.timestamp.len());
        for (index, &seconds) in result.timestamp.iter().enumerate() {
            let Some(timestamp) = UtcDateTime::from_unix_timestamp(seconds) else {
                continue;
            };
            // null closes become NaN and are repaired or dropped by series cleaning
            let close = value_at(&series.close, index).unwrap_or(f64::NAN);
            points.push(PricePoint {
                timestamp,
                close,
                open: value_at(&series.open, index),
                high: value_at(&series.high, index),
                low: value_at(&series.low, index),
                volume: value_at(&series.volume, index).and_then(volume_from_f64),
            });
        }

        Ok(HistoricalSeries::new(
            req.symbol,
            req.asset_class,
            req.interval,
            ProviderId::Primary,
            points,
        ))
    }
}

impl DataSource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Primary
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&AssetClass::ALL, true)
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(self.fetch_history(req))
    }
}

fn first_present(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().find(|value| value.is_finite())
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

fn volume_from_f64(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartApiError {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    previous_close: Option<f64>,
    #[serde(default)]
    regular_market_day_high: Option<f64>,
    #[serde(default)]
    regular_market_day_low: Option<f64>,
    #[serde(default)]
    regular_market_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}
