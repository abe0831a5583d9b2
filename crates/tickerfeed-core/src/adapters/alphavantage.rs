use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use time::macros::format_description;
use time::{Date, OffsetDateTime};
use tracing::debug;

use super::{fetch, finish_quote};
use crate::classify::currency_pair;
use crate::data_source::{
    CapabilitySet, DataSource, HistoryRequest, QuoteRequest, SourceError, SourceFuture,
};
use crate::http_client::{HttpClient, HttpRequest};
use crate::throttling::RequestBudget;
use crate::{
    AssetClass, HistoricalSeries, Interval, PricePoint, ProviderId, Quote, QuotePrices, Symbol,
    UtcDateTime,
};

const API_BASE: &str = "https://www.alphavantage.co/query";

/// How a commodity symbol is served by Alpha Vantage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommodityRoute {
    /// Spot metal priced as a currency (`XAU` → `USD`).
    Metal(&'static str),
    /// Commodity endpoint returning a dated value list (`WTI`, `BRENT`, ...).
    Series(&'static str),
}

fn commodity_route(symbol: &Symbol) -> Option<CommodityRoute> {
    match symbol.as_str() {
        "GC" => Some(CommodityRoute::Metal("XAU")),
        "SI" => Some(CommodityRoute::Metal("XAG")),
        "CL" => Some(CommodityRoute::Series("WTI")),
        "BZ" => Some(CommodityRoute::Series("BRENT")),
        "NG" => Some(CommodityRoute::Series("NATURAL_GAS")),
        "HG" => Some(CommodityRoute::Series("COPPER")),
        "ZW" => Some(CommodityRoute::Series("WHEAT")),
        "ZC" => Some(CommodityRoute::Series("CORN")),
        "KC" => Some(CommodityRoute::Series("COFFEE")),
        "SB" => Some(CommodityRoute::Series("SUGAR")),
        "CT" => Some(CommodityRoute::Series("COTTON")),
        _ => None,
    }
}

/// Tertiary source: Alpha Vantage. Keyed and tightly rate limited, so every
/// upstream call first draws from a local request budget.
#[derive(Clone)]
pub struct AlphaVantageAdapter {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    timeout_ms: u64,
    budget: RequestBudget,
}

impl AlphaVantageAdapter {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            timeout_ms: 10_000,
            budget: RequestBudget::per_minute(5),
        }
    }

    pub fn with_budget(mut self, budget: RequestBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    async fn query(&self, symbol: &Symbol, params: &[(&str, &str)]) -> Result<Value, SourceError> {
        if !self.budget.try_acquire() {
            return Err(SourceError::rate_limited(format!(
                "alphavantage request budget of {}/min exhausted",
                self.budget.limit_per_minute()
            )));
        }

        let mut url = format!("{API_BASE}?apikey={}", urlencoding::encode(&self.api_key));
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }

        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let response = fetch(self.http_client.as_ref(), ProviderId::Tertiary, request, &[]).await?;
        let body: Value = serde_json::from_str(&response.body)?;
        check_envelope(symbol, body)
    }

    async fn fetch_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let prices = match req.asset_class {
            AssetClass::Equity => self.equity_quote(&req.symbol).await?,
            AssetClass::Forex => {
                let (from, to) = pair(&req.symbol)?;
                self.exchange_rate(&req.symbol, from, to).await?
            }
            AssetClass::Commodity => match commodity_route(&req.symbol) {
                Some(CommodityRoute::Metal(code)) => {
                    self.exchange_rate(&req.symbol, code, "USD").await?
                }
                Some(CommodityRoute::Series(function)) => {
                    let points = self
                        .commodity_points(&req.symbol, function, Interval::OneDay)
                        .await?;
                    latest_two(&points).ok_or_else(|| {
                        SourceError::malformed(format!("alphavantage {function} has no values"))
                    })?
                }
                None => {
                    return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
                }
            },
            AssetClass::Crypto => {
                return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
            }
        };

        let quote = Quote::new(req.symbol, req.asset_class, prices, ProviderId::Tertiary)?;
        Ok(finish_quote(quote))
    }

    async fn equity_quote(&self, symbol: &Symbol) -> Result<QuotePrices, SourceError> {
        let body = self
            .query(symbol, &[("function", "GLOBAL_QUOTE"), ("symbol", symbol.as_str())])
            .await?;
        let envelope: GlobalQuoteEnvelope = from_value(body)?;
        let quote = envelope.global_quote;
        // unknown symbols return an empty object
        let Some(price) = quote.price.as_deref().and_then(parse_number) else {
            return Err(SourceError::not_found(symbol));
        };

        Ok(QuotePrices {
            price,
            open: quote.open.as_deref().and_then(parse_number).unwrap_or(price),
            high: quote.high.as_deref().and_then(parse_number).unwrap_or(price),
            low: quote.low.as_deref().and_then(parse_number).unwrap_or(price),
            previous_close: quote
                .previous_close
                .as_deref()
                .and_then(parse_number)
                .unwrap_or(0.0),
            volume: quote
                .volume
                .as_deref()
                .and_then(|raw| raw.trim().parse::<u64>().ok()),
        })
    }

    async fn exchange_rate(
        &self,
        symbol: &Symbol,
        from: &str,
        to: &str,
    ) -> Result<QuotePrices, SourceError> {
        let body = self
            .query(
                symbol,
                &[
                    ("function", "CURRENCY_EXCHANGE_RATE"),
                    ("from_currency", from),
                    ("to_currency", to),
                ],
            )
            .await?;
        let envelope: ExchangeRateEnvelope = from_value(body)?;
        let rate = parse_number(&envelope.rate.exchange_rate).ok_or_else(|| {
            SourceError::malformed(format!(
                "alphavantage exchange rate '{}' is not a number",
                envelope.rate.exchange_rate
            ))
        })?;

        // spot endpoints carry no reference close
        Ok(QuotePrices::from_last(rate, 0.0))
    }

    async fn commodity_points(
        &self,
        symbol: &Symbol,
        function: &str,
        interval: Interval,
    ) -> Result<Vec<PricePoint>, SourceError> {
        let interval = match interval {
            Interval::OneDay => "daily",
            Interval::OneWeek => "weekly",
            Interval::OneMonth => "monthly",
            Interval::OneHour => {
                return Err(SourceError::unsupported(ProviderId::Tertiary, AssetClass::Commodity))
            }
        };
        let body = self
            .query(symbol, &[("function", function), ("interval", interval)])
            .await?;
        let envelope: CommodityEnvelope = from_value(body)?;

        let points = envelope
            .data
            .iter()
            .filter_map(|entry| {
                let timestamp = parse_date(&entry.date)?;
                // "." marks a missing value
                let close = parse_number(&entry.value).unwrap_or(f64::NAN);
                Some(PricePoint::close_only(timestamp, close))
            })
            .collect();
        Ok(points)
    }

    async fn fetch_history(&self, req: HistoryRequest) -> Result<HistoricalSeries, SourceError> {
        let points = match req.asset_class {
            AssetClass::Equity => {
                let (function, key) = match req.interval {
                    Interval::OneDay => ("TIME_SERIES_DAILY", "Time Series (Daily)"),
                    Interval::OneWeek => ("TIME_SERIES_WEEKLY", "Weekly Time Series"),
                    Interval::OneMonth => ("TIME_SERIES_MONTHLY", "Monthly Time Series"),
                    Interval::OneHour => {
                        return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
                    }
                };
                let output_size = if req.days > 100 { "full" } else { "compact" };
                let body = self
                    .query(
                        &req.symbol,
                        &[
                            ("function", function),
                            ("symbol", req.symbol.as_str()),
                            ("outputsize", output_size),
                        ],
                    )
                    .await?;
                time_series_points(&body, key)?
            }
            AssetClass::Forex => {
                let (from, to) = pair(&req.symbol)?;
                let (function, key) = match req.interval {
                    Interval::OneDay => ("FX_DAILY", "Time Series FX (Daily)"),
                    Interval::OneWeek => ("FX_WEEKLY", "Time Series FX (Weekly)"),
                    Interval::OneMonth => ("FX_MONTHLY", "Time Series FX (Monthly)"),
                    Interval::OneHour => {
                        return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
                    }
                };
                let body = self
                    .query(
                        &req.symbol,
                        &[("function", function), ("from_symbol", from), ("to_symbol", to)],
                    )
                    .await?;
                time_series_points(&body, key)?
            }
            AssetClass::Commodity => match commodity_route(&req.symbol) {
                Some(CommodityRoute::Series(function)) => {
                    self.commodity_points(&req.symbol, function, req.interval)
                        .await?
                }
                Some(CommodityRoute::Metal(_)) | None => {
                    return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
                }
            },
            AssetClass::Crypto => {
                return Err(SourceError::unsupported(ProviderId::Tertiary, req.asset_class))
            }
        };

        let cutoff = OffsetDateTime::now_utc() - time::Duration::days(i64::from(req.days));
        let points = points
            .into_iter()
            .filter(|point| point.timestamp.into_inner() >= cutoff)
            .collect();

        Ok(HistoricalSeries::new(
            req.symbol,
            req.asset_class,
            req.interval,
            ProviderId::Tertiary,
            points,
        ))
    }
}

impl DataSource for AlphaVantageAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Tertiary
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(
            &[AssetClass::Equity, AssetClass::Commodity, AssetClass::Forex],
            true,
        )
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.fetch_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(self.fetch_history(req))
    }
}

/// Alpha Vantage reports throttling and bad symbols inside a 200 response.
fn check_envelope(symbol: &Symbol, body: Value) -> Result<Value, SourceError> {
    if let Some(note) = body
        .get("Note")
        .or_else(|| body.get("Information"))
        .and_then(Value::as_str)
    {
        debug!(%symbol, note, "alphavantage throttled request");
        return Err(SourceError::rate_limited(format!("alphavantage: {note}")));
    }
    if body.get("Error Message").is_some() {
        return Err(SourceError::not_found(symbol));
    }
    Ok(body)
}

fn from_value<T: DeserializeOwned>(body: Value) -> Result<T, SourceError> {
    serde_json::from_value(body).map_err(SourceError::from)
}

fn pair(symbol: &Symbol) -> Result<(&str, &str), SourceError> {
    currency_pair(symbol.as_str())
        .ok_or_else(|| SourceError::unsupported(ProviderId::Tertiary, AssetClass::Forex))
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn parse_date(raw: &str) -> Option<UtcDateTime> {
    let date = Date::parse(raw.trim(), format_description!("[year]-[month]-[day]")).ok()?;
    UtcDateTime::from_offset_datetime(date.midnight().assume_utc()).ok()
}

/// Newest valid value as the price, the one before it as the reference close.
fn latest_two(points: &[PricePoint]) -> Option<QuotePrices> {
    let mut newest_first: Vec<&PricePoint> = points
        .iter()
        .filter(|point| point.close.is_finite() && point.close > 0.0)
        .collect();
    newest_first.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));

    let latest = newest_first.first()?;
    let previous = newest_first.get(1).map(|point| point.close).unwrap_or(0.0);
    Some(QuotePrices::from_last(latest.close, previous))
}

fn time_series_points(body: &Value, key: &str) -> Result<Vec<PricePoint>, SourceError> {
    let series = body
        .get(key)
        .ok_or_else(|| SourceError::malformed(format!("alphavantage response has no '{key}'")))?;
    let rows: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_value(series.clone())?;

    let points = rows
        .iter()
        .filter_map(|(date, fields)| {
            let timestamp = parse_date(date)?;
            let field = |suffix: &str| {
                fields
                    .iter()
                    .find(|(name, _)| name.ends_with(suffix))
                    .and_then(|(_, value)| parse_number(value))
            };
            Some(PricePoint {
                timestamp,
                close: field("close").unwrap_or(f64::NAN),
                open: field("open"),
                high: field("high"),
                low: field("low"),
                volume: field("volume").map(|value| value.round() as u64),
            })
        })
        .collect();
    Ok(points)
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteEnvelope {
    #[serde(rename = "Global Quote", default)]
    global_quote: GlobalQuote,
}

#[derive(Debug, Default, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "02. open", default)]
    open: Option<String>,
    #[serde(rename = "03. high", default)]
    high: Option<String>,
    #[serde(rename = "04. low", default)]
    low: Option<String>,
    #[serde(rename = "05. price", default)]
    price: Option<String>,
    #[serde(rename = "06. volume", default)]
    volume: Option<String>,
    #[serde(rename = "08. previous close", default)]
    previous_close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeRateEnvelope {
    #[serde(rename = "Realtime Currency Exchange Rate")]
    rate: ExchangeRate,
}

#[derive(Debug, Deserialize)]
struct ExchangeRate {
    #[serde(rename = "5. Exchange Rate")]
    exchange_rate: String,
}

#[derive(Debug, Deserialize)]
struct CommodityEnvelope {
    #[serde(default)]
    data: Vec<CommodityValue>,
}

#[derive(Debug, Deserialize)]
struct CommodityValue {
    date: String,
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::RecordingHttpClient;
    use crate::data_source::SourceErrorKind;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    fn adapter(client: RecordingHttpClient) -> (AlphaVantageAdapter, Arc<RecordingHttpClient>) {
        let client = Arc::new(client);
        (AlphaVantageAdapter::new(client.clone(), "demo"), client)
    }

    #[tokio::test]
    async fn parses_global_quote() {
        let (adapter, client) = adapter(RecordingHttpClient::new().route(
            "function=GLOBAL_QUOTE",
            r#"{"Global Quote": {
                "01. symbol": "IBM", "02. open": "169.5000", "03. high": "171.2000",
                "04. low": "168.9000", "05. price": "170.8000", "06. volume": "3456789",
                "07. latest trading day": "2024-06-11", "08. previous close": "169.3200",
                "09. change": "1.4800", "10. change percent": "0.8741%"
            }}"#,
        ));

        let quote = adapter
            .quote(QuoteRequest::new(symbol("IBM"), AssetClass::Equity))
            .await
            .expect("quote parses");

        assert_eq!(quote.price, 170.8);
        assert_eq!(quote.volume, Some(3_456_789));
        assert!(quote.change_is_consistent());
        assert!(client.last_url().contains("apikey=demo"));
    }

    #[tokio::test]
    async fn empty_global_quote_means_unknown_symbol() {
        let (adapter, _) =
            adapter(RecordingHttpClient::new().route("function=GLOBAL_QUOTE", r#"{"Global Quote": {}}"#));

        let error = adapter
            .quote(QuoteRequest::new(symbol("ZZZZ"), AssetClass::Equity))
            .await
            .expect_err("unknown");

        assert_eq!(error.kind(), SourceErrorKind::NotFound);
    }

    #[tokio::test]
    async fn throttle_note_is_rate_limited() {
        let (adapter, _) = adapter(RecordingHttpClient::new().route(
            "function=GLOBAL_QUOTE",
            r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#,
        ));

        let error = adapter
            .quote(QuoteRequest::new(symbol("IBM"), AssetClass::Equity))
            .await
            .expect_err("throttled");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn forex_uses_exchange_rate_endpoint() {
        let (adapter, client) = adapter(RecordingHttpClient::new().route(
            "function=CURRENCY_EXCHANGE_RATE",
            r#"{"Realtime Currency Exchange Rate": {
                "1. From_Currency Code": "EUR", "3. To_Currency Code": "USD",
                "5. Exchange Rate": "1.08450000", "6. Last Refreshed": "2024-06-11 14:05:01"
            }}"#,
        ));

        let quote = adapter
            .quote(QuoteRequest::new(symbol("EURUSD"), AssetClass::Forex))
            .await
            .expect("rate parses");

        assert_eq!(quote.price, 1.0845);
        assert_eq!(quote.currency, "USD");
        let url = client.last_url();
        assert!(url.contains("from_currency=EUR"));
        assert!(url.contains("to_currency=USD"));
    }

    #[tokio::test]
    async fn gold_is_priced_as_xau() {
        let (adapter, client) = adapter(RecordingHttpClient::new().route(
            "from_currency=XAU",
            r#"{"Realtime Currency Exchange Rate": {"5. Exchange Rate": "2331.40"}}"#,
        ));

        let quote = adapter
            .quote(QuoteRequest::new(symbol("GC"), AssetClass::Commodity))
            .await
            .expect("gold parses");

        assert_eq!(quote.price, 2331.4);
        assert_eq!(quote.unit.as_deref(), Some("troy_ounce"));
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn oil_quote_uses_latest_two_values() {
        let (adapter, _) = adapter(RecordingHttpClient::new().route(
            "function=WTI",
            r#"{"name": "Crude Oil Prices WTI", "interval": "daily", "unit": "dollars per barrel",
                "data": [
                    {"date": "2024-06-11", "value": "78.90"},
                    {"date": "2024-06-10", "value": "."},
                    {"date": "2024-06-07", "value": "77.50"}
                ]}"#,
        ));

        let quote = adapter
            .quote(QuoteRequest::new(symbol("CL"), AssetClass::Commodity))
            .await
            .expect("oil parses");

        assert_eq!(quote.price, 78.9);
        assert_eq!(quote.previous_close, 77.5);
    }

    #[tokio::test]
    async fn exhausted_budget_skips_the_network() {
        let client = Arc::new(RecordingHttpClient::new().route(
            "function=GLOBAL_QUOTE",
            r#"{"Global Quote": {"05. price": "170.80", "08. previous close": "169.00"}}"#,
        ));
        let adapter = AlphaVantageAdapter::new(client.clone(), "demo")
            .with_budget(RequestBudget::per_minute(1));

        adapter
            .quote(QuoteRequest::new(symbol("IBM"), AssetClass::Equity))
            .await
            .expect("first call within budget");
        let error = adapter
            .quote(QuoteRequest::new(symbol("IBM"), AssetClass::Equity))
            .await
            .expect_err("budget exhausted");

        assert_eq!(error.kind(), SourceErrorKind::RateLimited);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn daily_series_is_parsed_and_windowed() {
        let today = OffsetDateTime::now_utc().date();
        let recent = today - time::Duration::days(1);
        let old = today - time::Duration::days(400);
        let body = format!(
            r#"{{"Meta Data": {{}}, "Time Series (Daily)": {{
                "{recent}": {{"1. open": "10.0", "2. high": "11.0", "3. low": "9.5", "4. close": "10.5", "5. volume": "100"}},
                "{old}": {{"1. open": "5.0", "2. high": "5.5", "3. low": "4.5", "4. close": "5.2", "5. volume": "50"}}
            }}}}"#
        );
        let (adapter, _) = adapter(RecordingHttpClient::new().route("TIME_SERIES_DAILY", &body));

        let request = HistoryRequest::new(symbol("IBM"), AssetClass::Equity, 30, Interval::OneDay)
            .expect("valid request");
        let series = adapter.history(request).await.expect("series parses");

        assert_eq!(series.len(), 1);
        assert_eq!(series.points[0].close, 10.5);
        assert_eq!(series.points[0].volume, Some(100));
    }
}
