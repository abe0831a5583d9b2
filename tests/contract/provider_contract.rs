//! Adapter contract: every provider turns its own payload into the same
//! normalized `Quote`, or fails with a classified `SourceError`.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tickerfeed_core::{
    AlphaVantageAdapter, AssetClass, CoinGeckoAdapter, DataSource, FinnhubAdapter, HistoryRequest,
    HttpClient, HttpError, HttpRequest, HttpResponse, Interval, ProviderId, QuoteRequest,
    SourceErrorKind, Symbol, YahooAdapter,
};

/// Answers every request with one canned body and counts requests.
struct CannedHttpClient {
    status: u16,
    body: String,
    urls: Mutex<Vec<String>>,
}

impl CannedHttpClient {
    fn new(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            status,
            body: body.to_owned(),
            urls: Mutex::new(Vec::new()),
        })
    }

    fn request_count(&self) -> usize {
        self.urls.lock().expect("url lock").len()
    }
}

impl HttpClient for CannedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.urls.lock().expect("url lock").push(request.url);
        let response = HttpResponse::with_status(self.status, self.body.clone());
        Box::pin(async move { Ok(response) })
    }
}

struct ProviderCase {
    id: ProviderId,
    source: Arc<dyn DataSource>,
    client: Arc<CannedHttpClient>,
    symbol: &'static str,
    asset_class: AssetClass,
    unsupported: Option<AssetClass>,
}

fn provider_cases() -> Vec<ProviderCase> {
    let yahoo = CannedHttpClient::new(
        200,
        r#"{"chart":{"result":[{"meta":{"currency":"USD","regularMarketPrice":195.5,
            "chartPreviousClose":190.0,"regularMarketDayHigh":196.2,"regularMarketDayLow":189.8,
            "regularMarketVolume":51234567},"timestamp":[1718026200],
            "indicators":{"quote":[{"open":[190.4],"high":[196.2],"low":[189.8],"close":[195.5],
            "volume":[51234567]}]}}],"error":null}}"#,
    );
    let finnhub = CannedHttpClient::new(
        200,
        r#"{"c":412.3,"h":414.0,"l":409.1,"o":410.2,"pc":410.0,"t":1718049600}"#,
    );
    let alphavantage = CannedHttpClient::new(
        200,
        r#"{"Global Quote":{"01. symbol":"IBM","02. open":"169.50","03. high":"171.20",
            "04. low":"168.90","05. price":"170.80","06. volume":"3456789",
            "08. previous close":"169.32"}}"#,
    );
    let coingecko = CannedHttpClient::new(
        200,
        r#"[{"id":"ethereum","current_price":3520.0,"high_24h":3600.0,"low_24h":3450.0,
            "total_volume":15000000000.0,"price_change_24h":-40.0}]"#,
    );

    vec![
        ProviderCase {
            id: ProviderId::Primary,
            source: Arc::new(YahooAdapter::new(yahoo.clone())),
            client: yahoo,
            symbol: "AAPL",
            asset_class: AssetClass::Equity,
            unsupported: None,
        },
        ProviderCase {
            id: ProviderId::Secondary,
            source: Arc::new(FinnhubAdapter::new(finnhub.clone(), "contract-key")),
            client: finnhub,
            symbol: "MSFT",
            asset_class: AssetClass::Equity,
            unsupported: Some(AssetClass::Forex),
        },
        ProviderCase {
            id: ProviderId::Tertiary,
            source: Arc::new(AlphaVantageAdapter::new(alphavantage.clone(), "contract-key")),
            client: alphavantage,
            symbol: "IBM",
            asset_class: AssetClass::Equity,
            unsupported: Some(AssetClass::Crypto),
        },
        ProviderCase {
            id: ProviderId::CryptoAggregator,
            source: Arc::new(CoinGeckoAdapter::new(coingecko.clone())),
            client: coingecko,
            symbol: "ETH",
            asset_class: AssetClass::Crypto,
            unsupported: Some(AssetClass::Equity),
        },
    ]
}

#[tokio::test]
async fn quote_is_normalized_for_all_providers() {
    for case in provider_cases() {
        let symbol = Symbol::parse(case.symbol).expect("valid symbol");

        let quote = case
            .source
            .quote(QuoteRequest::new(symbol.clone(), case.asset_class))
            .await
            .unwrap_or_else(|error| panic!("provider '{}' quote failed: {error}", case.id));

        assert_eq!(case.source.id(), case.id, "provider '{}': id", case.id);
        assert_eq!(quote.symbol, symbol, "provider '{}': symbol", case.id);
        assert_eq!(quote.asset_class, case.asset_class, "provider '{}': class", case.id);
        assert_eq!(quote.source, case.id, "provider '{}': source", case.id);
        assert!(quote.price > 0.0, "provider '{}': price must be positive", case.id);
        assert!(!quote.simulated, "provider '{}': never simulated", case.id);
        assert!(
            quote.change_is_consistent(),
            "provider '{}': change_percent must follow change / previous_close",
            case.id
        );
        assert_eq!(case.client.request_count(), 1, "provider '{}': one request", case.id);
    }
}

#[tokio::test]
async fn declared_capabilities_cover_the_tested_class() {
    for case in provider_cases() {
        let capabilities = case.source.capabilities();

        assert!(
            capabilities.supports(case.asset_class),
            "provider '{}' must declare {}",
            case.id,
            case.asset_class
        );
        if let Some(unsupported) = case.unsupported {
            assert!(
                !capabilities.supports(unsupported),
                "provider '{}' must not declare {unsupported}",
                case.id
            );
        }
    }
}

#[tokio::test]
async fn undeclared_classes_fail_as_unsupported_without_io() {
    for case in provider_cases() {
        let Some(unsupported) = case.unsupported else {
            continue;
        };
        let symbol = Symbol::parse("EURUSD").expect("valid symbol");

        let error = case
            .source
            .quote(QuoteRequest::new(symbol, unsupported))
            .await
            .expect_err("undeclared class must fail");

        assert_eq!(error.kind(), SourceErrorKind::Unsupported, "provider '{}'", case.id);
        assert!(!error.retryable(), "provider '{}'", case.id);
        assert_eq!(case.client.request_count(), 0, "provider '{}': no request", case.id);
    }
}

#[tokio::test]
async fn server_errors_are_retryable_unavailable() {
    let cases: Vec<(ProviderId, Arc<dyn DataSource>, &str, AssetClass)> = vec![
        (
            ProviderId::Primary,
            Arc::new(YahooAdapter::new(CannedHttpClient::new(503, ""))),
            "AAPL",
            AssetClass::Equity,
        ),
        (
            ProviderId::Secondary,
            Arc::new(FinnhubAdapter::new(CannedHttpClient::new(502, ""), "k")),
            "MSFT",
            AssetClass::Equity,
        ),
        (
            ProviderId::Tertiary,
            Arc::new(AlphaVantageAdapter::new(CannedHttpClient::new(500, ""), "k")),
            "IBM",
            AssetClass::Equity,
        ),
        (
            ProviderId::CryptoAggregator,
            Arc::new(CoinGeckoAdapter::new(CannedHttpClient::new(503, ""))),
            "BTC",
            AssetClass::Crypto,
        ),
    ];

    for (id, source, raw, asset_class) in cases {
        let symbol = Symbol::parse(raw).expect("valid symbol");

        let error = source
            .quote(QuoteRequest::new(symbol, asset_class))
            .await
            .expect_err("5xx must fail");

        assert_eq!(error.kind(), SourceErrorKind::Unavailable, "provider '{id}'");
        assert!(error.retryable(), "provider '{id}'");
    }
}

#[tokio::test]
async fn rate_limit_status_is_classified() {
    let source = FinnhubAdapter::new(CannedHttpClient::new(429, "{}"), "k");
    let symbol = Symbol::parse("MSFT").expect("valid symbol");

    let error = source
        .quote(QuoteRequest::new(symbol, AssetClass::Equity))
        .await
        .expect_err("429 must fail");

    assert_eq!(error.kind(), SourceErrorKind::RateLimited);
    assert!(!error.retryable());
}

#[tokio::test]
async fn history_points_are_ascending() {
    let client = CannedHttpClient::new(
        200,
        r#"{"s":"ok","t":[1718064000,1717977600],"o":[192.0,190.0],"h":[194.0,193.0],
            "l":[191.0,189.0],"c":[193.7,192.5],"v":[2000,1000]}"#,
    );
    let source = FinnhubAdapter::new(client, "k");
    let request = HistoryRequest::new(
        Symbol::parse("AAPL").expect("valid symbol"),
        AssetClass::Equity,
        7,
        Interval::OneDay,
    )
    .expect("valid request");

    let series = source.history(request).await.expect("candles parse");

    assert_eq!(series.len(), 2);
    assert!(series
        .points
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp));
    assert_eq!(series.latest_close(), Some(193.7));
}
