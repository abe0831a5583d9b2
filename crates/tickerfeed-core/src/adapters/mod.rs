mod alphavantage;
mod coingecko;
mod finnhub;
mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use finnhub::FinnhubAdapter;
pub use yahoo::YahooAdapter;

use time::{Duration, OffsetDateTime};

use crate::data_source::{status_error, SourceError};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::{AssetClass, ProviderId, Quote};

/// Executes `request` and returns the response when the status is 2xx or
/// one of `passthrough`; adapters inspect passthrough statuses themselves.
pub(crate) async fn fetch(
    http_client: &dyn HttpClient,
    source: ProviderId,
    request: HttpRequest,
    passthrough: &[u16],
) -> Result<HttpResponse, SourceError> {
    let response = http_client.execute(request).await?;
    if response.is_success() || passthrough.contains(&response.status) {
        Ok(response)
    } else {
        Err(status_error(source, response.status))
    }
}

/// Trading unit reported for commodity quotes.
pub(crate) fn commodity_unit(symbol: &str) -> Option<&'static str> {
    match symbol {
        "GC" | "SI" | "PL" | "PA" => Some("troy_ounce"),
        "CL" | "BZ" => Some("barrel"),
        "NG" => Some("mmbtu"),
        "HG" | "KC" | "SB" | "CT" => Some("pound"),
        "HO" | "RB" => Some("gallon"),
        "ZC" | "ZW" | "ZS" => Some("bushel"),
        _ => None,
    }
}

/// Applies class-specific presentation fields every adapter reports the same way.
pub(crate) fn finish_quote(quote: Quote) -> Quote {
    match quote.asset_class {
        AssetClass::Commodity => match commodity_unit(quote.symbol.as_str()) {
            Some(unit) => quote.with_unit(unit),
            None => quote,
        },
        AssetClass::Forex => {
            let counter = quote
                .symbol
                .as_str()
                .get(3..6)
                .map(str::to_owned)
                .unwrap_or_else(|| String::from("USD"));
            quote.with_currency(counter)
        }
        AssetClass::Equity | AssetClass::Crypto => quote,
    }
}

/// Unix-second window covering the last `days` calendar days.
pub(crate) fn history_window(days: u32) -> (i64, i64) {
    let end = OffsetDateTime::now_utc();
    let start = end - Duration::days(i64::from(days));
    (start.unix_timestamp(), end.unix_timestamp())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use crate::http_client::{HttpClient, HttpError, HttpRequest, HttpResponse};

    /// Returns canned responses keyed by URL substring and records every request.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingHttpClient {
        routes: Vec<(String, Result<HttpResponse, HttpError>)>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn route(mut self, url_fragment: &str, body: &str) -> Self {
            self.routes
                .push((url_fragment.to_owned(), Ok(HttpResponse::ok_json(body))));
            self
        }

        pub(crate) fn route_status(mut self, url_fragment: &str, status: u16, body: &str) -> Self {
            self.routes.push((
                url_fragment.to_owned(),
                Ok(HttpResponse::with_status(status, body)),
            ));
            self
        }

        pub(crate) fn route_error(mut self, url_fragment: &str, error: HttpError) -> Self {
            self.routes.push((url_fragment.to_owned(), Err(error)));
            self
        }

        pub(crate) fn requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }

        pub(crate) fn last_url(&self) -> String {
            self.requests()
                .last()
                .map(|request| request.url.clone())
                .unwrap_or_default()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            let response = self
                .routes
                .iter()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .map(|(_, response)| response.clone())
                .unwrap_or_else(|| Ok(HttpResponse::with_status(404, "")));
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            Box::pin(async move { response })
        }
    }
}
