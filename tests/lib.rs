//! Scripted in-memory sources shared by the behavior tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tickerfeed_core::{
    AssetClass, CapabilitySet, DataSource, HistoricalSeries, HistoryRequest, MarketDataService,
    PricePoint, ProviderId, Quote, QuotePrices, QuoteRequest, SourceError, SourceFuture,
    TickerfeedConfig, UtcDateTime,
};

/// 2024-06-10T00:00:00Z
pub const DAY_ZERO: i64 = 1_717_977_600;

#[derive(Clone)]
enum QuoteReply {
    Price { price: f64, previous_close: f64 },
    Fail(SourceError),
}

pub struct ScriptedSource {
    id: ProviderId,
    classes: Vec<AssetClass>,
    reply: QuoteReply,
    /// Errors returned before `reply` is used.
    leading_failures: Vec<SourceError>,
    history: Option<Vec<f64>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn pricing(id: ProviderId, classes: &[AssetClass], price: f64) -> Self {
        Self::with_reply(
            id,
            classes,
            QuoteReply::Price {
                price,
                previous_close: price * 0.98,
            },
        )
    }

    pub fn failing(id: ProviderId, classes: &[AssetClass], error: SourceError) -> Self {
        Self::with_reply(id, classes, QuoteReply::Fail(error))
    }

    fn with_reply(id: ProviderId, classes: &[AssetClass], reply: QuoteReply) -> Self {
        Self {
            id,
            classes: classes.to_vec(),
            reply,
            leading_failures: Vec::new(),
            history: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_previous_close(mut self, previous_close: f64) -> Self {
        if let QuoteReply::Price { price, .. } = self.reply {
            self.reply = QuoteReply::Price {
                price,
                previous_close,
            };
        }
        self
    }

    /// Fails with `error` on the first call only, quote or history.
    pub fn failing_first(mut self, error: SourceError) -> Self {
        self.leading_failures.push(error);
        self
    }

    /// Daily closes starting at [`DAY_ZERO`]; non-finite or zero values are gaps.
    pub fn with_history(mut self, closes: Vec<f64>) -> Self {
        self.history = Some(closes);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer_quote(&self, req: QuoteRequest) -> Result<Quote, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.leading_failures.get(call) {
            return Err(error.clone());
        }

        match &self.reply {
            QuoteReply::Price {
                price,
                previous_close,
            } => Ok(Quote::new(
                req.symbol,
                req.asset_class,
                QuotePrices::from_last(*price, *previous_close),
                self.id,
            )?),
            QuoteReply::Fail(error) => Err(error.clone()),
        }
    }

    async fn answer_history(&self, req: HistoryRequest) -> Result<HistoricalSeries, SourceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = self.leading_failures.get(call) {
            return Err(error.clone());
        }
        let Some(closes) = &self.history else {
            return match &self.reply {
                QuoteReply::Fail(error) => Err(error.clone()),
                QuoteReply::Price { .. } => Err(SourceError::unavailable("no scripted history")),
            };
        };

        let points = closes
            .iter()
            .enumerate()
            .map(|(day, close)| {
                let timestamp = UtcDateTime::from_unix_timestamp(DAY_ZERO + day as i64 * 86_400)
                    .expect("valid timestamp");
                PricePoint::close_only(timestamp, *close)
            })
            .collect();

        Ok(HistoricalSeries::new(req.symbol, req.asset_class, req.interval, self.id, points))
    }
}

impl DataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::new(&self.classes, self.history.is_some())
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        Box::pin(self.answer_quote(req))
    }

    fn history<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, HistoricalSeries> {
        Box::pin(self.answer_history(req))
    }
}

/// Defaults with a single attempt per provider, so failing sources do not back off.
pub fn config() -> TickerfeedConfig {
    TickerfeedConfig {
        retry_max_attempts: 1,
        ..TickerfeedConfig::default()
    }
}

pub fn service(sources: &[Arc<ScriptedSource>]) -> MarketDataService {
    service_with(sources, &config())
}

pub fn service_with(sources: &[Arc<ScriptedSource>], config: &TickerfeedConfig) -> MarketDataService {
    let sources = sources
        .iter()
        .map(|source| Arc::clone(source) as Arc<dyn DataSource>)
        .collect();
    MarketDataService::with_sources(sources, config)
}
