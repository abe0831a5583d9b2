//! Per-asset-class fallback chains.
//!
//! A chain is an ordered provider list processed in a loop. Each provider is
//! called through the retry executor under a per-call timeout, its result is
//! run through the plausibility table, and the first accepted value wins.
//! Every attempt leaves an [`AttemptRecord`]; individual failures never
//! surface on their own.
//!
//! | Asset class | Chain |
//! |-------------|-------|
//! | Equity | primary → secondary → tertiary → synthesizer |
//! | Crypto | crypto aggregator → primary |
//! | Commodity | primary → tertiary |
//! | Forex | primary → tertiary |
//!
//! Providers that are not registered (missing API key) or that do not declare
//! the asset class are left out of the chain before it runs.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{AlphaVantageAdapter, CoinGeckoAdapter, FinnhubAdapter, YahooAdapter};
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::config::TickerfeedConfig;
use crate::data_source::{
    DataSource, HistoryRequest, QuoteRequest, SourceError, SourceErrorKind, SourceFuture,
};
use crate::history;
use crate::http_client::HttpClient;
use crate::retry::{with_retry, RetryConfig};
use crate::synthetic::Synthesizer;
use crate::throttling::RequestBudget;
use crate::validation::PlausibilityTable;
use crate::{
    AssetClass, FetchError, FetchErrorKind, HistoricalSeries, ProviderId, Quote, Symbol,
};

/// Tagged result of one provider attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    /// Well-formed data that failed a plausibility check.
    Rejected(String),
    /// Transport failure, timeout, malformed payload or unknown symbol.
    Unavailable(String),
    /// Not called: open circuit, exhausted rate budget or unsupported request.
    Skipped(String),
}

impl AttemptOutcome {
    /// Caller-facing classification of a failed attempt.
    pub const fn failure_kind(&self) -> Option<FetchErrorKind> {
        match self {
            Self::Accepted | Self::Skipped(_) => None,
            Self::Rejected(_) => Some(FetchErrorKind::ImplausibleData),
            Self::Unavailable(_) => Some(FetchErrorKind::ProviderUnavailable),
        }
    }

    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl Display for AttemptOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected(reason) => write!(f, "rejected ({reason})"),
            Self::Unavailable(reason) => write!(f, "unavailable ({reason})"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
        }
    }
}

/// Diagnostic record of one provider attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub provider: ProviderId,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    fn new(provider: ProviderId, outcome: AttemptOutcome, started: Instant) -> Self {
        Self {
            provider,
            outcome,
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Called with every attempt as it is recorded. Must not block.
pub type AttemptObserver = Arc<dyn Fn(&Symbol, AssetClass, &AttemptRecord) + Send + Sync>;

/// Accepted value plus the attempts that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    pub value: T,
    pub attempts: Vec<AttemptRecord>,
}

enum ChainOutcome<T> {
    Accepted(Resolved<T>),
    /// Every provider that was actually called reported the symbol as unknown.
    UnknownSymbol(Vec<AttemptRecord>),
    Exhausted(Vec<AttemptRecord>),
}

/// One upstream operation a chain can run against any source.
trait ChainCall: Send + Sync {
    type Output: Send;

    fn invoke<'a>(&self, source: &'a dyn DataSource) -> SourceFuture<'a, Self::Output>;

    fn needs_history(&self) -> bool;
}

impl ChainCall for QuoteRequest {
    type Output = Quote;

    fn invoke<'a>(&self, source: &'a dyn DataSource) -> SourceFuture<'a, Quote> {
        source.quote(self.clone())
    }

    fn needs_history(&self) -> bool {
        false
    }
}

impl ChainCall for HistoryRequest {
    type Output = HistoricalSeries;

    fn invoke<'a>(&self, source: &'a dyn DataSource) -> SourceFuture<'a, HistoricalSeries> {
        source.history(self.clone())
    }

    fn needs_history(&self) -> bool {
        true
    }
}

/// Default provider priority for an asset class, before registration and
/// capability filtering.
pub const fn default_priority(asset_class: AssetClass) -> &'static [ProviderId] {
    match asset_class {
        AssetClass::Equity => &[ProviderId::Primary, ProviderId::Secondary, ProviderId::Tertiary],
        AssetClass::Crypto => &[ProviderId::CryptoAggregator, ProviderId::Primary],
        AssetClass::Commodity | AssetClass::Forex => &[ProviderId::Primary, ProviderId::Tertiary],
    }
}

/// Source registry and fallback engine shared by every asset class.
pub struct FallbackRouter {
    sources: HashMap<ProviderId, Arc<dyn DataSource>>,
    priorities: HashMap<AssetClass, Vec<ProviderId>>,
    breakers: HashMap<ProviderId, Arc<CircuitBreaker>>,
    retry: RetryConfig,
    provider_timeout: Duration,
    plausibility: PlausibilityTable,
    synthesizer: Option<Synthesizer>,
    observer: Option<AttemptObserver>,
}

impl FallbackRouter {
    /// Router over `sources` with default policies. A later source with the
    /// same id replaces an earlier one.
    pub fn new(sources: Vec<Arc<dyn DataSource>>) -> Self {
        Self::with_config(sources, &TickerfeedConfig::default())
    }

    /// Router over `sources` with retry, timeout, circuit and plausibility
    /// policies taken from `config`.
    pub fn with_config(sources: Vec<Arc<dyn DataSource>>, config: &TickerfeedConfig) -> Self {
        let circuit = config.circuit_breaker();
        let sources: HashMap<ProviderId, Arc<dyn DataSource>> =
            sources.into_iter().map(|source| (source.id(), source)).collect();
        let breakers = breakers_for(&sources, circuit);
        let priorities = AssetClass::ALL
            .into_iter()
            .map(|class| (class, default_priority(class).to_vec()))
            .collect();

        Self {
            sources,
            priorities,
            breakers,
            retry: config.retry(),
            provider_timeout: config.provider_timeout(),
            plausibility: config.plausibility.clone(),
            synthesizer: Some(Synthesizer::new()),
            observer: None,
        }
    }

    /// Production router: real adapters over `http_client`. Keyed providers
    /// without a usable key are not registered.
    pub fn from_config(config: &TickerfeedConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let timeout = config.provider_timeout();
        let mut sources: Vec<Arc<dyn DataSource>> = vec![
            Arc::new(YahooAdapter::new(Arc::clone(&http_client)).with_timeout(timeout)),
            Arc::new(CoinGeckoAdapter::new(Arc::clone(&http_client)).with_timeout(timeout)),
        ];

        match config.finnhub_key() {
            Some(key) => sources.push(Arc::new(
                FinnhubAdapter::new(Arc::clone(&http_client), key).with_timeout(timeout),
            )),
            None => info!(provider = %ProviderId::Secondary, "no API key configured; provider disabled"),
        }

        match config.alphavantage_key() {
            Some(key) => sources.push(Arc::new(
                AlphaVantageAdapter::new(Arc::clone(&http_client), key)
                    .with_budget(RequestBudget::per_minute(config.tertiary_quota_per_minute))
                    .with_timeout(timeout),
            )),
            None => info!(provider = %ProviderId::Tertiary, "no API key configured; provider disabled"),
        }

        Self::with_config(sources, config)
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    pub fn with_plausibility(mut self, plausibility: PlausibilityTable) -> Self {
        self.plausibility = plausibility;
        self
    }

    /// Replaces every breaker, discarding accumulated failure counts.
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breakers = breakers_for(&self.sources, config);
        self
    }

    /// Overrides the provider priority of one asset class.
    pub fn with_priority(mut self, asset_class: AssetClass, providers: Vec<ProviderId>) -> Self {
        self.priorities.insert(asset_class, providers);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Equity exhaustion then surfaces as an error for every symbol.
    pub fn without_synthesis(mut self) -> Self {
        self.synthesizer = None;
        self
    }

    pub fn with_observer(mut self, observer: AttemptObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Providers a quote request for `asset_class` would try, in order.
    pub fn chain(&self, asset_class: AssetClass) -> Vec<ProviderId> {
        self.sources_for(asset_class, false)
            .iter()
            .map(|source| source.id())
            .collect()
    }

    /// Providers a history request for `asset_class` would try, in order.
    pub fn history_chain(&self, asset_class: AssetClass) -> Vec<ProviderId> {
        self.sources_for(asset_class, true)
            .iter()
            .map(|source| source.id())
            .collect()
    }

    pub fn circuit_breaker(&self, provider: ProviderId) -> Option<&CircuitBreaker> {
        self.breakers.get(&provider).map(Arc::as_ref)
    }

    fn sources_for(&self, asset_class: AssetClass, history: bool) -> Vec<Arc<dyn DataSource>> {
        let Some(priority) = self.priorities.get(&asset_class) else {
            return Vec::new();
        };

        priority
            .iter()
            .filter_map(|provider| self.sources.get(provider))
            .filter(|source| {
                let capabilities = source.capabilities();
                if history {
                    capabilities.supports_history(asset_class)
                } else {
                    capabilities.supports(asset_class)
                }
            })
            .cloned()
            .collect()
    }

    /// Resolves a current quote. Equity exhaustion falls through to the
    /// synthesizer. When every provider that was called reports the symbol
    /// as unknown the result is `UnknownSymbol`, without synthesis.
    pub async fn resolve_quote(
        &self,
        symbol: &Symbol,
        asset_class: AssetClass,
    ) -> Result<Resolved<Quote>, FetchError> {
        let request = QuoteRequest::new(symbol.clone(), asset_class);
        let plausibility = &self.plausibility;
        let outcome = self
            .run_chain(symbol, asset_class, &request, |quote: Quote| {
                plausibility.check_quote(&quote)?;
                Ok(quote)
            })
            .await;

        match outcome {
            ChainOutcome::Accepted(resolved) => Ok(resolved),
            ChainOutcome::UnknownSymbol(attempts) => {
                Err(unknown_symbol(symbol, asset_class, attempts))
            }
            ChainOutcome::Exhausted(mut attempts) => {
                if asset_class == AssetClass::Equity {
                    if let Some(quote) = self.synthesize(symbol, &mut attempts) {
                        return Ok(Resolved {
                            value: quote,
                            attempts,
                        });
                    }
                }
                let note = (asset_class == AssetClass::Equity)
                    .then(|| self.synthesis_note(symbol))
                    .flatten();
                Err(exhausted(symbol, asset_class, attempts, note))
            }
        }
    }

    /// Resolves a cleaned historical series. There is no synthesis for
    /// history.
    pub async fn resolve_history(
        &self,
        request: &HistoryRequest,
    ) -> Result<Resolved<HistoricalSeries>, FetchError> {
        let plausibility = &self.plausibility;
        let outcome = self
            .run_chain(
                &request.symbol,
                request.asset_class,
                request,
                |series: HistoricalSeries| {
                    let (cleaned, _) = history::clean(series);
                    plausibility.check_series(&cleaned)?;
                    Ok(cleaned)
                },
            )
            .await;

        match outcome {
            ChainOutcome::Accepted(resolved) => Ok(resolved),
            ChainOutcome::UnknownSymbol(attempts) => Err(unknown_symbol(
                &request.symbol,
                request.asset_class,
                attempts,
            )),
            ChainOutcome::Exhausted(attempts) => {
                Err(exhausted(&request.symbol, request.asset_class, attempts, None))
            }
        }
    }

    async fn run_chain<R, A>(
        &self,
        symbol: &Symbol,
        asset_class: AssetClass,
        request: &R,
        mut accept: A,
    ) -> ChainOutcome<R::Output>
    where
        R: ChainCall,
        A: FnMut(R::Output) -> Result<R::Output, String> + Send,
    {
        let chain = self.sources_for(asset_class, request.needs_history());
        if chain.is_empty() {
            warn!(%symbol, %asset_class, "no provider available for asset class");
        }

        let mut attempts = Vec::with_capacity(chain.len() + 1);
        let mut attempted = 0_usize;
        let mut not_found = 0_usize;
        for source in chain {
            let provider = source.id();
            let started = Instant::now();
            let breaker = self.breakers.get(&provider);

            if breaker.is_some_and(|breaker| !breaker.allow_request()) {
                let outcome = AttemptOutcome::Skipped(String::from("circuit open"));
                self.record(&mut attempts, symbol, asset_class, AttemptRecord::new(provider, outcome, started));
                continue;
            }

            let outcome = match self.call(source.as_ref(), request).await {
                Ok(value) => {
                    attempted += 1;
                    if let Some(breaker) = breaker {
                        breaker.record_success();
                    }
                    match accept(value) {
                        Ok(value) => {
                            let record = AttemptRecord::new(provider, AttemptOutcome::Accepted, started);
                            self.record(&mut attempts, symbol, asset_class, record);
                            return ChainOutcome::Accepted(Resolved { value, attempts });
                        }
                        Err(reason) => AttemptOutcome::Rejected(reason),
                    }
                }
                Err(error) => match error.kind() {
                    SourceErrorKind::NotFound => {
                        attempted += 1;
                        not_found += 1;
                        if let Some(breaker) = breaker {
                            breaker.record_success();
                        }
                        AttemptOutcome::Unavailable(error.to_string())
                    }
                    SourceErrorKind::RateLimited | SourceErrorKind::Unsupported => {
                        AttemptOutcome::Skipped(error.to_string())
                    }
                    SourceErrorKind::Implausible => {
                        attempted += 1;
                        AttemptOutcome::Rejected(error.to_string())
                    }
                    SourceErrorKind::Unavailable
                    | SourceErrorKind::Timeout
                    | SourceErrorKind::Malformed => {
                        attempted += 1;
                        if let Some(breaker) = breaker {
                            breaker.record_failure();
                        }
                        AttemptOutcome::Unavailable(error.to_string())
                    }
                },
            };

            self.record(&mut attempts, symbol, asset_class, AttemptRecord::new(provider, outcome, started));
        }

        if not_found > 0 && not_found == attempted {
            ChainOutcome::UnknownSymbol(attempts)
        } else {
            ChainOutcome::Exhausted(attempts)
        }
    }

    /// One provider call: retried on retryable errors, each try bounded by
    /// the provider timeout.
    async fn call<R: ChainCall>(
        &self,
        source: &dyn DataSource,
        request: &R,
    ) -> Result<R::Output, SourceError> {
        let limit = self.provider_timeout;
        let provider = source.id();

        with_retry(self.retry, |_attempt| {
            let call = request.invoke(source);
            async move {
                match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::timeout(format!(
                        "{provider} did not answer within {}ms",
                        limit.as_millis()
                    ))),
                }
            }
        })
        .await
    }

    fn synthesize(&self, symbol: &Symbol, attempts: &mut Vec<AttemptRecord>) -> Option<Quote> {
        let synthesizer = self.synthesizer.as_ref()?;
        let started = Instant::now();
        let quote = synthesizer.synthesize(symbol)?;
        let record = AttemptRecord::new(ProviderId::Synthetic, AttemptOutcome::Accepted, started);
        self.record(attempts, symbol, AssetClass::Equity, record);
        Some(quote)
    }

    /// Why an exhausted equity chain was not synthesized.
    fn synthesis_note(&self, symbol: &Symbol) -> Option<String> {
        if self.synthesizer.is_none() {
            Some(String::from("synthesis is disabled"))
        } else if !Synthesizer::supports(symbol) {
            Some(format!("{symbol} has no reference price for synthesis"))
        } else {
            None
        }
    }

    fn record(
        &self,
        attempts: &mut Vec<AttemptRecord>,
        symbol: &Symbol,
        asset_class: AssetClass,
        record: AttemptRecord,
    ) {
        let provider = record.provider;
        let elapsed_ms = record.elapsed_ms;
        match &record.outcome {
            AttemptOutcome::Accepted => {
                info!(%symbol, %asset_class, %provider, elapsed_ms, "provider accepted")
            }
            AttemptOutcome::Skipped(reason) => {
                debug!(%symbol, %asset_class, %provider, %reason, "provider skipped")
            }
            AttemptOutcome::Rejected(reason) | AttemptOutcome::Unavailable(reason) => {
                let kind = record.outcome.failure_kind().map(FetchErrorKind::as_str);
                warn!(%symbol, %asset_class, %provider, elapsed_ms, ?kind, %reason, "provider attempt failed")
            }
        }

        if let Some(observer) = &self.observer {
            observer(symbol, asset_class, &record);
        }
        attempts.push(record);
    }
}

fn breakers_for(
    sources: &HashMap<ProviderId, Arc<dyn DataSource>>,
    config: CircuitBreakerConfig,
) -> HashMap<ProviderId, Arc<CircuitBreaker>> {
    sources
        .keys()
        .map(|provider| (*provider, Arc::new(CircuitBreaker::new(*provider, config))))
        .collect()
}

fn unknown_symbol(
    symbol: &Symbol,
    asset_class: AssetClass,
    attempts: Vec<AttemptRecord>,
) -> FetchError {
    let providers = attempts
        .iter()
        .filter(|attempt| attempt.outcome.failure_kind().is_some())
        .map(|attempt| attempt.provider.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    FetchError::new(
        FetchErrorKind::UnknownSymbol,
        symbol,
        asset_class,
        format!("no provider recognizes the symbol (asked: {providers})"),
    )
    .with_attempts(attempts)
}

fn exhausted(
    symbol: &Symbol,
    asset_class: AssetClass,
    attempts: Vec<AttemptRecord>,
    note: Option<String>,
) -> FetchError {
    let reason = if attempts.is_empty() {
        format!("no provider configured for {asset_class}")
    } else {
        let summary = attempts
            .iter()
            .map(|attempt| format!("{}: {}", attempt.provider, attempt.outcome))
            .collect::<Vec<_>>()
            .join("; ");
        match note {
            Some(note) => format!("all providers failed and {note} ({summary})"),
            None => format!("all providers failed ({summary})"),
        }
    };

    FetchError::new(FetchErrorKind::AllProvidersExhausted, symbol, asset_class, reason)
        .with_attempts(attempts)
}
