//! Fetcher facade: the public entry point for quotes and candle history.
//!
//! Every adapter call goes through the same path: wait on the provider's
//! [`RateGate`], run the call under the configured timeout, and retry
//! rate-limited or transient failures with backoff. Calls issued by one
//! fetcher are strictly sequential.
//!
//! ```rust,ignore
//! use coinfeed_core::{Fetcher, FetcherConfig, ProviderId, Symbol, Timeframe};
//!
//! let fetcher = Fetcher::new(FetcherConfig::for_provider(ProviderId::ExchangeRest));
//! let symbol = Symbol::parse("BTC/USDT")?;
//! let candles = fetcher
//!     .historical_candles(&symbol, Timeframe::OneHour, 2500, None)
//!     .await?;
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::{debug, info};

use crate::adapters::{
    AggregatorAdapter, ExchangeConnector, ExchangeRestAdapter, GenericExchangeAdapter,
};
use crate::config::FetcherConfig;
use crate::data_source::{
    CandlesRequest, CapabilitySet, DataSource, Endpoint, QuoteRequest, SourceError,
    SourceErrorKind, SourceFuture,
};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::pagination::{CandleMerger, WindowPlan};
use crate::retry::{retry_with_backoff, RetryFailure};
use crate::throttling::{RateGate, ThrottleRegistry};
use crate::{Candle, CandleSeries, ProviderId, Quote, Symbol, Timeframe, UtcDateTime};

/// Facade-level failure classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Malformed input, rejected before or by the provider.
    InvalidRequest,
    NotFound,
    Unsupported,
    /// Retry budget spent on rate-limited or transient failures.
    Exhausted,
}

impl FetchErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::Exhausted => "exhausted",
        }
    }

    fn from_final(kind: SourceErrorKind) -> Self {
        match kind {
            SourceErrorKind::RateLimited | SourceErrorKind::Transient => Self::Exhausted,
            SourceErrorKind::NotFound => Self::NotFound,
            SourceErrorKind::Unsupported => Self::Unsupported,
            SourceErrorKind::InvalidRequest => Self::InvalidRequest,
        }
    }
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned by [`Fetcher`] operations.
///
/// Carries the provider and, where known, the symbol and timeframe so callers
/// can tell an unknown symbol from a provider outage.
#[derive(Debug, Clone)]
pub struct FetchError {
    kind: FetchErrorKind,
    provider: ProviderId,
    symbol: Option<Symbol>,
    timeframe: Option<Timeframe>,
    attempts: u32,
    last_error: Option<SourceError>,
    message: String,
}

impl FetchError {
    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    pub const fn timeframe(&self) -> Option<Timeframe> {
        self.timeframe
    }

    /// Adapter calls made before giving up. Zero when rejected up front.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&SourceError> {
        self.last_error.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            FetchErrorKind::InvalidRequest => "fetch.invalid_request",
            FetchErrorKind::NotFound => "fetch.not_found",
            FetchErrorKind::Unsupported => "fetch.unsupported",
            FetchErrorKind::Exhausted => "fetch.exhausted",
        }
    }
}

impl Display for FetchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}; provider {}", self.message, self.code(), self.provider)?;
        if let Some(symbol) = &self.symbol {
            write!(f, ", symbol {symbol}")?;
        }
        if let Some(timeframe) = self.timeframe {
            write!(f, ", timeframe {timeframe}")?;
        }
        if self.attempts > 0 {
            write!(f, ", {} attempt(s)", self.attempts)?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.last_error
            .as_ref()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

/// What a call is about; stamped onto every error it produces.
#[derive(Debug, Clone)]
struct CallScope {
    provider: ProviderId,
    endpoint: Endpoint,
    symbol: Symbol,
    timeframe: Option<Timeframe>,
}

impl CallScope {
    fn error(&self, kind: FetchErrorKind, message: impl Into<String>) -> FetchError {
        FetchError {
            kind,
            provider: self.provider,
            symbol: Some(self.symbol.clone()),
            timeframe: self.timeframe,
            attempts: 0,
            last_error: None,
            message: message.into(),
        }
    }

    fn rejected(&self, error: SourceError) -> FetchError {
        let mut fetch_error =
            self.error(FetchErrorKind::from_final(error.kind()), error.message());
        fetch_error.last_error = Some(error);
        fetch_error
    }

    fn failed(&self, failure: RetryFailure) -> FetchError {
        let message = if failure.exhausted() {
            format!(
                "{} retries exhausted, last error: {}",
                self.endpoint,
                failure.error.message()
            )
        } else {
            failure.error.message().to_owned()
        };
        let mut fetch_error = self.error(FetchErrorKind::from_final(failure.error.kind()), message);
        fetch_error.attempts = failure.attempts;
        fetch_error.last_error = Some(failure.error);
        fetch_error
    }
}

/// Per-timeframe outcome of [`Fetcher::multi_timeframe_candles`].
#[derive(Debug, Clone)]
pub struct MultiTimeframeCandles {
    symbol: Symbol,
    results: BTreeMap<Timeframe, Result<Vec<Candle>, FetchError>>,
}

impl MultiTimeframeCandles {
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn get(&self, timeframe: Timeframe) -> Option<Result<&[Candle], &FetchError>> {
        self.results
            .get(&timeframe)
            .map(|result| result.as_ref().map(Vec::as_slice))
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (Timeframe, &[Candle])> + '_ {
        self.results
            .iter()
            .filter_map(|(timeframe, result)| match result {
                Ok(candles) => Some((*timeframe, candles.as_slice())),
                Err(_) => None,
            })
    }

    pub fn failed(&self) -> impl Iterator<Item = (Timeframe, &FetchError)> + '_ {
        self.results
            .iter()
            .filter_map(|(timeframe, result)| match result {
                Ok(_) => None,
                Err(error) => Some((*timeframe, error)),
            })
    }

    /// True when every requested timeframe succeeded.
    pub fn is_complete(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Timeframe, &Result<Vec<Candle>, FetchError>)> {
        self.results.iter()
    }

    pub fn into_results(self) -> BTreeMap<Timeframe, Result<Vec<Candle>, FetchError>> {
        self.results
    }
}

/// Builder for [`Fetcher`].
///
/// Without an injected source, the adapter for `config.provider` is created
/// with the configured (or default reqwest) HTTP client.
pub struct FetcherBuilder {
    config: FetcherConfig,
    source: Option<Arc<dyn DataSource>>,
    http_client: Option<Arc<dyn HttpClient>>,
    connector: Option<Arc<dyn ExchangeConnector>>,
    registry: Option<ThrottleRegistry>,
    aggregator_api_key: Option<String>,
}

impl FetcherBuilder {
    pub fn new(config: FetcherConfig) -> Self {
        Self {
            config,
            source: None,
            http_client: None,
            connector: None,
            registry: None,
            aggregator_api_key: None,
        }
    }

    /// Uses `source` instead of the built-in adapter; its id replaces `config.provider`.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Connector backing the generic-exchange adapter.
    pub fn with_connector(mut self, connector: Arc<dyn ExchangeConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Shares call spacing with other fetchers built from the same registry.
    pub fn with_throttle_registry(mut self, registry: ThrottleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_aggregator_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.aggregator_api_key = Some(api_key.into());
        self
    }

    pub fn build(self) -> Fetcher {
        let Self {
            mut config,
            source,
            http_client,
            connector,
            registry,
            aggregator_api_key,
        } = self;

        let source = match source {
            Some(source) => source,
            None => {
                let http_client =
                    http_client.unwrap_or_else(|| Arc::new(ReqwestHttpClient::new()));
                default_source(config.provider, http_client, connector, aggregator_api_key)
            }
        };

        if source.id() != config.provider {
            debug!(
                configured = %config.provider,
                injected = %source.id(),
                "injected source overrides configured provider"
            );
            config.provider = source.id();
        }

        let gate = match registry {
            Some(registry) => registry.gate_for(config.provider, config.min_call_spacing),
            None => RateGate::new(config.min_call_spacing),
        };

        Fetcher {
            source,
            config,
            gate,
        }
    }
}

fn default_source(
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    connector: Option<Arc<dyn ExchangeConnector>>,
    aggregator_api_key: Option<String>,
) -> Arc<dyn DataSource> {
    match provider {
        ProviderId::ExchangeRest => Arc::new(ExchangeRestAdapter::with_http_client(http_client)),
        ProviderId::Aggregator => {
            let adapter = AggregatorAdapter::with_http_client(http_client);
            Arc::new(match aggregator_api_key {
                Some(key) => adapter.with_api_key(key),
                None => adapter,
            })
        }
        ProviderId::GenericExchange => {
            let connector = connector.unwrap_or_else(|| {
                Arc::new(crate::adapters::BybitConnector::with_http_client(
                    http_client,
                ))
            });
            Arc::new(GenericExchangeAdapter::with_connector(connector))
        }
    }
}

/// Provider-neutral market-data facade.
pub struct Fetcher {
    source: Arc<dyn DataSource>,
    config: FetcherConfig,
    gate: RateGate,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("provider", &self.source.id())
            .field("config", &self.config)
            .field("gate", &self.gate)
            .finish()
    }
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        FetcherBuilder::new(config).build()
    }

    pub fn builder(config: FetcherConfig) -> FetcherBuilder {
        FetcherBuilder::new(config)
    }

    pub fn provider(&self) -> ProviderId {
        self.source.id()
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.source.capabilities()
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Effective page ceiling `P`; zero when the provider has no candles.
    pub fn page_size(&self) -> usize {
        self.config.effective_page_size(self.source.page_limit())
    }

    /// Current quote for one symbol.
    ///
    /// # Errors
    ///
    /// [`FetchErrorKind::Unsupported`] without contacting the provider when it
    /// offers no quotes; otherwise the classified adapter failure.
    pub async fn realtime_price(&self, symbol: &Symbol) -> Result<Quote, FetchError> {
        let scope = self.scope(Endpoint::Quote, symbol, None);
        self.require(&scope)?;

        let source = self.source.as_ref();
        self.call(&scope, move || source.quote(QuoteRequest::new(symbol.clone())))
            .await
    }

    /// Up to `count` candles ending at `end_time` (default: now), strictly
    /// ascending by open time with no duplicates.
    ///
    /// Fewer than `count` candles is not an error: the provider ran out of
    /// history. Requests above the page ceiling are split into windows fetched
    /// newest first; an empty window ends the walk.
    pub async fn historical_candles(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        count: usize,
        end_time: Option<UtcDateTime>,
    ) -> Result<Vec<Candle>, FetchError> {
        let scope = self.scope(Endpoint::Candles, symbol, Some(timeframe));
        if count == 0 {
            return Err(scope.error(
                FetchErrorKind::InvalidRequest,
                "candle count must be greater than zero",
            ));
        }
        self.require(&scope)?;

        let page_size = self.page_size();
        if page_size == 0 {
            return Err(scope.rejected(SourceError::unsupported(
                Endpoint::Candles,
                self.provider(),
            )));
        }

        if count <= page_size {
            self.single_page(&scope, timeframe, count, end_time).await
        } else {
            self.paginate(&scope, timeframe, count, page_size, end_time)
                .await
        }
    }

    /// [`historical_candles`](Self::historical_candles) wrapped in a [`CandleSeries`].
    pub async fn historical_series(
        &self,
        symbol: &Symbol,
        timeframe: Timeframe,
        count: usize,
        end_time: Option<UtcDateTime>,
    ) -> Result<CandleSeries, FetchError> {
        let candles = self
            .historical_candles(symbol, timeframe, count, end_time)
            .await?;
        Ok(CandleSeries::new(
            symbol.clone(),
            timeframe,
            self.provider(),
            candles,
        ))
    }

    /// Fetches each timeframe independently. A failing timeframe is recorded
    /// and does not abort the others.
    pub async fn multi_timeframe_candles(
        &self,
        symbol: &Symbol,
        timeframes: &[Timeframe],
        count: usize,
    ) -> MultiTimeframeCandles {
        let mut results = BTreeMap::new();
        for &timeframe in timeframes {
            if results.contains_key(&timeframe) {
                continue;
            }
            let result = self
                .historical_candles(symbol, timeframe, count, None)
                .await;
            if let Err(error) = &result {
                debug!(%timeframe, error = %error, "timeframe failed; continuing");
            }
            results.insert(timeframe, result);
        }

        MultiTimeframeCandles {
            symbol: symbol.clone(),
            results,
        }
    }

    async fn single_page(
        &self,
        scope: &CallScope,
        timeframe: Timeframe,
        count: usize,
        end_time: Option<UtcDateTime>,
    ) -> Result<Vec<Candle>, FetchError> {
        let mut request = CandlesRequest::new(scope.symbol.clone(), timeframe, count)
            .map_err(|error| scope.rejected(error))?;
        let mut merger = CandleMerger::new();
        if let Some(end) = end_time {
            request = request.with_end(end);
            merger = CandleMerger::with_upper_bound(end.unix_millis());
        }

        let source = self.source.as_ref();
        let page = self
            .call(scope, move || source.candles(request.clone()))
            .await?;
        merger.extend(page);
        Ok(merger.into_newest(count))
    }

    async fn paginate(
        &self,
        scope: &CallScope,
        timeframe: Timeframe,
        count: usize,
        page_size: usize,
        end_time: Option<UtcDateTime>,
    ) -> Result<Vec<Candle>, FetchError> {
        let end = end_time.unwrap_or_else(UtcDateTime::now);
        let plan = WindowPlan::new(timeframe, end.unix_millis(), count, page_size);
        let mut merger = CandleMerger::with_upper_bound(plan.anchor_ms());
        let mut windows_fetched = 0;
        let source = self.source.as_ref();

        for window in plan.windows() {
            if merger.len() >= count {
                break;
            }

            let start = UtcDateTime::from_unix_millis(window.start_ms)
                .map_err(|error| scope.rejected(error.into()))?;
            let window_end = UtcDateTime::from_unix_millis(window.end_ms)
                .map_err(|error| scope.rejected(error.into()))?;
            let request = CandlesRequest::new(scope.symbol.clone(), timeframe, window.limit)
                .map_err(|error| scope.rejected(error))?
                .with_start(start)
                .with_end(window_end);

            debug!(
                symbol = %scope.symbol,
                %timeframe,
                window = window.index,
                start_ms = window.start_ms,
                end_ms = window.end_ms,
                limit = window.limit,
                "fetching candle window"
            );
            let page = self
                .call(scope, move || source.candles(request.clone()))
                .await?;
            windows_fetched += 1;

            if page.is_empty() {
                debug!(window = window.index, "empty window; history exhausted");
                break;
            }
            merger.extend(page);
        }

        let candles = merger.into_newest(count);
        info!(
            provider = %scope.provider,
            symbol = %scope.symbol,
            %timeframe,
            requested = count,
            windows = windows_fetched,
            candles = candles.len(),
            "paginated candle fetch complete"
        );
        Ok(candles)
    }

    fn scope(&self, endpoint: Endpoint, symbol: &Symbol, timeframe: Option<Timeframe>) -> CallScope {
        CallScope {
            provider: self.provider(),
            endpoint,
            symbol: symbol.clone(),
            timeframe,
        }
    }

    fn require(&self, scope: &CallScope) -> Result<(), FetchError> {
        if self.capabilities().supports(scope.endpoint) {
            Ok(())
        } else {
            Err(scope.rejected(SourceError::unsupported(
                scope.endpoint,
                scope.provider,
            )))
        }
    }

    async fn call<'a, T, F>(&'a self, scope: &CallScope, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> SourceFuture<'a, T>,
    {
        let gate = &self.gate;
        let timeout = self.config.call_timeout;
        let provider = scope.provider;
        let endpoint = scope.endpoint;

        retry_with_backoff(&self.config.retry, |attempt| {
            let call = operation();
            async move {
                gate.ready().await;
                debug!(%provider, %endpoint, attempt, "calling provider");
                if timeout.is_zero() {
                    return call.await;
                }
                match tokio::time::timeout(timeout, call).await {
                    Ok(result) => result,
                    Err(_) => Err(SourceError::transient(format!(
                        "{provider} {endpoint} call exceeded {} ms timeout",
                        timeout.as_millis()
                    ))),
                }
            }
        })
        .await
        .map_err(|failure| scope.failed(failure))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::retry::RetryConfig;

    const HOUR: i64 = 3_600_000;

    /// Produces a contiguous hourly history and fails on demand.
    struct FakeSource {
        calls: AtomicUsize,
        failures: Mutex<Vec<SourceError>>,
        requests: Mutex<Vec<CandlesRequest>>,
        history_start_ms: i64,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
                history_start_ms: 0,
            }
        }

        fn failing_with(errors: Vec<SourceError>) -> Self {
            Self {
                failures: Mutex::new(errors),
                ..Self::new()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl DataSource for FakeSource {
        fn id(&self) -> ProviderId {
            ProviderId::ExchangeRest
        }

        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::full()
        }

        fn page_limit(&self) -> usize {
            10
        }

        fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if let Some(error) = self.failures.lock().expect("lock").pop() {
                    return Err(error);
                }
                let ts = UtcDateTime::from_unix_millis(HOUR).expect("ts");
                Ok(Quote::new(req.symbol, 100.0, ts, ProviderId::ExchangeRest).expect("quote"))
            })
        }

        fn candles<'a>(&'a self, req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.requests.lock().expect("lock").push(req.clone());
                if let Some(error) = self.failures.lock().expect("lock").pop() {
                    return Err(error);
                }
                let end = req.end.map(UtcDateTime::unix_millis).unwrap_or(100 * HOUR);
                let end = req.timeframe.floor_ms(end);
                let lowest = req
                    .start
                    .map(UtcDateTime::unix_millis)
                    .unwrap_or(i64::MIN)
                    .max(self.history_start_ms);
                let mut candles = Vec::new();
                let mut open = end;
                while open >= lowest && candles.len() < req.limit {
                    let ts = UtcDateTime::from_unix_millis(open).expect("ts");
                    candles.push(Candle::new(ts, 1.0, 2.0, 0.5, 1.5, 3.0).expect("candle"));
                    open -= req.timeframe.duration_ms();
                }
                candles.reverse();
                Ok(candles)
            })
        }
    }

    fn fetcher(source: Arc<FakeSource>) -> Fetcher {
        let config = FetcherConfig::for_provider(ProviderId::ExchangeRest)
            .with_min_call_spacing(Duration::ZERO)
            .with_retry(RetryConfig::exponential(
                3,
                Duration::from_millis(1),
                Duration::from_millis(2),
            ));
        Fetcher::builder(config).with_source(source).build()
    }

    fn btc() -> Symbol {
        Symbol::parse("BTC/USDT").expect("symbol")
    }

    fn end() -> Option<UtcDateTime> {
        Some(UtcDateTime::from_unix_millis(1_000 * HOUR).expect("end"))
    }

    #[tokio::test]
    async fn small_requests_use_one_call() {
        let source = Arc::new(FakeSource::new());
        let candles = fetcher(source.clone())
            .historical_candles(&btc(), Timeframe::OneHour, 7, end())
            .await
            .expect("candles");

        assert_eq!(candles.len(), 7);
        assert_eq!(source.calls(), 1);
        assert!(crate::is_strictly_ascending(&candles));
    }

    #[tokio::test]
    async fn large_requests_walk_backward_in_windows() {
        let source = Arc::new(FakeSource::new());
        let candles = fetcher(source.clone())
            .historical_candles(&btc(), Timeframe::OneHour, 25, end())
            .await
            .expect("candles");

        assert_eq!(candles.len(), 25);
        assert_eq!(source.calls(), 3);
        assert_eq!(candles.last().map(Candle::open_time_ms), Some(1_000 * HOUR));
        assert_eq!(candles.first().map(Candle::open_time_ms), Some(976 * HOUR));

        let requests = source.requests.lock().expect("lock");
        let limits = requests.iter().map(|req| req.limit).collect::<Vec<_>>();
        assert_eq!(limits, vec![10, 10, 5]);
        assert!(requests[0].start > requests[1].start);
    }

    #[tokio::test]
    async fn empty_window_stops_the_walk() {
        let source = Arc::new(FakeSource {
            history_start_ms: 985 * HOUR,
            ..FakeSource::new()
        });
        let candles = fetcher(source.clone())
            .historical_candles(&btc(), Timeframe::OneHour, 40, end())
            .await
            .expect("partial history");

        assert_eq!(candles.len(), 16);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn page_size_override_shrinks_windows() {
        let source = Arc::new(FakeSource::new());
        let config = FetcherConfig::for_provider(ProviderId::ExchangeRest)
            .with_min_call_spacing(Duration::ZERO)
            .with_page_size(4);
        let fetcher = Fetcher::builder(config).with_source(source.clone()).build();

        let candles = fetcher
            .historical_candles(&btc(), Timeframe::OneHour, 10, end())
            .await
            .expect("candles");

        assert_eq!(fetcher.page_size(), 4);
        assert_eq!(candles.len(), 10);
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn zero_count_is_rejected_without_calls() {
        let source = Arc::new(FakeSource::new());
        let error = fetcher(source.clone())
            .historical_candles(&btc(), Timeframe::OneDay, 0, None)
            .await
            .expect_err("must fail");

        assert_eq!(error.kind(), FetchErrorKind::InvalidRequest);
        assert_eq!(error.attempts(), 0);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let source = Arc::new(FakeSource::failing_with(vec![SourceError::transient(
            "reset",
        )]));
        let quote = fetcher(source.clone())
            .realtime_price(&btc())
            .await
            .expect("quote after retry");

        assert_eq!(quote.price, 100.0);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_error_carries_context() {
        let failures = vec![SourceError::rate_limited("429"); 3];
        let source = Arc::new(FakeSource::failing_with(failures));
        let error = fetcher(source.clone())
            .historical_candles(&btc(), Timeframe::FourHours, 5, None)
            .await
            .expect_err("must exhaust");

        assert_eq!(error.kind(), FetchErrorKind::Exhausted);
        assert_eq!(error.attempts(), 3);
        assert_eq!(error.timeframe(), Some(Timeframe::FourHours));
        assert_eq!(error.symbol().map(ToString::to_string).as_deref(), Some("BTC/USDT"));
        assert_eq!(
            error.last_error().map(SourceError::kind),
            Some(SourceErrorKind::RateLimited)
        );
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn slow_calls_time_out_as_transient() {
        struct SlowSource;

        impl DataSource for SlowSource {
            fn id(&self) -> ProviderId {
                ProviderId::GenericExchange
            }
            fn capabilities(&self) -> CapabilitySet {
                CapabilitySet::full()
            }
            fn page_limit(&self) -> usize {
                100
            }
            fn quote<'a>(&'a self, _req: QuoteRequest) -> SourceFuture<'a, Quote> {
                Box::pin(async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Err(SourceError::transient("unreachable"))
                })
            }
            fn candles<'a>(&'a self, _req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
                Box::pin(async { Ok(Vec::new()) })
            }
        }

        let config = FetcherConfig::for_provider(ProviderId::ExchangeRest)
            .with_min_call_spacing(Duration::ZERO)
            .with_call_timeout(Duration::from_millis(10))
            .with_retry(RetryConfig::fixed(Duration::from_millis(1), 2));
        let fetcher = Fetcher::builder(config)
            .with_source(Arc::new(SlowSource))
            .build();

        let error = fetcher.realtime_price(&btc()).await.expect_err("timeout");
        assert_eq!(fetcher.provider(), ProviderId::GenericExchange);
        assert_eq!(error.kind(), FetchErrorKind::Exhausted);
        assert_eq!(error.attempts(), 2);
        assert!(error.message().contains("timeout"));
    }

    #[tokio::test]
    async fn aggregator_candles_are_unsupported_without_network() {
        let http = Arc::new(crate::http_client::testing::ScriptedHttpClient::default());
        let fetcher = Fetcher::builder(FetcherConfig::for_provider(ProviderId::Aggregator))
            .with_http_client(http.clone())
            .build();

        let error = fetcher
            .historical_candles(&btc(), Timeframe::OneDay, 30, None)
            .await
            .expect_err("unsupported");

        assert_eq!(error.kind(), FetchErrorKind::Unsupported);
        assert!(http.recorded_requests().is_empty());
    }
}
