//! Shared fixtures for the workspace integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use coinfeed_core::{
    Candle, CandlesRequest, CapabilitySet, DataSource, Fetcher, FetcherConfig, HttpClient,
    HttpError, HttpRequest, HttpResponse, ProviderId, Quote, QuoteRequest, RetryConfig,
    SourceError, SourceFuture, Symbol, Timeframe, UtcDateTime,
};

/// 2024-01-01T00:00:00Z
pub const JAN_1_2024_MS: i64 = 1_704_067_200_000;

pub fn btc() -> Symbol {
    Symbol::parse("BTC/USDT").expect("symbol")
}

pub fn at_ms(ms: i64) -> UtcDateTime {
    UtcDateTime::from_unix_millis(ms).expect("timestamp")
}

pub fn candle_at(ms: i64) -> Candle {
    // Close drifts with time so merged output is easy to eyeball.
    let close = 100.0 + (ms / 60_000 % 50) as f64;
    Candle::new(at_ms(ms), close, close + 1.0, close - 1.0, close, 10.0).expect("candle")
}

/// No spacing and millisecond backoff so tests stay fast.
pub fn fast_config(provider: ProviderId, max_attempts: u32) -> FetcherConfig {
    FetcherConfig::for_provider(provider)
        .with_min_call_spacing(Duration::ZERO)
        .with_retry(RetryConfig::exponential(
            max_attempts,
            Duration::from_millis(1),
            Duration::from_millis(4),
        ))
}

pub fn fetcher_for(source: Arc<ScriptedSource>, max_attempts: u32) -> Fetcher {
    Fetcher::builder(fast_config(source.id(), max_attempts))
        .with_source(source)
        .build()
}

/// Candle history generator that answers like an exchange kline endpoint.
///
/// History is continuous from `earliest_ms` onwards on its own grid of open
/// times, `grid_offset_ms` past the epoch. Requests without `start` return
/// the newest `limit` candles at or before `end`; requests with `start`
/// return up to `limit` candles from `start` up to `end`.
pub struct ScriptedSource {
    id: ProviderId,
    page_limit: usize,
    earliest_ms: i64,
    overlap: usize,
    grid_offset_ms: i64,
    capabilities: CapabilitySet,
    failures: Mutex<HashMap<Option<Timeframe>, VecDeque<SourceError>>>,
    persistent: Mutex<HashMap<Option<Timeframe>, SourceError>>,
    requests: Mutex<Vec<CandlesRequest>>,
    quote_calls: Mutex<usize>,
}

impl ScriptedSource {
    pub fn new(page_limit: usize) -> Self {
        Self {
            id: ProviderId::ExchangeRest,
            page_limit,
            earliest_ms: 0,
            overlap: 0,
            grid_offset_ms: 0,
            capabilities: CapabilitySet::full(),
            failures: Mutex::new(HashMap::new()),
            persistent: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            quote_calls: Mutex::new(0),
        }
    }

    pub fn with_id(mut self, id: ProviderId) -> Self {
        self.id = id;
        self
    }

    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// History starts here; earlier windows come back short or empty.
    pub fn with_history_from(mut self, earliest_ms: i64) -> Self {
        self.earliest_ms = earliest_ms;
        self
    }

    /// Every page also repeats this many candles from before its start.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Candles open this far past each epoch-aligned multiple of the timeframe.
    pub fn with_grid_offset(mut self, grid_offset_ms: i64) -> Self {
        self.grid_offset_ms = grid_offset_ms;
        self
    }

    fn floor_to_grid(&self, step: i64, ts: i64) -> i64 {
        ts - (ts - self.grid_offset_ms).rem_euclid(step)
    }

    /// Queue one-shot failures; `None` applies to quotes.
    pub fn fail_next(self, timeframe: Option<Timeframe>, errors: Vec<SourceError>) -> Self {
        self.failures
            .lock()
            .expect("lock")
            .entry(timeframe)
            .or_default()
            .extend(errors);
        self
    }

    pub fn fail_always(self, timeframe: Option<Timeframe>, error: SourceError) -> Self {
        self.persistent
            .lock()
            .expect("lock")
            .insert(timeframe, error);
        self
    }

    pub fn candle_requests(&self) -> Vec<CandlesRequest> {
        self.requests.lock().expect("lock").clone()
    }

    pub fn candle_calls(&self) -> usize {
        self.requests.lock().expect("lock").len()
    }

    pub fn candle_calls_for(&self, timeframe: Timeframe) -> usize {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .filter(|req| req.timeframe == timeframe)
            .count()
    }

    pub fn quote_calls(&self) -> usize {
        *self.quote_calls.lock().expect("lock")
    }

    fn scripted_failure(&self, key: Option<Timeframe>) -> Option<SourceError> {
        if let Some(error) = self.persistent.lock().expect("lock").get(&key) {
            return Some(error.clone());
        }
        self.failures
            .lock()
            .expect("lock")
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
    }

    fn page(&self, req: &CandlesRequest) -> Vec<Candle> {
        let step = req.timeframe.duration_ms();
        let end = self.floor_to_grid(
            step,
            req.end
                .map_or_else(|| UtcDateTime::now().unix_millis(), UtcDateTime::unix_millis),
        );
        let limit = req.limit as i64;

        let first = match req.start {
            Some(start) => {
                let start = start.unix_millis();
                let aligned = self.floor_to_grid(step, start);
                if aligned < start {
                    aligned + step
                } else {
                    aligned
                }
            }
            None => end - (limit - 1) * step,
        };
        let first = first - self.overlap as i64 * step;

        (0..limit + self.overlap as i64)
            .map(|i| first + i * step)
            .filter(|&ts| ts >= self.earliest_ms && ts <= end)
            .map(candle_at)
            .collect()
    }
}

impl DataSource for ScriptedSource {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn capabilities(&self) -> CapabilitySet {
        self.capabilities
    }

    fn page_limit(&self) -> usize {
        self.page_limit
    }

    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote> {
        *self.quote_calls.lock().expect("lock") += 1;
        let failure = self.scripted_failure(None);
        Box::pin(async move {
            if let Some(error) = failure {
                return Err(error);
            }
            Ok(Quote::new(req.symbol, 42_000.0, at_ms(JAN_1_2024_MS), self.id)?)
        })
    }

    fn candles<'a>(&'a self, req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>> {
        self.requests.lock().expect("lock").push(req.clone());
        let failure = self.scripted_failure(Some(req.timeframe));
        Box::pin(async move {
            if let Some(error) = failure {
                return Err(error);
            }
            Ok(self.page(&req))
        })
    }
}

/// Transport that answers by URL substring and records every request.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<Vec<(String, VecDeque<HttpResponse>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl RoutedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Responses for URLs containing `fragment` are served in order; the last one repeats.
    pub fn route(self, fragment: &str, responses: Vec<HttpResponse>) -> Self {
        self.routes
            .lock()
            .expect("lock")
            .push((fragment.to_owned(), responses.into()));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock").clone()
    }
}

impl HttpClient for RoutedTransport {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = {
            let mut routes = self.routes.lock().expect("lock");
            routes
                .iter_mut()
                .find(|(fragment, _)| request.url.contains(fragment.as_str()))
                .and_then(|(_, queue)| {
                    if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    }
                })
                .ok_or_else(|| HttpError::new(format!("no route for {}", request.url)))
        };
        self.requests.lock().expect("lock").push(request);
        Box::pin(async move { response })
    }
}
