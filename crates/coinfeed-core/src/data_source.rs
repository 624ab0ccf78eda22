//! Data source trait and request/response types.
//!
//! This module defines the adapter contract (`DataSource`) every provider
//! implementation follows, along with the request types for each endpoint
//! and the adapter-level error taxonomy.
//!
//! # Endpoints
//!
//! | Endpoint | Request | Response | Description |
//! |----------|---------|----------|-------------|
//! | Quote | [`QuoteRequest`] | [`Quote`] | Realtime spot price |
//! | Candles | [`CandlesRequest`] | `Vec<Candle>` | One page of OHLCV history |
//!
//! Adapters make exactly one upstream call per invocation and never retry;
//! retries and spacing belong to the [`Fetcher`](crate::Fetcher).

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{Candle, ProviderId, Quote, Symbol, Timeframe, UtcDateTime, ValidationError};

/// Data endpoint type used for capability checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    Quote,
    Candles,
}

impl Endpoint {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Candles => "candles",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported endpoint matrix for a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub quote: bool,
    pub candles: bool,
    /// Whether quotes carry best bid/ask.
    pub book_top: bool,
}

impl CapabilitySet {
    pub const fn new(quote: bool, candles: bool, book_top: bool) -> Self {
        Self {
            quote,
            candles,
            book_top,
        }
    }

    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    pub const fn supports(self, endpoint: Endpoint) -> bool {
        match endpoint {
            Endpoint::Quote => self.quote,
            Endpoint::Candles => self.candles,
        }
    }

    pub fn supported_endpoints(self) -> Vec<&'static str> {
        let mut values = Vec::with_capacity(2);
        if self.quote {
            values.push("quote");
        }
        if self.candles {
            values.push("candles");
        }
        values
    }
}

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Provider signaled throttling.
    RateLimited,
    /// Network failure, timeout, 5xx or an undecodable body.
    Transient,
    /// Symbol unknown to this provider.
    NotFound,
    /// Capability not offered by this provider.
    Unsupported,
    /// Request rejected before or by the provider as malformed.
    InvalidRequest,
}

impl SourceErrorKind {
    pub const fn retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Transient)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Transient => "transient",
            Self::NotFound => "not_found",
            Self::Unsupported => "unsupported",
            Self::InvalidRequest => "invalid_request",
        }
    }
}

impl Display for SourceErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured source error returned by adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transient, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::NotFound, message)
    }

    pub fn unsupported(endpoint: Endpoint, provider: ProviderId) -> Self {
        Self::new(
            SourceErrorKind::Unsupported,
            format!("endpoint '{endpoint}' is not supported by provider '{provider}'"),
        )
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Transient => "source.transient",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::Unsupported => "source.unsupported",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_request(error.to_string())
    }
}

/// Request payload for quote endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub symbol: Symbol,
}

impl QuoteRequest {
    pub fn new(symbol: Symbol) -> Self {
        Self { symbol }
    }
}

/// Request payload for one page of candles.
///
/// Without `start` the adapter returns the newest `limit` candles whose open time
/// is at or before `end` (or now). With `start` it returns up to `limit` candles
/// opening at or after `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandlesRequest {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub limit: usize,
    pub start: Option<UtcDateTime>,
    pub end: Option<UtcDateTime>,
}

impl CandlesRequest {
    pub fn new(symbol: Symbol, timeframe: Timeframe, limit: usize) -> Result<Self, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request(
                "candles request limit must be greater than zero",
            ));
        }
        Ok(Self {
            symbol,
            timeframe,
            limit,
            start: None,
            end: None,
        })
    }

    pub fn with_start(mut self, start: UtcDateTime) -> Self {
        self.start = Some(start);
        self
    }

    pub fn with_end(mut self, end: UtcDateTime) -> Self {
        self.end = Some(end);
        self
    }
}

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Source adapter contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](DataSource::id) | Provider identifier |
/// | [`capabilities`](DataSource::capabilities) | Supported endpoints |
/// | [`page_limit`](DataSource::page_limit) | Max candles a single call returns |
/// | [`quote`](DataSource::quote) | Fetch a realtime quote |
/// | [`candles`](DataSource::candles) | Fetch one page of candles |
///
/// Implementations must be `Send + Sync`; one instance may serve several fetchers.
pub trait DataSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn capabilities(&self) -> CapabilitySet;

    /// Page ceiling reported by the provider. Zero when candles are unsupported.
    fn page_limit(&self) -> usize;

    /// Fetches the current quote for one symbol.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] classified as rate limited, transient, not found,
    /// unsupported or invalid request.
    fn quote<'a>(&'a self, req: QuoteRequest) -> SourceFuture<'a, Quote>;

    /// Fetches one page of candles in ascending open-time order.
    ///
    /// An empty page means the provider has no history for the requested range.
    fn candles<'a>(&'a self, req: CandlesRequest) -> SourceFuture<'a, Vec<Candle>>;
}
