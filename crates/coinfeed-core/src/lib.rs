//! # Coinfeed Core
//!
//! Provider-neutral crypto market data: realtime quotes and OHLCV candle
//! history from heterogeneous upstream APIs behind one facade.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Binance, CoinGecko, generic exchange connector) |
//! | [`config`] | Explicit fetcher configuration |
//! | [`data_source`] | Adapter contract, requests and source errors |
//! | [`domain`] | Domain models (Symbol, Timeframe, Candle, Quote) |
//! | [`error`] | Validation and export errors |
//! | [`export`] | CSV export sink |
//! | [`fetcher`] | Fetcher facade with retry and pagination |
//! | [`http_client`] | HTTP client abstraction |
//! | [`pagination`] | Window planning and merge |
//! | [`provider_policy`] | Per-provider defaults |
//! | [`retry`] | Exponential backoff |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Call spacing |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use coinfeed_core::{Fetcher, FetcherConfig, ProviderId, Symbol, Timeframe};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Fetcher::new(FetcherConfig::for_provider(ProviderId::ExchangeRest));
//!     let symbol = Symbol::parse("BTC/USDT")?;
//!
//!     let quote = fetcher.realtime_price(&symbol).await?;
//!     println!("BTC/USDT: {:.2}", quote.price);
//!
//!     // 2500 hourly candles; Binance pages hold 1000, so this takes three calls.
//!     let candles = fetcher
//!         .historical_candles(&symbol, Timeframe::OneHour, 2500, None)
//!         .await?;
//!     println!("fetched {} candles", candles.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Caller   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │    Fetcher      │────▶│ RateGate + Retry │
//! │  (pagination)   │     └──────────────────┘
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Data Source     │────▶│ HTTP Client      │
//! │ (Adapter Trait) │     │ (reqwest/script) │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use coinfeed_core::{FetchError, FetchErrorKind};
//!
//! fn describe(error: &FetchError) -> &'static str {
//!     match error.kind() {
//!         FetchErrorKind::NotFound => "no such symbol",
//!         FetchErrorKind::Exhausted => "provider is down or throttling",
//!         FetchErrorKind::Unsupported => "provider cannot serve this",
//!         FetchErrorKind::InvalidRequest => "ask for something else",
//!     }
//! }
//! ```

pub mod adapters;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod http_client;
pub mod pagination;
pub mod provider_policy;
pub mod retry;
pub mod source;
pub mod throttling;

pub use adapters::{
    AggregatorAdapter, BybitConnector, ExchangeConnector, ExchangeRestAdapter,
    GenericExchangeAdapter,
};

pub use config::FetcherConfig;

pub use data_source::{
    CandlesRequest, CapabilitySet, DataSource, Endpoint, QuoteRequest, SourceError,
    SourceErrorKind, SourceFuture,
};

pub use domain::{is_strictly_ascending, Candle, CandleSeries, Quote, Symbol, Timeframe, UtcDateTime};

pub use error::{ExportError, ValidationError};

pub use export::{export_series, read_candles, read_candles_from_path, write_candles};

pub use fetcher::{FetchError, FetchErrorKind, Fetcher, FetcherBuilder, MultiTimeframeCandles};

pub use http_client::{
    HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};

pub use provider_policy::{BackoffPolicy, ProviderPolicy};

pub use retry::{retry_with_backoff, Backoff, RetryConfig, RetryFailure};

pub use source::ProviderId;

pub use throttling::{RateGate, ThrottleRegistry};
