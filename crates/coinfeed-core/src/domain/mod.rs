//! # Domain Models
//!
//! Canonical value types shared by every provider adapter.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | `BASE/QUOTE` trading pair |
//! | [`Timeframe`] | Candle interval (1m .. 1w) with fixed duration |
//! | [`Candle`] | One OHLCV interval |
//! | [`CandleSeries`] | Ordered candles for a symbol/timeframe |
//! | [`Quote`] | Spot price with optional book and 24h fields |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! All types validate their invariants at construction time:
//!
//! ```rust,ignore
//! use coinfeed_core::{Candle, UtcDateTime, ValidationError};
//!
//! let ts = UtcDateTime::parse("2024-01-01T00:00:00Z")?;
//! let candle = Candle::new(ts, 100.0, 105.0, 95.0, 102.0, 12.5)?;
//!
//! // high < low
//! let invalid = Candle::new(ts, 100.0, 95.0, 105.0, 102.0, 12.5);
//! assert!(matches!(invalid, Err(ValidationError::InvalidCandleRange)));
//! ```

mod models;
mod symbol;
mod timeframe;
mod timestamp;

pub use models::{is_strictly_ascending, Candle, CandleSeries, Quote};
pub use symbol::Symbol;
pub use timeframe::Timeframe;
pub use timestamp::UtcDateTime;
