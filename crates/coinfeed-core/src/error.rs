use thiserror::Error;

/// Validation and contract errors exposed by `coinfeed-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol '{value}' must be written as BASE/QUOTE")]
    SymbolMissingQuote { value: String },
    #[error("symbol asset '{asset}' length {len} exceeds max {max}")]
    AssetTooLong { asset: String, len: usize, max: usize },
    #[error("symbol asset contains invalid character '{ch}' at index {index}")]
    AssetInvalidChar { ch: char, index: usize },

    #[error("invalid timeframe '{value}', expected one of 1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w")]
    InvalidTimeframe { value: String },
    #[error(
        "invalid provider '{value}', expected one of exchange-rest, aggregator, generic-exchange"
    )]
    InvalidProvider { value: String },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
    #[error("unix millisecond timestamp {value} is out of range")]
    TimestampOutOfRange { value: i64 },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("quote price must be greater than zero")]
    NonPositivePrice,

    #[error("candle high must be >= low")]
    InvalidCandleRange,
    #[error("candle open/close must be within high/low range")]
    InvalidCandleBounds,
}

/// Failures raised by the CSV export sink.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: invalid timestamp '{value}'")]
    InvalidTimestamp { row: usize, value: String },
    #[error("row {row}: {source}")]
    InvalidRow {
        row: usize,
        #[source]
        source: ValidationError,
    },
    #[error("row {row}: open time is not after the previous row")]
    Unordered { row: usize },
}
