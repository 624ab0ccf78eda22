use serde::{Deserialize, Serialize};

use crate::{ProviderId, Symbol, Timeframe, UtcDateTime, ValidationError};

/// Canonical spot quote.
///
/// Optional fields are `None` when the provider does not publish them, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub price: f64,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub high_24h: Option<f64>,
    pub low_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    /// 24h price change in percent.
    pub change_24h_pct: Option<f64>,
    pub as_of: UtcDateTime,
    pub source: ProviderId,
}

impl Quote {
    pub fn new(
        symbol: Symbol,
        price: f64,
        as_of: UtcDateTime,
        source: ProviderId,
    ) -> Result<Self, ValidationError> {
        validate_finite("price", price)?;
        if price <= 0.0 {
            return Err(ValidationError::NonPositivePrice);
        }

        Ok(Self {
            symbol,
            price,
            bid: None,
            ask: None,
            high_24h: None,
            low_24h: None,
            volume_24h: None,
            change_24h_pct: None,
            as_of,
            source,
        })
    }

    pub fn with_book(mut self, bid: Option<f64>, ask: Option<f64>) -> Result<Self, ValidationError> {
        validate_optional_non_negative("bid", bid)?;
        validate_optional_non_negative("ask", ask)?;
        self.bid = bid;
        self.ask = ask;
        Ok(self)
    }

    pub fn with_24h_range(
        mut self,
        high: Option<f64>,
        low: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("high_24h", high)?;
        validate_optional_non_negative("low_24h", low)?;
        self.high_24h = high;
        self.low_24h = low;
        Ok(self)
    }

    pub fn with_24h_stats(
        mut self,
        volume: Option<f64>,
        change_pct: Option<f64>,
    ) -> Result<Self, ValidationError> {
        validate_optional_non_negative("volume_24h", volume)?;
        if let Some(change) = change_pct {
            validate_finite("change_24h_pct", change)?;
        }
        self.volume_24h = volume;
        self.change_24h_pct = change_pct;
        Ok(self)
    }
}

/// One OHLCV interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: UtcDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(
        open_time: UtcDateTime,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        validate_non_negative("open", open)?;
        validate_non_negative("high", high)?;
        validate_non_negative("low", low)?;
        validate_non_negative("close", close)?;
        validate_non_negative("volume", volume)?;

        if high < low {
            return Err(ValidationError::InvalidCandleRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidCandleBounds);
        }

        Ok(Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn open_time_ms(&self) -> i64 {
        self.open_time.unix_millis()
    }
}

/// Ordered candles for one symbol and timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleSeries {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub provider: ProviderId,
    pub candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        provider: ProviderId,
        candles: Vec<Candle>,
    ) -> Self {
        Self {
            symbol,
            timeframe,
            provider,
            candles,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// True when open times are strictly increasing (hence free of duplicates).
    pub fn is_strictly_ascending(&self) -> bool {
        is_strictly_ascending(&self.candles)
    }
}

pub fn is_strictly_ascending(candles: &[Candle]) -> bool {
    candles
        .windows(2)
        .all(|pair| pair[0].open_time < pair[1].open_time)
}

fn validate_finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    Ok(())
}

fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }
    Ok(())
}

fn validate_optional_non_negative(
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    if let Some(value) = value {
        validate_non_negative(field, value)?;
    }
    Ok(())
}
