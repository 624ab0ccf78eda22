//! CSV export sink.
//!
//! Columns: `timestamp,open,high,low,close,volume`. Timestamps are RFC3339 UTC;
//! numbers use the shortest representation that parses back to the same `f64`.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ExportError;
use crate::{Candle, CandleSeries, UtcDateTime};

pub const CSV_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

#[derive(Debug, Serialize, Deserialize)]
struct CandleRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl From<&Candle> for CandleRow {
    fn from(candle: &Candle) -> Self {
        Self {
            timestamp: candle.open_time.format_rfc3339(),
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
        }
    }
}

/// Writes a header and one row per candle.
///
/// # Errors
///
/// [`ExportError::Unordered`] when open times are not strictly ascending;
/// nothing is written in that case.
pub fn write_candles<W: Write>(writer: W, candles: &[Candle]) -> Result<(), ExportError> {
    if let Some(row) = first_unordered_row(candles) {
        return Err(ExportError::Unordered { row });
    }

    let mut csv_writer = WriterBuilder::new().has_headers(false).from_writer(writer);
    csv_writer.write_record(CSV_HEADER)?;
    for candle in candles {
        csv_writer.serialize(CandleRow::from(candle))?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes `series` to a file at `path`, replacing any existing file.
pub fn export_series(path: impl AsRef<Path>, series: &CandleSeries) -> Result<(), ExportError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_candles(file, &series.candles)?;
    debug!(
        path = %path.display(),
        symbol = %series.symbol,
        timeframe = %series.timeframe,
        rows = series.len(),
        "exported candle series"
    );
    Ok(())
}

/// Reads candles written by [`write_candles`], validating every row.
pub fn read_candles<R: Read>(reader: R) -> Result<Vec<Candle>, ExportError> {
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    if headers != StringRecord::from(CSV_HEADER.to_vec()) {
        return Err(ExportError::Csv(csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unexpected header '{}'", headers.iter().collect::<Vec<_>>().join(",")),
        ))));
    }

    let mut candles: Vec<Candle> = Vec::new();
    for (index, record) in csv_reader.deserialize::<CandleRow>().enumerate() {
        let row = index + 1;
        let record = record?;
        let open_time =
            UtcDateTime::parse(&record.timestamp).map_err(|_| ExportError::InvalidTimestamp {
                row,
                value: record.timestamp.clone(),
            })?;
        let candle = Candle::new(
            open_time,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
        .map_err(|source| ExportError::InvalidRow { row, source })?;

        if candles
            .last()
            .is_some_and(|previous| previous.open_time >= candle.open_time)
        {
            return Err(ExportError::Unordered { row });
        }
        candles.push(candle);
    }

    Ok(candles)
}

pub fn read_candles_from_path(path: impl AsRef<Path>) -> Result<Vec<Candle>, ExportError> {
    read_candles(File::open(path)?)
}

fn first_unordered_row(candles: &[Candle]) -> Option<usize> {
    candles
        .windows(2)
        .position(|pair| pair[0].open_time >= pair[1].open_time)
        .map(|index| index + 2)
}
