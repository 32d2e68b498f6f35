//! OHLCV candles and the validated series the replay engine walks.
//!
//! `CandleSeries` is the boundary between the data pipeline (out of scope)
//! and the engine: construction validates shape once, so the engine never
//! re-checks columns or ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Column names a candle data set must provide.
pub const REQUIRED_COLUMNS: &[&str] = &["open", "high", "low", "close", "volume"];

/// Errors from candle series validation.
#[derive(Debug, Clone, Error)]
pub enum SeriesError {
    #[error("Missing required columns: {0:?}")]
    MissingRequiredColumns(Vec<String>),

    #[error("column '{column}': expected {expected} rows, got {actual}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("candle series is empty")]
    Empty,

    #[error("candle series is unordered at row {index}")]
    Unordered { index: usize },
}

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// An ordered, validated sequence of candles for a single product.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate an already-assembled candle list: non-empty, timestamps
    /// non-decreasing.
    pub fn new(candles: Vec<Candle>) -> Result<Self, SeriesError> {
        if candles.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (i, pair) in candles.windows(2).enumerate() {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(SeriesError::Unordered { index: i + 1 });
            }
        }
        Ok(Self { candles })
    }

    /// Build a series from columnar data, validating that every required
    /// OHLCV column is present and all columns have one value per timestamp.
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        columns: &HashMap<String, Vec<f64>>,
    ) -> Result<Self, SeriesError> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| !columns.contains_key(**name))
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(SeriesError::MissingRequiredColumns(missing));
        }

        let expected = timestamps.len();
        for name in REQUIRED_COLUMNS {
            let actual = columns[*name].len();
            if actual != expected {
                return Err(SeriesError::ColumnLengthMismatch {
                    column: name.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let candles = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, timestamp)| Candle {
                timestamp,
                open: columns["open"][i],
                high: columns["high"][i],
                low: columns["low"][i],
                close: columns["close"][i],
                volume: columns["volume"][i],
            })
            .collect();

        Self::new(candles)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + i * 60, 0).unwrap()
    }

    fn flat_candle(i: i64, price: f64) -> Candle {
        Candle {
            timestamp: ts(i),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1.0,
        }
    }

    fn full_columns(n: usize) -> (Vec<DateTime<Utc>>, HashMap<String, Vec<f64>>) {
        let timestamps: Vec<_> = (0..n as i64).map(ts).collect();
        let mut columns = HashMap::new();
        for name in REQUIRED_COLUMNS {
            columns.insert(name.to_string(), vec![100.0; n]);
        }
        (timestamps, columns)
    }

    #[test]
    fn valid_columns_pass() {
        let (timestamps, columns) = full_columns(5);
        let series = CandleSeries::from_columns(timestamps, &columns).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series.get(0).unwrap().close, 100.0);
    }

    #[test]
    fn missing_column_fails() {
        let (timestamps, mut columns) = full_columns(5);
        columns.remove("volume");
        columns.remove("high");
        let err = CandleSeries::from_columns(timestamps, &columns).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Missing required columns"));
        assert!(msg.contains("volume"));
        assert!(msg.contains("high"));
    }

    #[test]
    fn length_mismatch_fails() {
        let (timestamps, mut columns) = full_columns(5);
        columns.get_mut("close").unwrap().pop();
        let err = CandleSeries::from_columns(timestamps, &columns).unwrap_err();
        assert!(matches!(err, SeriesError::ColumnLengthMismatch { .. }));
    }

    #[test]
    fn empty_series_fails() {
        assert!(matches!(
            CandleSeries::new(vec![]),
            Err(SeriesError::Empty)
        ));
    }

    #[test]
    fn unordered_series_fails() {
        let candles = vec![flat_candle(1, 100.0), flat_candle(0, 101.0)];
        assert!(matches!(
            CandleSeries::new(candles),
            Err(SeriesError::Unordered { index: 1 })
        ));
    }

    #[test]
    fn equal_timestamps_allowed() {
        let candles = vec![flat_candle(0, 100.0), flat_candle(0, 101.0)];
        assert!(CandleSeries::new(candles).is_ok());
    }
}
