//! Price cursor over a historical candle series.
//!
//! The cursor only moves forward. `advance()` refuses to move past the final
//! candle and reports whether it moved, which is what `step()` surfaces to
//! callers.

use crate::domain::{Candle, CandleSeries};

/// Position within a candle series.
#[derive(Debug, Clone)]
pub struct CandleCursor {
    series: CandleSeries,
    position: usize,
}

impl CandleCursor {
    /// Start at the first candle. The series is validated non-empty at
    /// construction, so `current()` is always defined.
    pub fn new(series: CandleSeries) -> Self {
        Self { series, position: 0 }
    }

    pub fn current(&self) -> &Candle {
        // Position is bounds-checked in advance(); series is non-empty.
        &self.series.candles()[self.position]
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    /// Move to the next candle. Returns false (without moving) when already
    /// on the final candle.
    pub fn advance(&mut self) -> bool {
        if self.position + 1 >= self.series.len() {
            return false;
        }
        self.position += 1;
        true
    }

    pub fn at_end(&self) -> bool {
        self.position + 1 >= self.series.len()
    }

    /// Rewind to the first candle.
    pub fn rewind(&mut self) {
        self.position = 0;
    }
}
