//! BarSeries — an ordered, validated, immutable bar sequence for one instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::timeframe::Timeframe;
use crate::data::{check_bar, DataIntegrityError};

/// Ordered bars for one `(instrument, timeframe)` pair.
///
/// Invariants (checked on construction, never repaired):
/// - at least one bar;
/// - every bar satisfies the OHLC invariant;
/// - timestamps strictly increase.
///
/// Gaps are permitted. Placeholder bars are kept but flagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    instrument: String,
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Build a series from bars that are already sorted and de-duplicated.
    ///
    /// Use [`crate::data::load_bars`] for raw upstream rows: it also resolves
    /// duplicate timestamps and enforces gap limits.
    pub fn new(
        instrument: impl Into<String>,
        timeframe: Timeframe,
        bars: Vec<Bar>,
    ) -> Result<Self, DataIntegrityError> {
        if bars.is_empty() {
            return Err(DataIntegrityError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            check_bar(index, bar)?;
        }
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(DataIntegrityError::NonMonotonic {
                    index: index + 1,
                    timestamp: pair[1].timestamp,
                    previous: pair[0].timestamp,
                });
            }
        }
        Ok(Self {
            instrument: instrument.into(),
            timeframe,
            bars,
        })
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.bars[self.bars.len() - 1].timestamp
    }

    pub fn placeholder_count(&self) -> usize {
        self.bars.iter().filter(|b| b.placeholder).count()
    }

    /// Index of the last bar that is a real observation.
    pub fn last_real_index(&self) -> Option<usize> {
        self.bars.iter().rposition(|b| !b.placeholder)
    }

    /// Consume the series and return its bars (for building a modified copy).
    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}
