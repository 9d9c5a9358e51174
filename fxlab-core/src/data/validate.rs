//! Bar hygiene: turn raw upstream rows into a validated [`BarSeries`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::DataIntegrityError;
use super::gaps::{gap_report, GapReport};
use crate::domain::{Bar, BarSeries, Timeframe};

/// Default ceiling on the fraction of expected bars that may be missing.
pub const DEFAULT_MAX_MISSING_FRACTION: f64 = 0.05;

/// One row as delivered by the upstream data collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub placeholder: bool,
}

impl From<RawBar> for Bar {
    fn from(raw: RawBar) -> Self {
        Bar {
            timestamp: raw.timestamp,
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            volume: raw.volume,
            placeholder: raw.placeholder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOptions {
    /// Inclusive lower bound on bar timestamps.
    pub start: Option<DateTime<Utc>>,
    /// Inclusive upper bound on bar timestamps.
    pub end: Option<DateTime<Utc>>,
    pub max_missing_fraction: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            max_missing_fraction: DEFAULT_MAX_MISSING_FRACTION,
        }
    }
}

/// What happened while loading, for diagnostics (`fxlab validate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_outside_window: usize,
    pub duplicates_replaced: usize,
    pub gaps: GapReport,
}

/// Check a single bar. `index` is reported back in the error.
pub fn check_bar(index: usize, bar: &Bar) -> Result<(), DataIntegrityError> {
    let timestamp = bar.timestamp;
    if !bar.is_finite() {
        return Err(DataIntegrityError::NonFinite { index, timestamp });
    }
    if bar.open <= 0.0 || bar.high <= 0.0 || bar.low <= 0.0 || bar.close <= 0.0 {
        return Err(DataIntegrityError::NonPositivePrice { index, timestamp });
    }
    if bar.volume < 0.0 {
        return Err(DataIntegrityError::NegativeVolume {
            index,
            timestamp,
            volume: bar.volume,
        });
    }
    if !bar.is_sane() {
        return Err(DataIntegrityError::OhlcViolation {
            index,
            timestamp,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
        });
    }
    if bar.placeholder && !bar.is_flat() {
        return Err(DataIntegrityError::PlaceholderWithPriceAction { index, timestamp });
    }
    Ok(())
}

/// Validate raw rows into a series. See [`load_bars_with_report`].
pub fn load_bars(
    instrument: &str,
    timeframe: Timeframe,
    rows: &[RawBar],
    options: &LoadOptions,
) -> Result<BarSeries, DataIntegrityError> {
    load_bars_with_report(instrument, timeframe, rows, options).map(|(series, _)| series)
}

/// Validate raw rows into a series and report what was done to them.
///
/// Rows outside the `[start, end]` window are dropped first. Each remaining row
/// must pass [`check_bar`]. An equal timestamp replaces the previous row (later
/// row wins); a decreasing timestamp fails. Finally the missing-bar fraction is
/// checked against `max_missing_fraction`.
pub fn load_bars_with_report(
    instrument: &str,
    timeframe: Timeframe,
    rows: &[RawBar],
    options: &LoadOptions,
) -> Result<(BarSeries, LoadReport), DataIntegrityError> {
    let mut bars: Vec<Bar> = Vec::with_capacity(rows.len());
    let mut outside = 0usize;
    let mut duplicates = 0usize;

    for (index, raw) in rows.iter().enumerate() {
        let in_window = options.start.map_or(true, |s| raw.timestamp >= s)
            && options.end.map_or(true, |e| raw.timestamp <= e);
        if !in_window {
            outside += 1;
            continue;
        }

        let bar = Bar::from(*raw);
        check_bar(index, &bar)?;

        match bars.last_mut() {
            Some(prev) if bar.timestamp == prev.timestamp => {
                warn!(
                    instrument,
                    index,
                    timestamp = %bar.timestamp,
                    "duplicate timestamp, keeping later row"
                );
                *prev = bar;
                duplicates += 1;
            }
            Some(prev) if bar.timestamp < prev.timestamp => {
                return Err(DataIntegrityError::NonMonotonic {
                    index,
                    timestamp: bar.timestamp,
                    previous: prev.timestamp,
                });
            }
            _ => bars.push(bar),
        }
    }

    if bars.is_empty() {
        return Err(DataIntegrityError::Empty);
    }

    let gaps = gap_report(&bars, timeframe);
    if gaps.exceeds(options.max_missing_fraction) {
        return Err(DataIntegrityError::TooManyGaps {
            missing: gaps.missing_slots,
            expected: gaps.expected_slots,
            fraction: gaps.missing_fraction,
            max_fraction: options.max_missing_fraction,
        });
    }

    debug!(
        instrument,
        timeframe = %timeframe,
        bars = bars.len(),
        missing = gaps.missing_slots,
        "bars validated"
    );

    let report = LoadReport {
        rows_read: rows.len(),
        rows_outside_window: outside,
        duplicates_replaced: duplicates,
        gaps,
    };
    let series = BarSeries::new(instrument, timeframe, bars)?;
    Ok((series, report))
}
