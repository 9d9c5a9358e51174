//! Gap accounting against the FX trading week.
//!
//! The market is closed from Friday 21:00 to Sunday 22:00 UTC, the union of
//! the summer and winter session boundaries. Between two consecutive real
//! bars, the open-market time divided by the timeframe is the number of slots
//! the pair spans; every slot beyond the first is missing.
//!
//! Bars are not required to sit on a fixed grid. Daily bars stamped at the
//! New York close (Sunday to Thursday, 22:00 UTC) and series whose stamp hour
//! moves at a DST switch both count as complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Bar, Timeframe};

const DAY_SECS: i64 = 86_400;
const WEEK_SECS: i64 = 7 * DAY_SECS;
/// 1970-01-05, the first Monday after the epoch.
const FIRST_MONDAY_SECS: i64 = 4 * DAY_SECS;
/// Weekly close, Friday 21:00, as an offset from Monday 00:00.
const WEEKLY_CLOSE_OFFSET: i64 = 4 * DAY_SECS + 21 * 3_600;
/// Weekly reopen, Sunday 22:00, as an offset from Monday 00:00.
const WEEKLY_OPEN_OFFSET: i64 = 6 * DAY_SECS + 22 * 3_600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Real bars plus missing slots.
    pub expected_slots: usize,
    pub missing_slots: usize,
    pub missing_fraction: f64,
    pub placeholder_bars: usize,
    /// Longest run of consecutive missing slots.
    pub longest_gap: usize,
}

impl GapReport {
    pub fn exceeds(&self, max_fraction: f64) -> bool {
        self.missing_fraction > max_fraction
    }
}

/// True inside the weekly Friday-close to Sunday-open window.
pub fn is_market_closed(ts: DateTime<Utc>) -> bool {
    let secs = ts.timestamp();
    let offset = (secs - FIRST_MONDAY_SECS).rem_euclid(WEEK_SECS);
    (WEEKLY_CLOSE_OFFSET..WEEKLY_OPEN_OFFSET).contains(&offset)
}

/// Seconds of open market in `[from, to)`, both Unix seconds.
fn open_seconds(from: i64, to: i64) -> i64 {
    if to <= from {
        return 0;
    }
    let mut closed = 0;
    let mut week = from - (from - FIRST_MONDAY_SECS).rem_euclid(WEEK_SECS);
    while week < to {
        let start = (week + WEEKLY_CLOSE_OFFSET).max(from);
        let end = (week + WEEKLY_OPEN_OFFSET).min(to);
        if end > start {
            closed += end - start;
        }
        week += WEEK_SECS;
    }
    to - from - closed
}

/// Slots missing strictly between two real bars `step_secs` apart when complete.
fn missing_between(from: i64, to: i64, step_secs: i64) -> usize {
    let spanned = (open_seconds(from, to) as f64 / step_secs as f64).round() as i64;
    (spanned - 1).max(0) as usize
}

/// Count expected and missing slots for sorted, de-duplicated bars.
///
/// Placeholder bars are never present: they fall inside a span between real
/// bars, or count one slot each when they lead or trail the series.
pub fn gap_report(bars: &[Bar], timeframe: Timeframe) -> GapReport {
    let placeholder_bars = bars.iter().filter(|b| b.placeholder).count();
    let first_real = bars.iter().position(|b| !b.placeholder);
    let last_real = bars.iter().rposition(|b| !b.placeholder);
    let (Some(first), Some(last)) = (first_real, last_real) else {
        return GapReport {
            expected_slots: placeholder_bars,
            missing_slots: placeholder_bars,
            missing_fraction: if placeholder_bars == 0 { 0.0 } else { 1.0 },
            placeholder_bars,
            longest_gap: placeholder_bars,
        };
    };

    let step_secs = timeframe.duration().num_seconds();
    let leading = first;
    let trailing = bars.len() - 1 - last;

    let mut present = 1usize;
    let mut missing = leading + trailing;
    let mut longest = leading.max(trailing);
    let mut prev = bars[first].timestamp.timestamp();
    for bar in bars[first + 1..=last].iter().filter(|b| !b.placeholder) {
        let ts = bar.timestamp.timestamp();
        let gap = missing_between(prev, ts, step_secs);
        missing += gap;
        longest = longest.max(gap);
        present += 1;
        prev = ts;
    }

    let expected = present + missing;
    GapReport {
        expected_slots: expected,
        missing_slots: missing,
        missing_fraction: missing as f64 / expected as f64,
        placeholder_bars,
        longest_gap: longest,
    }
}
