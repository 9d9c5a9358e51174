//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), defined
//! from the second bar on. ATR is the simple rolling mean of the last `period`
//! true ranges, so the first value sits at index `period`.
//! Lookback: period.

use super::sma::sma_of_series;
use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// True range series. TR[0] is NaN (no previous close).
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    let n = bars.len();
    let mut tr = vec![f64::NAN; n];
    for i in 1..n {
        let h = bars[i].high;
        let l = bars[i].low;
        let pc = bars[i - 1].close;
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder smoothing (alpha = 1/period), seeded with the mean of the first
/// `period` values after the leading NaN run. A later NaN ends the series.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }
    let Some(start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = start + period;
    if seed_end > n {
        return result;
    }
    let seed_window = &values[start..seed_end];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }

    let p = period as f64;
    let mut prev = seed_window.iter().sum::<f64>() / p;
    result[seed_end - 1] = prev;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        prev = (prev * (p - 1.0) + values[i]) / p;
        result[i] = prev;
    }
    result
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let tr = true_range(bars);
        let n = tr.len();
        let mut result = vec![f64::NAN; n];
        if n <= self.period {
            return result;
        }
        // TR starts at index 1; average over TR[i-period+1..=i].
        let tail = sma_of_series(&tr[1..], self.period);
        result[1..].copy_from_slice(&tail);
        result
    }
}
