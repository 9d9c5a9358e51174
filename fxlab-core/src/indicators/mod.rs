//! Indicator layer: pure functions from bars to numeric columns.
//!
//! Indicators are precomputed once per run into an [`IndicatorFrame`] and then
//! read by index. Multi-band indicators (Bollinger, Donchian) are exposed as one
//! instance per band so every indicator produces exactly one column.
//!
//! # Look-ahead contamination guard
//! No value at bar t may depend on bar t+1 or later. Every indicator must pass
//! the truncated-vs-full series test.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod donchian;
pub mod ema;
pub mod frame;
pub mod rsi;
pub mod sma;
pub mod spec;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::{Bollinger, BollingerBand};
pub use donchian::{Donchian, DonchianBand};
pub use ema::Ema;
pub use frame::{compute_indicators, compute_indicators_shared, IndicatorFrame};
pub use rsi::Rsi;
pub use sma::Sma;
pub use spec::{IndicatorSpec, IndicatorSpecError};

use crate::domain::Bar;

/// A single-column indicator.
///
/// `compute` returns a `Vec<f64>` the same length as `bars`; the first
/// `lookback()` entries are `f64::NAN` (warmup). Inputs never contain
/// placeholder bars: the frame strips them before computing.
pub trait Indicator: Send + Sync {
    /// Column key (e.g. "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Index of the first defined value on a gap-free input.
    fn lookback(&self) -> usize;

    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Synthetic hourly bars from close prices, for tests.
///
/// open = previous close (or close for the first bar),
/// high = max(open, close) + 1.0, low = min(open, close) - 1.0.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                start + Duration::hours(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
