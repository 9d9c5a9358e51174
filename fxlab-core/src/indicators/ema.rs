//! Exponential Moving Average (EMA).
//!
//! Seed: EMA[period-1] = SMA of the first `period` closes.
//! Then EMA[t] = EMA[t-1] + alpha * (close[t] - EMA[t-1]), alpha = 2/(period+1).
//! Lookback: period - 1.
//!
//! The incremental form keeps a constant input exactly constant, so two EMAs of
//! a flat series compare equal instead of drifting apart by rounding.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    name: String,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "EMA period must be >= 1");
        Self {
            period,
            name: format!("ema_{period}"),
        }
    }
}

impl Indicator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        ema_of_series(&closes, self.period)
    }
}

/// EMA over an arbitrary series. NaN after the seed taints everything after it.
pub fn ema_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    let seed_window = &values[..period];
    if seed_window.iter().any(|v| v.is_nan()) {
        return result;
    }
    let seed = seed_window.iter().sum::<f64>() / period as f64;
    result[period - 1] = seed;

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = seed;
    for i in period..n {
        if values[i].is_nan() {
            return result;
        }
        let ema = prev + alpha * (values[i] - prev);
        result[i] = ema;
        prev = ema;
    }

    result
}
