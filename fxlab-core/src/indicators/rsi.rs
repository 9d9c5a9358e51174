//! Relative Strength Index (RSI), Wilder smoothing.
//!
//! Seed: mean gain / mean loss over the first `period` close-to-close changes.
//! RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Lookback: period.
//! Edge cases: avg_loss == 0 → 100; avg_gain == 0 → 0; both zero → 50.

use super::Indicator;
use crate::domain::Bar;

pub const DEFAULT_RSI_PERIOD: usize = 14;

#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    name: String,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "RSI period must be >= 1");
        Self {
            period,
            name: format!("rsi_{period}"),
        }
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self::new(DEFAULT_RSI_PERIOD)
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else if avg_gain == 0.0 {
        0.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

impl Indicator for Rsi {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period + 1 {
            return result;
        }

        let change = |i: usize| bars[i].close - bars[i - 1].close;

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=self.period {
            let ch = change(i);
            if ch.is_nan() {
                return result;
            }
            if ch > 0.0 {
                avg_gain += ch;
            } else {
                avg_loss -= ch;
            }
        }
        avg_gain /= self.period as f64;
        avg_loss /= self.period as f64;
        result[self.period] = rsi_value(avg_gain, avg_loss);

        let p = self.period as f64;
        for i in (self.period + 1)..n {
            let ch = change(i);
            if ch.is_nan() {
                return result;
            }
            let gain = ch.max(0.0);
            let loss = (-ch).max(0.0);
            avg_gain = (avg_gain * (p - 1.0) + gain) / p;
            avg_loss = (avg_loss * (p - 1.0) + loss) / p;
            result[i] = rsi_value(avg_gain, avg_loss);
        }

        result
    }
}
