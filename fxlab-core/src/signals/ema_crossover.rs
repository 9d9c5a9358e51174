//! EMA crossover with confirmation.
//!
//! Long when `fast > slow` has held on each of the last `confirm_bars` bars and
//! did not hold at `i - confirm_bars` (a fresh, confirmed cross). Short is
//! symmetric with `fast < slow`.

use super::{short_or_exit, Signal, SignalGenerator};
use crate::indicators::{IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone)]
pub struct EmaCrossover {
    pub fast: usize,
    pub slow: usize,
    pub confirm_bars: usize,
    pub allow_short: bool,
    fast_key: String,
    slow_key: String,
}

impl EmaCrossover {
    pub fn new(fast: usize, slow: usize, confirm_bars: usize, allow_short: bool) -> Self {
        assert!(fast >= 1, "fast period must be >= 1");
        assert!(slow > fast, "slow period must be > fast period");
        assert!(
            (1..=3).contains(&confirm_bars),
            "confirm_bars must be in 1..=3"
        );
        Self {
            fast,
            slow,
            confirm_bars,
            allow_short,
            fast_key: IndicatorSpec::ema(fast).key(),
            slow_key: IndicatorSpec::ema(slow).key(),
        }
    }

    fn spread(&self, frame: &IndicatorFrame, i: usize) -> Option<f64> {
        let fast = frame.value(&self.fast_key, i)?;
        let slow = frame.value(&self.slow_key, i)?;
        Some(fast - slow)
    }
}

impl SignalGenerator for EmaCrossover {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn required_indicators(&self) -> Vec<IndicatorSpec> {
        vec![IndicatorSpec::ema(self.fast), IndicatorSpec::ema(self.slow)]
    }

    fn warmup_bars(&self) -> usize {
        IndicatorSpec::ema(self.slow).lookback() + self.confirm_bars
    }

    fn evaluate(&self, frame: &IndicatorFrame, i: usize) -> Signal {
        if i < self.confirm_bars {
            return Signal::none();
        }
        // spreads[0] is at i - confirm_bars, the last is at i.
        let mut spreads = Vec::with_capacity(self.confirm_bars + 1);
        for k in (i - self.confirm_bars)..=i {
            match self.spread(frame, k) {
                Some(s) => spreads.push(s),
                None => return Signal::none(),
            }
        }
        let (before, held) = spreads.split_at(1);

        if held.iter().all(|&s| s > 0.0) && before[0] <= 0.0 {
            return Signal::long();
        }
        if held.iter().all(|&s| s < 0.0) && before[0] >= 0.0 {
            return short_or_exit(self.allow_short);
        }
        Signal::none()
    }
}
