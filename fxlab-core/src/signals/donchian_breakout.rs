//! Donchian channel breakout (turtle-style).
//!
//! Long when close exceeds the highest high of the prior `period` bars; short
//! when close falls below their lowest low. The channel excludes the current
//! bar. Suggested stop: the opposite channel.

use super::{short_or_exit, Signal, SignalGenerator};
use crate::indicators::{DonchianBand, IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone)]
pub struct DonchianBreakout {
    pub period: usize,
    pub allow_short: bool,
    upper_key: String,
    lower_key: String,
}

impl DonchianBreakout {
    pub fn new(period: usize, allow_short: bool) -> Self {
        assert!(period >= 1, "Donchian breakout period must be >= 1");
        Self {
            period,
            allow_short,
            upper_key: IndicatorSpec::donchian(period, DonchianBand::Upper, true).key(),
            lower_key: IndicatorSpec::donchian(period, DonchianBand::Lower, true).key(),
        }
    }
}

impl SignalGenerator for DonchianBreakout {
    fn name(&self) -> &str {
        "donchian_breakout"
    }

    fn required_indicators(&self) -> Vec<IndicatorSpec> {
        vec![
            IndicatorSpec::donchian(self.period, DonchianBand::Upper, true),
            IndicatorSpec::donchian(self.period, DonchianBand::Lower, true),
        ]
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn evaluate(&self, frame: &IndicatorFrame, i: usize) -> Signal {
        let Some(bar) = frame.bar(i) else {
            return Signal::none();
        };
        let (Some(upper), Some(lower)) = (
            frame.value(&self.upper_key, i),
            frame.value(&self.lower_key, i),
        ) else {
            return Signal::none();
        };

        if bar.close > upper {
            Signal::long().with_stop(lower)
        } else if bar.close < lower {
            short_or_exit(self.allow_short).with_stop(upper)
        } else {
            Signal::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BarSeries, Timeframe};
    use crate::indicators::{compute_indicators, make_bars};
    use crate::signals::SignalDirection;

    fn frame(closes: &[f64], strat: &DonchianBreakout) -> IndicatorFrame {
        let series = BarSeries::new("TEST", Timeframe::H1, make_bars(closes)).unwrap();
        compute_indicators(&series, &strat.required_indicators())
    }

    #[test]
    fn breakout_above_prior_high() {
        let strat = DonchianBreakout::new(5, true);
        let mut closes = vec![100.0; 10];
        closes.push(105.0);
        let f = frame(&closes, &strat);
        // prior highs are 101, close 105 breaks out; stop at prior lowest low 99
        let sig = strat.evaluate(&f, 10);
        assert_eq!(sig.direction, SignalDirection::Long);
        assert_eq!(sig.stop_price, Some(99.0));
        assert!(strat.evaluate(&f, 9).is_none());
    }

    #[test]
    fn breakout_below_prior_low() {
        let strat = DonchianBreakout::new(5, false);
        let mut closes = vec![100.0; 10];
        closes.push(95.0);
        let sig = strat.evaluate(&frame(&closes, &strat), 10);
        assert_eq!(sig.direction, SignalDirection::Short);
        assert!(!sig.entry_allowed);
        assert_eq!(sig.stop_price, Some(101.0));
    }

    #[test]
    fn none_during_warmup() {
        let strat = DonchianBreakout::new(5, true);
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64 * 3.0).collect();
        let f = frame(&closes, &strat);
        for i in 0..5 {
            assert!(strat.evaluate(&f, i).is_none());
        }
        assert_eq!(strat.evaluate(&f, 5).direction, SignalDirection::Long);
    }
}
