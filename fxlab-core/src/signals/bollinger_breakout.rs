//! Bollinger Band breakout.
//!
//! Long when close crosses above the upper band (previous close at or below the
//! previous upper band). Short symmetric on the lower band. Suggested stop: the
//! middle band.

use super::{short_or_exit, Signal, SignalGenerator};
use crate::indicators::{BollingerBand, IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone)]
pub struct BollingerBreakout {
    pub period: usize,
    pub width: f64,
    pub allow_short: bool,
    upper_key: String,
    middle_key: String,
    lower_key: String,
}

impl BollingerBreakout {
    pub fn new(period: usize, width: f64, allow_short: bool) -> Self {
        assert!(period >= 2, "Bollinger breakout period must be >= 2");
        assert!(width > 0.0 && width.is_finite(), "width must be positive");
        Self {
            period,
            width,
            allow_short,
            upper_key: IndicatorSpec::bollinger(period, width, BollingerBand::Upper).key(),
            middle_key: IndicatorSpec::bollinger(period, width, BollingerBand::Middle).key(),
            lower_key: IndicatorSpec::bollinger(period, width, BollingerBand::Lower).key(),
        }
    }
}

impl SignalGenerator for BollingerBreakout {
    fn name(&self) -> &str {
        "bollinger_breakout"
    }

    fn required_indicators(&self) -> Vec<IndicatorSpec> {
        [BollingerBand::Upper, BollingerBand::Middle, BollingerBand::Lower]
            .into_iter()
            .map(|band| IndicatorSpec::bollinger(self.period, self.width, band))
            .collect()
    }

    fn warmup_bars(&self) -> usize {
        self.period
    }

    fn evaluate(&self, frame: &IndicatorFrame, i: usize) -> Signal {
        if i == 0 {
            return Signal::none();
        }
        let (Some(bar), Some(prev)) = (frame.bar(i), frame.bar(i - 1)) else {
            return Signal::none();
        };
        let values = (
            frame.value(&self.upper_key, i),
            frame.value(&self.middle_key, i),
            frame.value(&self.lower_key, i),
            frame.value(&self.upper_key, i - 1),
            frame.value(&self.lower_key, i - 1),
        );
        let (Some(upper), Some(middle), Some(lower), Some(prev_upper), Some(prev_lower)) = values
        else {
            return Signal::none();
        };

        if bar.close > upper && prev.close <= prev_upper {
            return Signal::long().with_stop(middle);
        }
        if bar.close < lower && prev.close >= prev_lower {
            return short_or_exit(self.allow_short).with_stop(middle);
        }
        Signal::none()
    }
}
