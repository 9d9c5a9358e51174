//! Donchian Channel — highest high / lowest low over a window.
//!
//! With `exclude_current = false` the window is `[t-period+1, t]`
//! (lookback period - 1). With `exclude_current = true` it is `[t-period, t-1]`
//! (lookback period): the channel a breakout at bar t is measured against,
//! built only from earlier bars.

use serde::{Deserialize, Serialize};

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonchianBand {
    Upper,
    Lower,
}

impl DonchianBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonchianBand::Upper => "upper",
            DonchianBand::Lower => "lower",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    exclude_current: bool,
    name: String,
}

impl Donchian {
    pub fn new(period: usize, band: DonchianBand, exclude_current: bool) -> Self {
        assert!(period >= 1, "Donchian period must be >= 1");
        let suffix = if exclude_current { "_prev" } else { "" };
        Self {
            period,
            band,
            exclude_current,
            name: format!("donchian_{}_{period}{suffix}", band.as_str()),
        }
    }

    pub fn upper(period: usize, exclude_current: bool) -> Self {
        Self::new(period, DonchianBand::Upper, exclude_current)
    }

    pub fn lower(period: usize, exclude_current: bool) -> Self {
        Self::new(period, DonchianBand::Lower, exclude_current)
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        if self.exclude_current {
            self.period
        } else {
            self.period - 1
        }
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        let shift = usize::from(self.exclude_current);

        for (i, slot) in result.iter_mut().enumerate().skip(self.lookback()) {
            let end = i - shift;
            let window = &bars[end + 1 - self.period..=end];
            *slot = match self.band {
                DonchianBand::Upper => window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
                DonchianBand::Lower => window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::make_bars;

    #[test]
    fn inclusive_channel() {
        // highs = max(open, close) + 1: 11, 12, 13, 13, 12
        let bars = make_bars(&[10.0, 11.0, 12.0, 11.0, 10.0]);
        let upper = Donchian::upper(3, false).compute(&bars);
        assert!(upper[1].is_nan());
        assert_eq!(upper[2], 13.0);
        assert_eq!(upper[4], 13.0);
    }

    #[test]
    fn shifted_channel_excludes_current_bar() {
        let bars = make_bars(&[10.0, 10.0, 10.0, 20.0]);
        let upper = Donchian::upper(3, true).compute(&bars);
        assert!(upper[2].is_nan());
        // window bars 0..=2 → high 11, bar 3 itself (high 21) excluded
        assert_eq!(upper[3], 11.0);
        let lower = Donchian::lower(3, true).compute(&bars);
        assert_eq!(lower[3], 9.0);
    }

    #[test]
    fn names() {
        assert_eq!(Donchian::upper(20, true).name(), "donchian_upper_20_prev");
        assert_eq!(Donchian::lower(55, false).name(), "donchian_lower_55");
    }
}
