//! Bollinger Bands — SMA of close ± width × population std-dev.
//!
//! One instance per band. Lookback: period - 1.

use serde::{Deserialize, Serialize};

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BollingerBand {
    Upper,
    Middle,
    Lower,
}

impl BollingerBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            BollingerBand::Upper => "upper",
            BollingerBand::Middle => "middle",
            BollingerBand::Lower => "lower",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    width: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, width: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        Self {
            period,
            width,
            band,
            name: format!("bollinger_{}_{period}_{width}", band.as_str()),
        }
    }

    pub fn upper(period: usize, width: f64) -> Self {
        Self::new(period, width, BollingerBand::Upper)
    }

    pub fn middle(period: usize, width: f64) -> Self {
        Self::new(period, width, BollingerBand::Middle)
    }

    pub fn lower(period: usize, width: f64) -> Self {
        Self::new(period, width, BollingerBand::Lower)
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        let p = self.period as f64;
        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let mean = window.iter().map(|b| b.close).sum::<f64>() / p;
            result[i] = match self.band {
                BollingerBand::Middle => mean,
                BollingerBand::Upper | BollingerBand::Lower => {
                    let variance = window
                        .iter()
                        .map(|b| {
                            let d = b.close - mean;
                            d * d
                        })
                        .sum::<f64>()
                        / p;
                    let offset = self.width * variance.sqrt();
                    if self.band == BollingerBand::Upper {
                        mean + offset
                    } else {
                        mean - offset
                    }
                }
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    #[test]
    fn middle_is_sma() {
        let bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let result = Bollinger::middle(3, 2.0).compute(&bars);
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn bands_use_population_stddev() {
        // window (10, 11, 12): mean 11, population variance 2/3
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let upper = Bollinger::upper(3, 2.0).compute(&bars);
        let lower = Bollinger::lower(3, 2.0).compute(&bars);
        let sd = (2.0f64 / 3.0).sqrt();
        assert_approx(upper[2], 11.0 + 2.0 * sd, DEFAULT_EPSILON);
        assert_approx(lower[2], 11.0 - 2.0 * sd, DEFAULT_EPSILON);
    }

    #[test]
    fn constant_price_collapses_bands() {
        let bars = make_bars(&[100.0; 4]);
        assert_approx(Bollinger::upper(3, 2.0).compute(&bars)[3], 100.0, DEFAULT_EPSILON);
        assert_approx(Bollinger::lower(3, 2.0).compute(&bars)[3], 100.0, DEFAULT_EPSILON);
    }

    #[test]
    fn names_include_band_and_width() {
        assert_eq!(Bollinger::upper(20, 2.0).name(), "bollinger_upper_20_2");
        assert_eq!(Bollinger::lower(20, 2.5).name(), "bollinger_lower_20_2.5");
    }
}
