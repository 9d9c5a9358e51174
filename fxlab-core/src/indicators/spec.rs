//! IndicatorSpec — a closed, serializable description of one indicator column.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    Adx, Atr, Bollinger, BollingerBand, Donchian, DonchianBand, Ema, Indicator, Rsi, Sma,
};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorSpecError {
    #[error("{indicator}: period must be >= 1")]
    ZeroPeriod { indicator: &'static str },
    #[error("bollinger: width must be positive and finite, got {0}")]
    InvalidWidth(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Sma {
        period: usize,
    },
    Ema {
        period: usize,
    },
    Rsi {
        period: usize,
    },
    Atr {
        period: usize,
    },
    Bollinger {
        period: usize,
        width: f64,
        band: BollingerBand,
    },
    Adx {
        period: usize,
    },
    Donchian {
        period: usize,
        band: DonchianBand,
        #[serde(default)]
        exclude_current: bool,
    },
}

impl IndicatorSpec {
    fn period(&self) -> usize {
        match self {
            IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Rsi { period }
            | IndicatorSpec::Atr { period }
            | IndicatorSpec::Bollinger { period, .. }
            | IndicatorSpec::Adx { period }
            | IndicatorSpec::Donchian { period, .. } => *period,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            IndicatorSpec::Sma { .. } => "sma",
            IndicatorSpec::Ema { .. } => "ema",
            IndicatorSpec::Rsi { .. } => "rsi",
            IndicatorSpec::Atr { .. } => "atr",
            IndicatorSpec::Bollinger { .. } => "bollinger",
            IndicatorSpec::Adx { .. } => "adx",
            IndicatorSpec::Donchian { .. } => "donchian",
        }
    }

    pub fn validate(&self) -> Result<(), IndicatorSpecError> {
        if self.period() == 0 {
            return Err(IndicatorSpecError::ZeroPeriod {
                indicator: self.kind(),
            });
        }
        if let IndicatorSpec::Bollinger { width, .. } = self {
            if !(width.is_finite() && *width > 0.0) {
                return Err(IndicatorSpecError::InvalidWidth(*width));
            }
        }
        Ok(())
    }

    /// Build the concrete indicator.
    ///
    /// # Panics
    /// On a zero period. Call [`IndicatorSpec::validate`] first
    /// for specs that come from user input.
    pub fn build(&self) -> Box<dyn Indicator> {
        match *self {
            IndicatorSpec::Sma { period } => Box::new(Sma::new(period)),
            IndicatorSpec::Ema { period } => Box::new(Ema::new(period)),
            IndicatorSpec::Rsi { period } => Box::new(Rsi::new(period)),
            IndicatorSpec::Atr { period } => Box::new(Atr::new(period)),
            IndicatorSpec::Bollinger {
                period,
                width,
                band,
            } => Box::new(Bollinger::new(period, width, band)),
            IndicatorSpec::Adx { period } => Box::new(Adx::new(period)),
            IndicatorSpec::Donchian {
                period,
                band,
                exclude_current,
            } => Box::new(Donchian::new(period, band, exclude_current)),
        }
    }

    /// Canonical column key, e.g. `ema_8`, `atr_14`, `donchian_upper_20_prev`.
    pub fn key(&self) -> String {
        self.build().name().to_string()
    }

    /// Index of the first defined value on a series without placeholders.
    pub fn lookback(&self) -> usize {
        self.build().lookback()
    }

    // ─── Shorthand constructors ───

    pub fn sma(period: usize) -> Self {
        IndicatorSpec::Sma { period }
    }

    pub fn ema(period: usize) -> Self {
        IndicatorSpec::Ema { period }
    }

    pub fn rsi(period: usize) -> Self {
        IndicatorSpec::Rsi { period }
    }

    pub fn atr(period: usize) -> Self {
        IndicatorSpec::Atr { period }
    }

    pub fn adx(period: usize) -> Self {
        IndicatorSpec::Adx { period }
    }

    pub fn bollinger(period: usize, width: f64, band: BollingerBand) -> Self {
        IndicatorSpec::Bollinger {
            period,
            width,
            band,
        }
    }

    pub fn donchian(period: usize, band: DonchianBand, exclude_current: bool) -> Self {
        IndicatorSpec::Donchian {
            period,
            band,
            exclude_current,
        }
    }
}
