//! Serializable strategy selection.
//!
//! A closed set of strategies with typed parameters. Unknown strategy names
//! and misspelled keys are rejected at deserialization; value ranges are
//! checked by [`StrategyConfig::validate`] before anything is built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{BollingerBreakout, DonchianBreakout, EmaCrossover, RsiReversion, SignalGenerator};
use crate::indicators::rsi::DEFAULT_RSI_PERIOD;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyConfigError {
    #[error("{strategy}: {message}")]
    InvalidParameter {
        strategy: &'static str,
        message: String,
    },
}

fn invalid(strategy: &'static str, message: impl Into<String>) -> StrategyConfigError {
    StrategyConfigError::InvalidParameter {
        strategy,
        message: message.into(),
    }
}

fn default_true() -> bool {
    true
}

fn default_confirm_bars() -> usize {
    1
}

fn default_rsi_period() -> usize {
    DEFAULT_RSI_PERIOD
}

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

fn default_trend_ema() -> usize {
    200
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StrategyConfig {
    EmaCrossover {
        fast: usize,
        slow: usize,
        #[serde(default = "default_confirm_bars")]
        confirm_bars: usize,
        #[serde(default = "default_true")]
        allow_short: bool,
    },
    BollingerBreakout {
        period: usize,
        width: f64,
        #[serde(default = "default_true")]
        allow_short: bool,
    },
    DonchianBreakout {
        period: usize,
        #[serde(default = "default_true")]
        allow_short: bool,
    },
    RsiReversion {
        #[serde(default = "default_rsi_period")]
        period: usize,
        #[serde(default = "default_oversold")]
        oversold: f64,
        #[serde(default = "default_overbought")]
        overbought: f64,
        #[serde(default = "default_trend_ema")]
        trend_ema: usize,
        #[serde(default = "default_true")]
        allow_short: bool,
    },
}

impl StrategyConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StrategyConfig::EmaCrossover { .. } => "ema_crossover",
            StrategyConfig::BollingerBreakout { .. } => "bollinger_breakout",
            StrategyConfig::DonchianBreakout { .. } => "donchian_breakout",
            StrategyConfig::RsiReversion { .. } => "rsi_reversion",
        }
    }

    /// Short human-readable label with parameters, used in sweep output.
    pub fn label(&self) -> String {
        match self {
            StrategyConfig::EmaCrossover {
                fast,
                slow,
                confirm_bars,
                allow_short,
            } => format!(
                "ema_crossover({fast},{slow},c{confirm_bars}{})",
                if *allow_short { "" } else { ",long" }
            ),
            StrategyConfig::BollingerBreakout {
                period,
                width,
                allow_short,
            } => format!(
                "bollinger_breakout({period},{width}{})",
                if *allow_short { "" } else { ",long" }
            ),
            StrategyConfig::DonchianBreakout {
                period,
                allow_short,
            } => format!(
                "donchian_breakout({period}{})",
                if *allow_short { "" } else { ",long" }
            ),
            StrategyConfig::RsiReversion {
                period,
                oversold,
                overbought,
                trend_ema,
                allow_short,
            } => format!(
                "rsi_reversion({period},{oversold},{overbought},{trend_ema}{})",
                if *allow_short { "" } else { ",long" }
            ),
        }
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        let kind = self.kind();
        match *self {
            StrategyConfig::EmaCrossover {
                fast,
                slow,
                confirm_bars,
                ..
            } => {
                if fast == 0 {
                    return Err(invalid(kind, "fast must be >= 1"));
                }
                if slow <= fast {
                    return Err(invalid(kind, format!("slow ({slow}) must exceed fast ({fast})")));
                }
                if !(1..=3).contains(&confirm_bars) {
                    return Err(invalid(
                        kind,
                        format!("confirm_bars must be 1..=3, got {confirm_bars}"),
                    ));
                }
            }
            StrategyConfig::BollingerBreakout { period, width, .. } => {
                if period < 2 {
                    return Err(invalid(kind, "period must be >= 2"));
                }
                if !(width.is_finite() && width > 0.0) {
                    return Err(invalid(kind, format!("width must be positive, got {width}")));
                }
            }
            StrategyConfig::DonchianBreakout { period, .. } => {
                if period == 0 {
                    return Err(invalid(kind, "period must be >= 1"));
                }
            }
            StrategyConfig::RsiReversion {
                period,
                oversold,
                overbought,
                trend_ema,
                ..
            } => {
                if period == 0 || trend_ema == 0 {
                    return Err(invalid(kind, "period and trend_ema must be >= 1"));
                }
                if !(0.0 < oversold && oversold < overbought && overbought < 100.0) {
                    return Err(invalid(
                        kind,
                        format!("need 0 < oversold ({oversold}) < overbought ({overbought}) < 100"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Validate, then construct the generator.
    pub fn build(&self) -> Result<Box<dyn SignalGenerator>, StrategyConfigError> {
        self.validate()?;
        let generator: Box<dyn SignalGenerator> = match *self {
            StrategyConfig::EmaCrossover {
                fast,
                slow,
                confirm_bars,
                allow_short,
            } => Box::new(EmaCrossover::new(fast, slow, confirm_bars, allow_short)),
            StrategyConfig::BollingerBreakout {
                period,
                width,
                allow_short,
            } => Box::new(BollingerBreakout::new(period, width, allow_short)),
            StrategyConfig::DonchianBreakout {
                period,
                allow_short,
            } => Box::new(DonchianBreakout::new(period, allow_short)),
            StrategyConfig::RsiReversion {
                period,
                oversold,
                overbought,
                trend_ema,
                allow_short,
            } => Box::new(RsiReversion::new(
                period,
                oversold,
                overbought,
                trend_ema,
                allow_short,
            )),
        };
        Ok(generator)
    }
}
