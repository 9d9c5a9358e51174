//! Stop-loss and take-profit placement rules.
//!
//! A strategy's own `stop_price` / `target_price` suggestion always wins; the
//! run's rules fill in whatever the signal leaves open.

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::indicators::{IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StopRule {
    /// Stop a fixed price distance from entry.
    FixedDistance { distance: f64 },
    /// Stop `multiple` × ATR(`period`) from entry, ATR read at the entry bar.
    AtrMultiple { period: usize, multiple: f64 },
}

impl Default for StopRule {
    fn default() -> Self {
        StopRule::AtrMultiple {
            period: 14,
            multiple: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum TargetRule {
    /// No take-profit; exits come from the stop, a signal flip or end of data.
    #[default]
    None,
    /// Target at `multiple` × the initial risk (entry-to-stop distance).
    RiskMultiple { multiple: f64 },
    FixedDistance { distance: f64 },
    AtrMultiple { period: usize, multiple: f64 },
}

fn positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

impl StopRule {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            StopRule::FixedDistance { distance } if !positive(distance) => {
                Err(format!("stop distance must be positive, got {distance}"))
            }
            StopRule::AtrMultiple { period, .. } if period == 0 => {
                Err("stop ATR period must be >= 1".into())
            }
            StopRule::AtrMultiple { multiple, .. } if !positive(multiple) => {
                Err(format!("stop ATR multiple must be positive, got {multiple}"))
            }
            _ => Ok(()),
        }
    }

    pub fn required_indicators(&self) -> Vec<IndicatorSpec> {
        match *self {
            StopRule::FixedDistance { .. } => Vec::new(),
            StopRule::AtrMultiple { period, .. } => vec![IndicatorSpec::atr(period)],
        }
    }

    /// Stop price for an entry at `entry` on bar `i`; `None` if the ATR is undefined.
    pub fn stop_price(
        &self,
        direction: Direction,
        entry: f64,
        frame: &IndicatorFrame,
        i: usize,
    ) -> Option<f64> {
        let distance = match *self {
            StopRule::FixedDistance { distance } => distance,
            StopRule::AtrMultiple { period, multiple } => {
                multiple * frame.value_of(&IndicatorSpec::atr(period), i)?
            }
        };
        Some(entry - direction.sign() * distance)
    }
}

impl TargetRule {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            TargetRule::None => Ok(()),
            TargetRule::RiskMultiple { multiple } if !positive(multiple) => {
                Err(format!("target risk multiple must be positive, got {multiple}"))
            }
            TargetRule::FixedDistance { distance } if !positive(distance) => {
                Err(format!("target distance must be positive, got {distance}"))
            }
            TargetRule::AtrMultiple { period, .. } if period == 0 => {
                Err("target ATR period must be >= 1".into())
            }
            TargetRule::AtrMultiple { multiple, .. } if !positive(multiple) => {
                Err(format!("target ATR multiple must be positive, got {multiple}"))
            }
            _ => Ok(()),
        }
    }

    pub fn required_indicators(&self) -> Vec<IndicatorSpec> {
        match *self {
            TargetRule::AtrMultiple { period, .. } => vec![IndicatorSpec::atr(period)],
            _ => Vec::new(),
        }
    }

    /// Target price for an entry at `entry` with the given stop, if any.
    pub fn target_price(
        &self,
        direction: Direction,
        entry: f64,
        stop: f64,
        frame: &IndicatorFrame,
        i: usize,
    ) -> Option<f64> {
        let distance = match *self {
            TargetRule::None => return None,
            TargetRule::RiskMultiple { multiple } => multiple * (entry - stop).abs(),
            TargetRule::FixedDistance { distance } => distance,
            TargetRule::AtrMultiple { period, multiple } => {
                multiple * frame.value_of(&IndicatorSpec::atr(period), i)?
            }
        };
        Some(entry + direction.sign() * distance)
    }
}
