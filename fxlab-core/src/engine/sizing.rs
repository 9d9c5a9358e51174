//! Risk-based position sizing.
//!
//! # Formulas
//! ```text
//! fixed dollar:      size = risk_dollars / stop_distance
//! fixed fractional:  size = equity * risk_fraction / stop_distance
//! ```
//! A stop on the wrong side of the entry is a non-positive distance and is
//! rejected, as is non-positive risk.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_RISK_DOLLARS: f64 = 100.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRiskParameterError {
    #[error("stop distance must be positive, got {0}")]
    NonPositiveStopDistance(f64),
    #[error("target distance must be positive, got {0}")]
    NonPositiveTargetDistance(f64),
    #[error("risk amount must be positive, got {0}")]
    NonPositiveRisk(f64),
    #[error("computed size is not a positive finite number: {0}")]
    InvalidSize(f64),
}

/// Turns a stop distance into a position size.
pub trait SizingPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `equity` is the account equity at the moment of entry.
    fn size(&self, equity: f64, stop_distance: f64) -> Result<f64, InvalidRiskParameterError>;
}

fn checked_size(risk: f64, stop_distance: f64) -> Result<f64, InvalidRiskParameterError> {
    if !(stop_distance > 0.0) || !stop_distance.is_finite() {
        return Err(InvalidRiskParameterError::NonPositiveStopDistance(stop_distance));
    }
    if !(risk > 0.0) || !risk.is_finite() {
        return Err(InvalidRiskParameterError::NonPositiveRisk(risk));
    }
    let size = risk / stop_distance;
    if !size.is_finite() || size <= 0.0 {
        return Err(InvalidRiskParameterError::InvalidSize(size));
    }
    Ok(size)
}

/// Risk the same dollar amount on every trade.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedDollar {
    pub risk_dollars: f64,
}

impl SizingPolicy for FixedDollar {
    fn name(&self) -> &str {
        "fixed_dollar"
    }

    fn size(&self, _equity: f64, stop_distance: f64) -> Result<f64, InvalidRiskParameterError> {
        checked_size(self.risk_dollars, stop_distance)
    }
}

/// Risk a fixed fraction of current equity on every trade.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedFractional {
    pub risk_fraction: f64,
}

impl SizingPolicy for FixedFractional {
    fn name(&self) -> &str {
        "fixed_fractional"
    }

    fn size(&self, equity: f64, stop_distance: f64) -> Result<f64, InvalidRiskParameterError> {
        checked_size(equity * self.risk_fraction, stop_distance)
    }
}

/// Serializable sizing choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SizingConfig {
    FixedDollar { risk_dollars: f64 },
    FixedFractional { risk_fraction: f64 },
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig::FixedDollar {
            risk_dollars: DEFAULT_RISK_DOLLARS,
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), InvalidRiskParameterError> {
        let risk = match *self {
            SizingConfig::FixedDollar { risk_dollars } => risk_dollars,
            SizingConfig::FixedFractional { risk_fraction } => risk_fraction,
        };
        if !(risk > 0.0) || !risk.is_finite() {
            return Err(InvalidRiskParameterError::NonPositiveRisk(risk));
        }
        Ok(())
    }

    pub fn build(&self) -> Box<dyn SizingPolicy> {
        match *self {
            SizingConfig::FixedDollar { risk_dollars } => Box::new(FixedDollar { risk_dollars }),
            SizingConfig::FixedFractional { risk_fraction } => {
                Box::new(FixedFractional { risk_fraction })
            }
        }
    }
}
