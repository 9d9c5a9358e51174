//! Bar — the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV observation for one instrument at one timestamp.
///
/// A bar flagged `placeholder` was inserted by an upstream collaborator to keep
/// a timeline aligned. It carries no price action (`open == high == low == close`)
/// and is never treated as a real observation by indicators or the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub placeholder: bool,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            placeholder: false,
        }
    }

    /// True when every price and the volume are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }

    /// `low <= min(open, close) <= max(open, close) <= high`, positive prices,
    /// non-negative volume.
    pub fn is_sane(&self) -> bool {
        if !self.is_finite() {
            return false;
        }
        self.open > 0.0
            && self.high > 0.0
            && self.low > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
            && self.low <= self.open.min(self.close)
            && self.open.max(self.close) <= self.high
    }

    /// True when the bar has no intrabar movement at all.
    pub fn is_flat(&self) -> bool {
        self.open == self.high && self.high == self.low && self.low == self.close
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}
