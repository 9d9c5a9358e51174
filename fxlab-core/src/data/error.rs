use chrono::{DateTime, Utc};
use thiserror::Error;

/// A hard failure of bar hygiene. Fatal to the run: bars are never repaired.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataIntegrityError {
    #[error("series is empty")]
    Empty,

    #[error("bar {index} at {timestamp}: non-finite price or volume")]
    NonFinite {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp}: prices must be positive")]
    NonPositivePrice {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp}: negative volume {volume}")]
    NegativeVolume {
        index: usize,
        timestamp: DateTime<Utc>,
        volume: f64,
    },

    #[error(
        "bar {index} at {timestamp}: OHLC invariant violated \
         (open={open}, high={high}, low={low}, close={close})"
    )]
    OhlcViolation {
        index: usize,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("bar {index} at {timestamp}: placeholder bar carries price action")]
    PlaceholderWithPriceAction {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp}: timestamp is not after previous bar at {previous}")]
    NonMonotonic {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },

    #[error(
        "{missing} of {expected} expected bars missing ({fraction:.4} > allowed {max_fraction:.4})"
    )]
    TooManyGaps {
        missing: usize,
        expected: usize,
        fraction: f64,
        max_fraction: f64,
    },
}

impl DataIntegrityError {
    /// Bar index the error points at, when it concerns a single bar.
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            DataIntegrityError::NonFinite { index, .. }
            | DataIntegrityError::NonPositivePrice { index, .. }
            | DataIntegrityError::NegativeVolume { index, .. }
            | DataIntegrityError::OhlcViolation { index, .. }
            | DataIntegrityError::PlaceholderWithPriceAction { index, .. }
            | DataIntegrityError::NonMonotonic { index, .. } => Some(*index),
            DataIntegrityError::Empty | DataIntegrityError::TooManyGaps { .. } => None,
        }
    }
}
