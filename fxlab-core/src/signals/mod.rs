//! Signal generation — portfolio-agnostic, lookahead-free market timing.
//!
//! A generator sees only the indicator frame and a bar index. It never sees
//! the position, equity or ledger, and may only read indices `<= i`.

pub mod bollinger_breakout;
pub mod config;
pub mod donchian_breakout;
pub mod ema_crossover;
pub mod rsi_reversion;

pub use bollinger_breakout::BollingerBreakout;
pub use config::{StrategyConfig, StrategyConfigError};
pub use donchian_breakout::DonchianBreakout;
pub use ema_crossover::EmaCrossover;
pub use rsi_reversion::RsiReversion;

use serde::{Deserialize, Serialize};

use crate::domain::Direction;
use crate::indicators::{IndicatorFrame, IndicatorSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    None,
    Long,
    Short,
}

impl SignalDirection {
    pub fn as_direction(&self) -> Option<Direction> {
        match self {
            SignalDirection::None => None,
            SignalDirection::Long => Some(Direction::Long),
            SignalDirection::Short => Some(Direction::Short),
        }
    }
}

/// The decision at one bar. Produced fresh every bar; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: SignalDirection,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub stop_price: Option<f64>,
    pub target_price: Option<f64>,
    /// False when the signal may close an opposite position but must not open
    /// one (a long-only strategy reporting a bearish condition).
    pub entry_allowed: bool,
}

impl Signal {
    pub fn none() -> Self {
        Self {
            direction: SignalDirection::None,
            confidence: 0.0,
            stop_price: None,
            target_price: None,
            entry_allowed: false,
        }
    }

    pub fn long() -> Self {
        Self::directional(SignalDirection::Long)
    }

    pub fn short() -> Self {
        Self::directional(SignalDirection::Short)
    }

    fn directional(direction: SignalDirection) -> Self {
        Self {
            direction,
            confidence: 1.0,
            stop_price: None,
            target_price: None,
            entry_allowed: true,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_stop(mut self, stop_price: f64) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    pub fn with_target(mut self, target_price: f64) -> Self {
        self.target_price = Some(target_price);
        self
    }

    pub fn exit_only(mut self) -> Self {
        self.entry_allowed = false;
        self
    }

    pub fn is_none(&self) -> bool {
        self.direction == SignalDirection::None
    }

    /// True when this signal favors the side opposite `held`.
    pub fn opposes(&self, held: Direction) -> bool {
        self.direction.as_direction() == Some(held.opposite())
    }
}

/// Pluggable strategy logic.
///
/// # Invariants
/// - `evaluate(frame, i)` reads nothing after index `i`
/// - returns [`Signal::none`] whenever a value it needs is undefined
/// - deterministic for the same frame
pub trait SignalGenerator: Send + Sync {
    fn name(&self) -> &str;

    /// Indicator columns this generator reads.
    fn required_indicators(&self) -> Vec<IndicatorSpec>;

    /// Bars needed before the first possible non-none signal on a gap-free series.
    fn warmup_bars(&self) -> usize;

    fn evaluate(&self, frame: &IndicatorFrame, i: usize) -> Signal;
}

/// A short signal for bidirectional strategies, exit-only for long-only ones.
pub(crate) fn short_or_exit(allow_short: bool) -> Signal {
    if allow_short {
        Signal::short()
    } else {
        Signal::short().exit_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_signal_never_enters() {
        let s = Signal::none();
        assert!(s.is_none());
        assert!(!s.entry_allowed);
        assert!(!s.opposes(Direction::Long));
    }

    #[test]
    fn opposes_opposite_side() {
        assert!(Signal::short().opposes(Direction::Long));
        assert!(!Signal::long().opposes(Direction::Long));
        assert!(Signal::long().opposes(Direction::Short));
    }

    #[test]
    fn builder_clamps_confidence() {
        let s = Signal::long().with_confidence(1.7).with_stop(99.0);
        assert_eq!(s.confidence, 1.0);
        assert_eq!(s.stop_price, Some(99.0));
        assert!(short_or_exit(false).opposes(Direction::Long));
        assert!(!short_or_exit(false).entry_allowed);
    }

    /// SignalGenerator takes only the frame and an index: no position,
    /// equity or ledger can reach strategy logic.
    #[test]
    fn signal_generator_has_no_portfolio_parameter() {
        fn _check(sig: &dyn SignalGenerator, frame: &IndicatorFrame) -> Signal {
            sig.evaluate(frame, 0)
        }
    }
}
