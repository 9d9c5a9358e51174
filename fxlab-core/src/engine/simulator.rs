//! The bar loop.
//!
//! Per bar, in fixed order:
//! 1. exits for a position opened on an earlier bar: stop, then target
//!    (intrabar, see [`super::exits`]), then signal flip at the close;
//! 2. if flat, not on the last real bar, and every required indicator is
//!    defined: enter on the bar's signal at the close.
//!
//! Placeholder bars are marked to market but never traded. After the loop an
//! open position is closed at the last real bar's close (`end_of_data`).

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::exits::check_intrabar_exit;
use super::rules::{StopRule, TargetRule};
use super::sizing::{InvalidRiskParameterError, SizingConfig, SizingPolicy};
use super::state::{InsufficientWarmupError, SimulationResult, SimulatorState};
use crate::domain::{Bar, BarSeries, ExitReason, Position};
use crate::indicators::{compute_indicators, IndicatorFrame, IndicatorSpec};
use crate::signals::{Signal, SignalGenerator};

pub const DEFAULT_INITIAL_EQUITY: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub initial_equity: f64,
    pub sizing: SizingConfig,
    pub stop: StopRule,
    pub target: TargetRule,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_equity: DEFAULT_INITIAL_EQUITY,
            sizing: SizingConfig::default(),
            stop: StopRule::default(),
            target: TargetRule::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.initial_equity.is_finite() && self.initial_equity > 0.0) {
            return Err(format!(
                "initial_equity must be positive, got {}",
                self.initial_equity
            ));
        }
        self.sizing.validate().map_err(|e| e.to_string())?;
        self.stop.validate()?;
        self.target.validate()
    }
}

/// Every indicator column the run needs: the strategy's plus the rules'.
pub fn required_indicators(
    generator: &dyn SignalGenerator,
    config: &SimulatorConfig,
) -> Vec<IndicatorSpec> {
    let mut specs = generator.required_indicators();
    specs.extend(config.stop.required_indicators());
    specs.extend(config.target.required_indicators());
    specs
}

/// Compute the frame for `series` and simulate.
pub fn simulate_series(
    series: &BarSeries,
    generator: &dyn SignalGenerator,
    config: &SimulatorConfig,
) -> SimulationResult {
    let frame = compute_indicators(series, &required_indicators(generator, config));
    simulate(&frame, generator, config)
}

/// Run one simulation over a precomputed frame.
///
/// The frame must contain the columns named by [`required_indicators`];
/// missing columns read as undefined, so the strategy never becomes ready.
pub fn simulate(
    frame: &IndicatorFrame,
    generator: &dyn SignalGenerator,
    config: &SimulatorConfig,
) -> SimulationResult {
    let required = required_indicators(generator, config);
    let sizing = config.sizing.build();
    let bars = frame.bars();
    let last_real = frame.series().last_real_index();

    let warmup_bars = required
        .iter()
        .map(|s| s.lookback())
        .max()
        .unwrap_or(0)
        .max(generator.warmup_bars());
    let warmup_notice = match frame.first_ready_index(&required) {
        Some(ready) if Some(ready) < last_real => None,
        _ => Some(InsufficientWarmupError {
            bars: bars.len(),
            warmup_bars,
        }),
    };
    if let Some(notice) = &warmup_notice {
        info!(
            instrument = frame.series().instrument(),
            strategy = generator.name(),
            "{notice}"
        );
    }

    let mut state = SimulatorState::new(config.initial_equity);
    let mut bars_processed = 0usize;
    let mut placeholder_bars = 0usize;

    for (i, bar) in bars.iter().enumerate() {
        bars_processed += 1;
        if bar.placeholder {
            placeholder_bars += 1;
            state.mark(bar, i);
            continue;
        }

        let signal = generator.evaluate(frame, i);

        // ── Exits ──
        let held = state.position.clone().filter(|p| p.entry_index < i);
        if let Some(position) = held {
            if let Some(exit) = check_intrabar_exit(&position, bar) {
                state.close(exit.price, bar, i, exit.reason);
            } else if signal.opposes(position.direction) {
                state.close(bar.close, bar, i, ExitReason::SignalFlip);
            }
            if state.status.is_blown() {
                state.mark(bar, i);
                warn!(
                    instrument = frame.series().instrument(),
                    bar = i,
                    timestamp = %bar.timestamp,
                    equity = state.equity,
                    "account ruined, halting run"
                );
                break;
            }
        }

        // ── Entry ──
        if state.is_flat()
            && Some(i) != last_real
            && signal.entry_allowed
            && frame.all_defined(&required, i)
        {
            try_enter(&mut state, frame, i, bar, &signal, config, sizing.as_ref());
        }

        state.mark(bar, i);
    }

    if !state.status.is_blown() {
        if let Some(last) = last_real {
            if state.position.is_some() {
                let bar = &bars[last];
                state.close(bar.close, bar, last, ExitReason::EndOfData);
            }
        }
    }

    SimulationResult {
        ledger: state.ledger,
        equity_curve: state.equity_curve,
        status: state.status,
        skipped_entries: state.skipped_entries,
        warmup_bars,
        bars_processed,
        placeholder_bars,
        warmup_notice,
    }
}

fn try_enter(
    state: &mut SimulatorState,
    frame: &IndicatorFrame,
    i: usize,
    bar: &Bar,
    signal: &Signal,
    config: &SimulatorConfig,
    sizing: &dyn SizingPolicy,
) {
    let Some(direction) = signal.direction.as_direction() else {
        return;
    };
    let entry = bar.close;
    let Some(stop) = signal
        .stop_price
        .or_else(|| config.stop.stop_price(direction, entry, frame, i))
    else {
        return;
    };
    let target = signal
        .target_price
        .or_else(|| config.target.target_price(direction, entry, stop, frame, i));

    let stop_distance = direction.sign() * (entry - stop);
    let sized = sizing.size(state.equity, stop_distance).and_then(|size| {
        match target.map(|t| direction.sign() * (t - entry)) {
            Some(d) if !(d > 0.0) => Err(InvalidRiskParameterError::NonPositiveTargetDistance(d)),
            _ => Ok(size),
        }
    });

    match sized {
        Ok(size) => state.open(Position {
            direction,
            entry_price: entry,
            entry_time: bar.timestamp,
            entry_index: i,
            size,
            stop_price: stop,
            target_price: target,
            equity_at_entry: state.equity,
        }),
        Err(err) => {
            warn!(
                instrument = frame.series().instrument(),
                bar = i,
                timestamp = %bar.timestamp,
                direction = %direction,
                error = %err,
                "entry skipped"
            );
            state.skip(bar, i, direction, err.to_string());
        }
    }
}
