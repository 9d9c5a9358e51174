//! Simulator state, run status and result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Bar, Direction, ExitReason, Position, TradeLedger};

/// Realized equity fell below zero on an exit. The run halted there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("account ruined at bar {bar_index} ({timestamp}): equity {terminal_equity:.2}")]
pub struct AccountRuinError {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub terminal_equity: f64,
}

/// The series never had enough bars for the strategy to become ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("insufficient warmup: {bars} bars, strategy needs {warmup_bars}")]
pub struct InsufficientWarmupError {
    pub bars: usize,
    pub warmup_bars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Blown {
        bar_index: usize,
        timestamp: DateTime<Utc>,
        terminal_equity: f64,
    },
}

impl RunStatus {
    pub fn is_blown(&self) -> bool {
        matches!(self, RunStatus::Blown { .. })
    }

    pub fn ruin_error(&self) -> Option<AccountRuinError> {
        match *self {
            RunStatus::Completed => None,
            RunStatus::Blown {
                bar_index,
                timestamp,
                terminal_equity,
            } => Some(AccountRuinError {
                bar_index,
                timestamp,
                terminal_equity,
            }),
        }
    }
}

/// An entry the strategy asked for but sizing rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub reason: String,
}

/// Mark-to-market equity at the close of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub ledger: TradeLedger,
    pub equity_curve: Vec<EquityPoint>,
    pub status: RunStatus,
    pub skipped_entries: Vec<SkippedEntry>,
    pub warmup_bars: usize,
    pub bars_processed: usize,
    pub placeholder_bars: usize,
    pub warmup_notice: Option<InsufficientWarmupError>,
}

impl SimulationResult {
    pub fn is_blown(&self) -> bool {
        self.status.is_blown()
    }

    pub fn final_equity(&self) -> f64 {
        self.ledger.final_equity()
    }

    pub fn trade_count(&self) -> usize {
        self.ledger.len()
    }
}

/// Everything that changes bar by bar. One per simulation; never shared.
#[derive(Debug, Clone)]
pub struct SimulatorState {
    pub equity: f64,
    pub position: Option<Position>,
    pub ledger: TradeLedger,
    pub equity_curve: Vec<EquityPoint>,
    pub skipped_entries: Vec<SkippedEntry>,
    pub status: RunStatus,
}

impl SimulatorState {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            equity: initial_equity,
            position: None,
            ledger: TradeLedger::new(initial_equity),
            equity_curve: Vec::new(),
            skipped_entries: Vec::new(),
            status: RunStatus::Completed,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn open(&mut self, position: Position) {
        debug!(
            bar = position.entry_index,
            direction = %position.direction,
            price = position.entry_price,
            size = position.size,
            stop = position.stop_price,
            "open position"
        );
        self.position = Some(position);
    }

    /// Close the open position (if any), realize PnL, and mark the run blown
    /// when realized equity goes negative.
    pub fn close(&mut self, price: f64, bar: &Bar, bar_index: usize, reason: ExitReason) {
        let Some(position) = self.position.take() else {
            return;
        };
        let trade = position.close(price, bar.timestamp, bar_index, reason);
        debug!(
            bar = bar_index,
            direction = %trade.direction,
            price,
            pnl = trade.pnl,
            reason = %reason,
            "close position"
        );
        self.equity += trade.pnl;
        self.ledger.push(trade);
        if self.equity < 0.0 {
            self.status = RunStatus::Blown {
                bar_index,
                timestamp: bar.timestamp,
                terminal_equity: self.equity,
            };
        }
    }

    /// Record mark-to-market equity at the bar close.
    pub fn mark(&mut self, bar: &Bar, bar_index: usize) {
        let unrealized = self
            .position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(bar.close));
        self.equity_curve.push(EquityPoint {
            bar_index,
            timestamp: bar.timestamp,
            equity: self.equity + unrealized,
        });
    }

    pub fn skip(&mut self, bar: &Bar, bar_index: usize, direction: Direction, reason: String) {
        self.skipped_entries.push(SkippedEntry {
            bar_index,
            timestamp: bar.timestamp,
            direction,
            reason,
        });
    }
}
