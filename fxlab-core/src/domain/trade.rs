//! Trade — a completed round-trip, and the append-only ledger of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of an open position or a completed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1 for long, -1 for short. Multiplies a price move into a PnL sign.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => f.write_str("long"),
            Direction::Short => f.write_str("short"),
        }
    }
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SignalFlip,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::SignalFlip => "signal_flip",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete round-trip trade: entry → exit.
///
/// `pnl` is in account currency; `pnl_pct` is the same PnL as a percentage of
/// account equity at the moment of entry (the per-trade return used by metrics
/// and Monte Carlo).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_index: usize,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_index: usize,
    pub exit_price: f64,

    // ── Size / side ──
    pub direction: Direction,
    pub size: f64,

    // ── PnL ──
    pub pnl: f64,
    pub pnl_pct: f64,

    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn bars_held(&self) -> usize {
        self.exit_index.saturating_sub(self.entry_index)
    }

    /// Per-trade return as a fraction (`pnl_pct / 100`).
    pub fn return_fraction(&self) -> f64 {
        self.pnl_pct / 100.0
    }
}

/// Ordered, append-only record of completed trades for one run.
///
/// Only the simulator appends; everything downstream reads the slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    initial_equity: f64,
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            initial_equity,
            trades: Vec::new(),
        }
    }

    /// Rebuild a ledger from persisted trades (artifact reload, Monte Carlo input).
    pub fn from_trades(initial_equity: f64, trades: Vec<Trade>) -> Self {
        Self {
            initial_equity,
            trades,
        }
    }

    pub(crate) fn push(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn initial_equity(&self) -> f64 {
        self.initial_equity
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn final_equity(&self) -> f64 {
        self.initial_equity + self.total_pnl()
    }

    /// Per-trade returns in percent of equity at entry.
    pub fn returns_pct(&self) -> Vec<f64> {
        self.trades.iter().map(|t| t.pnl_pct).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_trade(pnl: f64) -> Trade {
        Trade {
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap(),
            entry_index: 4,
            entry_price: 1.1000,
            exit_time: Utc.with_ymd_and_hms(2024, 1, 2, 14, 0, 0).unwrap(),
            exit_index: 8,
            exit_price: 1.1050,
            direction: Direction::Long,
            size: 20_000.0,
            pnl,
            pnl_pct: pnl / 100.0,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn direction_sign_and_opposite() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Long.opposite(), Direction::Short);
    }

    #[test]
    fn exit_reason_serializes_snake_case() {
        let json = serde_json::to_string(&ExitReason::EndOfData).unwrap();
        assert_eq!(json, "\"end_of_data\"");
        assert_eq!(ExitReason::StopLoss.to_string(), "stop_loss");
    }

    #[test]
    fn trade_helpers() {
        let trade = sample_trade(100.0);
        assert!(trade.is_winner());
        assert_eq!(trade.bars_held(), 4);
        assert!((trade.return_fraction() - 0.01).abs() < 1e-12);
        assert!(!sample_trade(0.0).is_winner());
    }

    #[test]
    fn ledger_totals() {
        let mut ledger = TradeLedger::new(10_000.0);
        ledger.push(sample_trade(100.0));
        ledger.push(sample_trade(-40.0));
        assert_eq!(ledger.len(), 2);
        assert!((ledger.total_pnl() - 60.0).abs() < 1e-12);
        assert!((ledger.final_equity() - 10_060.0).abs() < 1e-12);
        assert_eq!(ledger.returns_pct(), vec![1.0, -0.4]);
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade(100.0);
        let json = serde_json::to_string(&trade).unwrap();
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
