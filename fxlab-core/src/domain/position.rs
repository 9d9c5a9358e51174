use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::{Direction, ExitReason, Trade};

/// The single open position of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_index: usize,
    pub size: f64,
    pub stop_price: f64,
    pub target_price: Option<f64>,
    pub equity_at_entry: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.direction.sign() * (current_price - self.entry_price) * self.size
    }

    /// Close the position and produce the completed trade.
    pub fn close(
        self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        exit_index: usize,
        exit_reason: ExitReason,
    ) -> Trade {
        let pnl = self.unrealized_pnl(exit_price);
        let pnl_pct = if self.equity_at_entry > 0.0 {
            pnl / self.equity_at_entry * 100.0
        } else {
            0.0
        };
        Trade {
            entry_time: self.entry_time,
            entry_index: self.entry_index,
            entry_price: self.entry_price,
            exit_time,
            exit_index,
            exit_price,
            direction: self.direction,
            size: self.size,
            pnl,
            pnl_pct,
            exit_reason,
        }
    }
}
