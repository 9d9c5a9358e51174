//! Performance metrics — pure functions over a trade ledger.
//!
//! Every statistic uses the per-trade-return basis: `r = pnl_pct`, each
//! trade's PnL as a percentage of equity at its entry. Nothing is resampled
//! to a calendar, so the bars-per-year of the data never enters the math;
//! `periods_per_year` only scales Sharpe.

use std::fmt;

use serde::{Deserialize, Serialize};

use fxlab_core::domain::{Trade, TradeLedger};

/// Label written next to every drawdown figure.
pub const DRAWDOWN_BASIS: &str = "cumulative_trade_return_pct";

fn default_periods_per_year() -> f64 {
    252.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Annualisation factor for Sharpe.
    #[serde(default = "default_periods_per_year")]
    pub periods_per_year: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            periods_per_year: default_periods_per_year(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(format!(
                "periods_per_year must be positive, got {}",
                self.periods_per_year
            ));
        }
        Ok(())
    }
}

/// Gross profit over gross loss, with the degenerate cases named.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfitFactor {
    Value(f64),
    /// Profits and no losses.
    Infinite,
    /// Neither profits nor losses.
    Undefined,
}

impl ProfitFactor {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ProfitFactor::Value(v) => Some(v),
            ProfitFactor::Infinite => Some(f64::INFINITY),
            ProfitFactor::Undefined => None,
        }
    }
}

impl fmt::Display for ProfitFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfitFactor::Value(v) => write!(f, "{v:.3}"),
            ProfitFactor::Infinite => f.write_str("inf"),
            ProfitFactor::Undefined => f.write_str("n/a"),
        }
    }
}

/// Aggregate statistics for one run. Derived from the ledger, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub trade_count: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,
    pub sharpe: f64,
    /// Positive magnitude, in percentage points of cumulative trade return.
    pub max_drawdown_pct: f64,
    pub drawdown_basis: String,
    pub profit_factor: ProfitFactor,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    /// Mean PnL per trade, in account currency.
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_bars_held: f64,
}

/// Compute every metric from a ledger.
pub fn compute_metrics(ledger: &TradeLedger, config: &MetricsConfig) -> PerformanceReport {
    let trades = ledger.trades();
    let returns = ledger.returns_pct();
    let wins = trades.iter().filter(|t| t.pnl > 0.0).count();
    let losses = trades.iter().filter(|t| t.pnl < 0.0).count();

    PerformanceReport {
        trade_count: trades.len(),
        wins,
        losses,
        win_rate: win_rate(trades),
        initial_equity: ledger.initial_equity(),
        final_equity: ledger.final_equity(),
        total_pnl: ledger.total_pnl(),
        total_return_pct: total_return_pct(ledger),
        sharpe: sharpe_ratio(&returns, config.periods_per_year),
        max_drawdown_pct: max_drawdown_pct(&returns),
        drawdown_basis: DRAWDOWN_BASIS.to_string(),
        profit_factor: profit_factor(trades),
        gross_profit: gross_profit(trades),
        gross_loss: gross_loss(trades),
        avg_win: avg_win(trades),
        avg_loss: avg_loss(trades),
        expectancy: expectancy(trades),
        max_consecutive_wins: max_consecutive_wins(trades),
        max_consecutive_losses: max_consecutive_losses(trades),
        avg_bars_held: avg_bars_held(trades),
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Win rate: fraction of trades with `pnl > 0`. 0.0 with no trades.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Total return in percent of initial equity.
pub fn total_return_pct(ledger: &TradeLedger) -> f64 {
    let initial = ledger.initial_equity();
    if initial <= 0.0 {
        return 0.0;
    }
    ledger.total_pnl() / initial * 100.0
}

/// Annualized Sharpe ratio over per-trade returns.
///
/// Sharpe = mean(r) / std(r) * sqrt(periods_per_year), sample std.
/// Returns 0.0 if variance is zero or there are fewer than 2 trades.
pub fn sharpe_ratio(returns_pct: &[f64], periods_per_year: f64) -> f64 {
    if returns_pct.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(returns_pct);
    let std = std_dev(returns_pct);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * periods_per_year.sqrt()
}

/// Deepest peak-to-trough fall of the running sum of per-trade returns,
/// starting from 0. Positive magnitude in percentage points.
pub fn max_drawdown_pct(returns_pct: &[f64]) -> f64 {
    let mut cumulative = 0.0_f64;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for r in returns_pct {
        cumulative += r;
        if cumulative > peak {
            peak = cumulative;
        }
        let dd = peak - cumulative;
        if dd > max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

pub fn gross_profit(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum()
}

/// Sum of losing PnL as a positive number.
pub fn gross_loss(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.pnl < 0.0).map(|t| -t.pnl).sum()
}

pub fn profit_factor(trades: &[Trade]) -> ProfitFactor {
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    match (profit > 0.0, loss > 0.0) {
        (_, true) => ProfitFactor::Value(profit / loss),
        (true, false) => ProfitFactor::Infinite,
        (false, false) => ProfitFactor::Undefined,
    }
}

/// Mean PnL of winning trades. 0.0 with none.
pub fn avg_win(trades: &[Trade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
    mean_f64(&wins)
}

/// Mean PnL of losing trades (negative). 0.0 with none.
pub fn avg_loss(trades: &[Trade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).collect();
    mean_f64(&losses)
}

pub fn expectancy(trades: &[Trade]) -> f64 {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    mean_f64(&pnls)
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_consecutive(trades, true)
}

/// Maximum consecutive non-winning trades.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_consecutive(trades, false)
}

pub fn avg_bars_held(trades: &[Trade]) -> f64 {
    let held: Vec<f64> = trades.iter().map(|t| t.bars_held() as f64).collect();
    mean_f64(&held)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            if current > max_streak {
                max_streak = current;
            }
        } else {
            current = 0;
        }
    }
    max_streak
}
