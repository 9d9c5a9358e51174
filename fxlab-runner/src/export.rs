//! Artifact export — JSON, CSV and Markdown files for one backtest run.
//!
//! An artifact directory holds:
//! - `trades.csv` / `trades.json` — the trade ledger
//! - `equity.csv` — bar-by-bar mark-to-market equity
//! - `report.json` — performance report and Monte Carlo summary
//! - `manifest.json` — run identity, status, config and data diagnostics
//! - `report.md` — human-readable summary
//!
//! Every JSON artifact carries a `schema_version`. Newer versions are
//! rejected on load. Floats are written in shortest round-trip form, so a
//! reloaded ledger is bit-identical to the one that was saved.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use fxlab_core::data::LoadReport;
use fxlab_core::domain::{Trade, TradeLedger};
use fxlab_core::engine::{EquityPoint, InsufficientWarmupError, RunStatus};

use crate::config::{RunConfig, RunId};
use crate::metrics::PerformanceReport;
use crate::monte_carlo::MonteCarloSummary;
use crate::runner::{BacktestResult, SCHEMA_VERSION};

pub const TRADES_CSV: &str = "trades.csv";
pub const TRADES_JSON: &str = "trades.json";
pub const EQUITY_CSV: &str = "equity.csv";
pub const REPORT_JSON: &str = "report.json";
pub const MANIFEST_JSON: &str = "manifest.json";
pub const REPORT_MD: &str = "report.md";

// ─── File layouts ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradesFile {
    pub schema_version: u32,
    pub initial_equity: f64,
    pub trades: Vec<Trade>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFile {
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy_label: String,
    pub status: RunStatus,
    pub report: PerformanceReport,
    pub monte_carlo: Option<MonteCarloSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub instrument: String,
    pub strategy_label: String,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: RunStatus,
    pub warmup_bars: usize,
    pub bars_processed: usize,
    pub placeholder_bars: usize,
    pub skipped_entries: usize,
    pub warmup_notice: Option<InsufficientWarmupError>,
    pub load_report: Option<LoadReport>,
    pub config: RunConfig,
    pub files: Vec<String>,
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates `{instrument}_{run_id prefix}/` under `output_dir`. Returns the
/// path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.instrument, short_id));
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    let sim = &result.simulation;

    write_trades_csv(&run_dir.join(TRADES_CSV), sim.ledger.trades())?;
    write_json(
        &run_dir.join(TRADES_JSON),
        &TradesFile {
            schema_version: SCHEMA_VERSION,
            initial_equity: sim.ledger.initial_equity(),
            trades: sim.ledger.trades().to_vec(),
        },
    )?;
    write_equity_csv(&run_dir.join(EQUITY_CSV), &sim.equity_curve)?;
    write_json(
        &run_dir.join(REPORT_JSON),
        &ReportFile {
            schema_version: SCHEMA_VERSION,
            run_id: result.run_id.clone(),
            strategy_label: result.strategy_label.clone(),
            status: sim.status.clone(),
            report: result.report.clone(),
            monte_carlo: result.monte_carlo.clone(),
        },
    )?;
    fs::write(run_dir.join(REPORT_MD), generate_report(result))
        .with_context(|| format!("failed to write {REPORT_MD}"))?;

    write_json(
        &run_dir.join(MANIFEST_JSON),
        &Manifest {
            schema_version: SCHEMA_VERSION,
            run_id: result.run_id.clone(),
            created_at: Utc::now(),
            instrument: result.instrument.clone(),
            strategy_label: result.strategy_label.clone(),
            dataset_hash: result.dataset_hash.clone(),
            bar_count: result.bar_count,
            start: result.start,
            end: result.end,
            status: sim.status.clone(),
            warmup_bars: sim.warmup_bars,
            bars_processed: sim.bars_processed,
            placeholder_bars: sim.placeholder_bars,
            skipped_entries: sim.skipped_entries.len(),
            warmup_notice: sim.warmup_notice.clone(),
            load_report: result.load_report.clone(),
            config: result.config.clone(),
            files: [TRADES_CSV, TRADES_JSON, EQUITY_CSV, REPORT_JSON, REPORT_MD]
                .iter()
                .map(|f| f.to_string())
                .collect(),
        },
    )?;

    Ok(run_dir)
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for trade in trades {
        wtr.serialize(trade)?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

fn write_equity_csv(path: &Path, curve: &[EquityPoint]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for point in curve {
        wtr.serialize(point)?;
    }
    wtr.flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

/// Read a trade tape written by [`save_artifacts`].
pub fn load_trades_csv(path: &Path) -> Result<Vec<Trade>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut trades = Vec::new();
    for (row, record) in rdr.deserialize::<Trade>().enumerate() {
        trades.push(record.with_context(|| format!("{}: bad trade row {row}", path.display()))?);
    }
    Ok(trades)
}

// ─── JSON ───────────────────────────────────────────────────────────

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn read_versioned<T: DeserializeOwned>(path: &Path, version: impl Fn(&T) -> u32) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: T = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    let found = version(&value);
    if found > SCHEMA_VERSION {
        bail!(
            "{}: unsupported schema version {} (max supported: {})",
            path.display(),
            found,
            SCHEMA_VERSION
        );
    }
    Ok(value)
}

/// Reload a ledger from `trades.json`.
pub fn load_trades_json(path: &Path) -> Result<TradeLedger> {
    let file: TradesFile = read_versioned(path, |f: &TradesFile| f.schema_version)?;
    Ok(TradeLedger::from_trades(file.initial_equity, file.trades))
}

pub fn load_report_json(path: &Path) -> Result<ReportFile> {
    read_versioned(path, |f: &ReportFile| f.schema_version)
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    read_versioned(path, |m: &Manifest| m.schema_version)
}

// ─── Markdown report ────────────────────────────────────────────────

/// Markdown summary for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let sim = &result.simulation;
    let m = &result.report;

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run | {} |\n", result.run_id));
    md.push_str(&format!(
        "| Instrument | {} {} |\n",
        result.instrument, result.config.data.timeframe
    ));
    md.push_str(&format!("| Period | {} to {} |\n", result.start, result.end));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy_label));
    md.push_str(&format!("| Initial Equity | {:.2} |\n", m.initial_equity));
    md.push_str(&format!(
        "| Bars | {} ({} warmup, {} placeholder) |\n",
        result.bar_count, sim.warmup_bars, sim.placeholder_bars
    ));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    md.push('\n');

    md.push_str("## Status\n\n");
    match &sim.status {
        RunStatus::Completed => md.push_str("Completed.\n"),
        RunStatus::Blown {
            bar_index,
            timestamp,
            terminal_equity,
        } => md.push_str(&format!(
            "**BLOWN** at bar {bar_index} ({timestamp}), terminal equity {terminal_equity:.2}.\n"
        )),
    }
    if let Some(notice) = &sim.warmup_notice {
        md.push_str(&format!("\nNote: {notice}.\n"));
    }
    if !sim.skipped_entries.is_empty() {
        md.push_str(&format!(
            "\n{} entries skipped by sizing.\n",
            sim.skipped_entries.len()
        ));
    }
    md.push('\n');

    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return_pct));
    md.push_str(&format!("| Final Equity | {:.2} |\n", m.final_equity));
    md.push_str(&format!("| Sharpe (per trade) | {:.3} |\n", m.sharpe));
    md.push_str(&format!(
        "| Max Drawdown | {:.2} pp ({}) |\n",
        m.max_drawdown_pct, m.drawdown_basis
    ));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {} |\n", m.profit_factor));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    md.push_str(&format!("| Expectancy | {:.2} |\n", m.expectancy));
    md.push_str(&format!(
        "| Max Consecutive Wins | {} |\n",
        m.max_consecutive_wins
    ));
    md.push_str(&format!(
        "| Max Consecutive Losses | {} |\n",
        m.max_consecutive_losses
    ));
    md.push_str(&format!("| Avg Bars Held | {:.1} |\n", m.avg_bars_held));
    md.push('\n');

    if let Some(mc) = &result.monte_carlo {
        md.push_str("## Monte Carlo\n\n");
        md.push_str(&format!(
            "{} {:?} runs, seed {}, {} trades.\n\n",
            mc.runs, mc.mode, mc.seed, mc.trade_count
        ));
        md.push_str("| Percentile | Final Return | Max Drawdown |\n");
        md.push_str("| --- | --- | --- |\n");
        for (label, ret, dd) in [
            ("5th", mc.final_return_pct.p5, mc.max_drawdown_pct.p5),
            ("25th", mc.final_return_pct.p25, mc.max_drawdown_pct.p25),
            ("50th", mc.final_return_pct.p50, mc.max_drawdown_pct.p50),
            ("75th", mc.final_return_pct.p75, mc.max_drawdown_pct.p75),
            ("95th", mc.final_return_pct.p95, mc.max_drawdown_pct.p95),
        ] {
            md.push_str(&format!("| {label} | {ret:.2}% | {dd:.2}% |\n"));
        }
        md.push_str(&format!(
            "\nSurvival rate: {:.1}% ({} ruined).\n",
            mc.survival_rate * 100.0,
            mc.ruined_runs
        ));
    }

    md
}
