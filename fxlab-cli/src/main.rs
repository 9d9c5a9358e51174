//! FxLab CLI — run, sweep, validate and monte-carlo commands.
//!
//! Commands:
//! - `run` — execute one backtest from a TOML config and save its artifacts
//! - `sweep` — run every dataset × strategy scenario of a sweep config
//! - `validate` — load a CSV through the hygiene layer and print the report
//! - `monte-carlo` — resample an exported trade list
//!
//! Data-integrity failures and account ruin exit with a non-zero status after
//! printing the offending bar.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fxlab_core::data::LoadOptions;
use fxlab_core::domain::{Timeframe, TradeLedger};
use fxlab_runner::export::load_trades_csv;
use fxlab_runner::{
    load_csv_series, run_backtest, run_monte_carlo, run_sweep, save_artifacts, BacktestResult,
    CancelToken, LoadError, MonteCarloConfig, MonteCarloMode, MonteCarloSummary, RunConfig,
    RunError, SweepConfig, SweepSummary,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "fxlab",
    about = "FxLab CLI — single-asset FX backtesting with fixed-dollar risk"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest from a TOML config file.
    Run {
        /// Path to the run TOML.
        #[arg(long)]
        config: PathBuf,

        /// Directory the run's artifact folder is created in.
        #[arg(long, default_value = "output")]
        output_dir: PathBuf,
    },

    /// Run a parameter sweep, streaming one JSON line per scenario.
    Sweep {
        /// Path to the sweep TOML.
        #[arg(long)]
        config: PathBuf,

        /// Wall-clock budget in seconds. Tightens any timeout in the config.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Load and validate a bar CSV without running anything.
    Validate {
        /// Path to the CSV file.
        #[arg(long)]
        data: PathBuf,

        /// Bar timeframe (M1, M5, M15, M30, H1, H4, D1).
        #[arg(long)]
        timeframe: Timeframe,

        /// Instrument label used in messages.
        #[arg(long, default_value = "UNKNOWN")]
        instrument: String,

        /// Maximum tolerated fraction of missing bar slots.
        #[arg(long, default_value_t = fxlab_core::data::DEFAULT_MAX_MISSING_FRACTION)]
        max_missing_fraction: f64,
    },

    /// Monte Carlo resampling of an exported trades.csv.
    MonteCarlo {
        /// Path to a trades.csv written by `run`.
        #[arg(long)]
        trades: PathBuf,

        /// Account equity the trades were taken on.
        #[arg(long)]
        initial_equity: f64,

        #[arg(long, default_value_t = 1000)]
        runs: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Sample trades with replacement instead of permuting them.
        #[arg(long)]
        bootstrap: bool,

        /// Count a path as ruined once its drawdown reaches this percentage.
        #[arg(long)]
        ruin_drawdown_pct: Option<f64>,
    },
}

/// How a command finished. Failures have already been printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmdStatus {
    Success,
    Failure,
}

impl From<CmdStatus> for ExitCode {
    fn from(status: CmdStatus) -> Self {
        match status {
            CmdStatus::Success => ExitCode::SUCCESS,
            CmdStatus::Failure => ExitCode::FAILURE,
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let status = match cli.command {
        Commands::Run { config, output_dir } => run_cmd(&config, &output_dir),
        Commands::Sweep {
            config,
            timeout_secs,
        } => sweep_cmd(&config, timeout_secs),
        Commands::Validate {
            data,
            timeframe,
            instrument,
            max_missing_fraction,
        } => validate_cmd(&data, timeframe, &instrument, max_missing_fraction),
        Commands::MonteCarlo {
            trades,
            initial_equity,
            runs,
            seed,
            bootstrap,
            ruin_drawdown_pct,
        } => monte_carlo_cmd(
            &trades,
            MonteCarloConfig {
                runs,
                seed,
                mode: if bootstrap {
                    MonteCarloMode::Bootstrap
                } else {
                    MonteCarloMode::Permutation
                },
                ruin_drawdown_pct,
            },
            initial_equity,
        ),
    }?;
    Ok(status.into())
}

// ─── Commands ───

fn run_cmd(config_path: &Path, output_dir: &Path) -> Result<CmdStatus> {
    let config = RunConfig::from_file(config_path)?;

    let result = match run_backtest(&config) {
        Ok(result) => result,
        Err(err) => return report_run_error(&err),
    };

    print_summary(&result);

    let run_dir = save_artifacts(&result, output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());

    if let Some(ruin) = result.ruin_error() {
        eprintln!(
            "Account ruined at bar {} ({}): terminal equity {:.2}",
            ruin.bar_index, ruin.timestamp, ruin.terminal_equity
        );
        return Ok(CmdStatus::Failure);
    }
    Ok(CmdStatus::Success)
}

fn sweep_cmd(config_path: &Path, timeout_secs: Option<u64>) -> Result<CmdStatus> {
    let config = SweepConfig::from_file(config_path)?;

    let token = match config.timeout_secs {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };
    let token = match timeout_secs {
        Some(secs) => token.limited_to(Duration::from_secs(secs)),
        None => token,
    };

    let summary = run_sweep(&config, &token)?;
    print_sweep_summary(&summary);

    if summary.failed > 0 {
        return Ok(CmdStatus::Failure);
    }
    Ok(CmdStatus::Success)
}

fn validate_cmd(
    data: &Path,
    timeframe: Timeframe,
    instrument: &str,
    max_missing_fraction: f64,
) -> Result<CmdStatus> {
    let options = LoadOptions {
        max_missing_fraction,
        ..LoadOptions::default()
    };

    match load_csv_series(data, instrument, timeframe, &options) {
        Ok((series, report)) => {
            println!("{instrument} {timeframe}: {} bars", series.len());
            println!(
                "  Range:              {} to {}",
                series.first_timestamp(),
                series.last_timestamp()
            );
            println!("  Rows read:          {}", report.rows_read);
            println!("  Outside window:     {}", report.rows_outside_window);
            println!("  Duplicates:         {}", report.duplicates_replaced);
            println!("  Expected slots:     {}", report.gaps.expected_slots);
            println!(
                "  Missing slots:      {} ({:.2}%)",
                report.gaps.missing_slots,
                report.gaps.missing_fraction * 100.0
            );
            println!("  Placeholder bars:   {}", report.gaps.placeholder_bars);
            println!("  Longest gap:        {} slots", report.gaps.longest_gap);
            Ok(CmdStatus::Success)
        }
        Err(err @ LoadError::Integrity(_)) | Err(err @ LoadError::Timestamp { .. }) => {
            eprintln!("Data integrity failure: {err}");
            if let Some(index) = err.bar_index() {
                eprintln!("Offending bar index: {index}");
            }
            Ok(CmdStatus::Failure)
        }
        Err(err) => Err(err).with_context(|| format!("failed to load {}", data.display())),
    }
}

fn monte_carlo_cmd(
    trades_path: &Path,
    config: MonteCarloConfig,
    initial_equity: f64,
) -> Result<CmdStatus> {
    let trades = load_trades_csv(trades_path)?;
    let ledger = TradeLedger::from_trades(initial_equity, trades);

    let summary = run_monte_carlo(&ledger, &config)
        .with_context(|| format!("monte carlo on {}", trades_path.display()))?;
    print_monte_carlo(&summary);
    Ok(CmdStatus::Success)
}

// ─── Output ───

fn report_run_error(err: &RunError) -> Result<CmdStatus> {
    eprintln!("Run failed ({}): {err}", err.kind());
    if let Some(index) = err.bar_index() {
        eprintln!("Offending bar index: {index}");
    }
    Ok(CmdStatus::Failure)
}

fn print_summary(result: &BacktestResult) {
    let r = &result.report;
    println!(
        "Backtest: {} {} ({} bars)",
        result.instrument, result.strategy_label, result.bar_count
    );
    println!("  Run ID:             {}", result.run_id);
    println!("  Period:             {} to {}", result.start, result.end);
    if let Some(notice) = &result.simulation.warmup_notice {
        println!("  Warmup:             {notice}");
    }
    println!("  Trades:             {}", r.trade_count);
    println!("  Win rate:           {:.1}%", r.win_rate * 100.0);
    println!("  Total return:       {:.2}%", r.total_return_pct);
    println!("  Final equity:       {:.2}", r.final_equity);
    println!("  Sharpe:             {:.3}", r.sharpe);
    println!("  Max drawdown:       {:.2}%", r.max_drawdown_pct);
    println!("  Profit factor:      {}", r.profit_factor);
    println!("  Expectancy:         {:.2}", r.expectancy);
    if !result.simulation.skipped_entries.is_empty() {
        println!(
            "  Skipped entries:    {}",
            result.simulation.skipped_entries.len()
        );
    }
    if let Some(mc) = &result.monte_carlo {
        print_monte_carlo(mc);
    }
}

fn print_monte_carlo(mc: &MonteCarloSummary) {
    println!(
        "Monte Carlo: {} runs over {} trades ({:?}, seed {})",
        mc.runs, mc.trade_count, mc.mode, mc.seed
    );
    println!("  Observed return:    {:.2}%", mc.observed_return_pct);
    let f = &mc.final_return_pct;
    println!(
        "  Final return:       p5 {:.2}%  p50 {:.2}%  p95 {:.2}%",
        f.p5, f.p50, f.p95
    );
    let d = &mc.max_drawdown_pct;
    println!(
        "  Max drawdown:       p5 {:.2}%  p50 {:.2}%  p95 {:.2}%",
        d.p5, d.p50, d.p95
    );
    println!("  Survival rate:      {:.1}%", mc.survival_rate * 100.0);
    if mc.ruined_runs > 0 {
        println!("  Ruined runs:        {}", mc.ruined_runs);
    }
}

fn print_sweep_summary(summary: &SweepSummary) {
    println!("Sweep: {} scenarios", summary.total);
    println!("  Completed:          {}", summary.succeeded);
    println!("  Blown:              {}", summary.blown);
    println!("  Failed:             {}", summary.failed);
    println!("  Cancelled:          {}", summary.cancelled);
    for (kind, count) in &summary.failure_reasons {
        println!("    {kind}: {count}");
    }
    println!("Results written to: {}", summary.output.display());
}
