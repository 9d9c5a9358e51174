//! Backtest runner — wires together data loading, the simulator, metrics and
//! Monte Carlo.
//!
//! Two entry points:
//! - `run_backtest()`: loads the `[data]` file, then runs. Used by the CLI.
//! - `run_backtest_on_series()`: takes a pre-loaded, shared series. Used by
//!   the sweep so each dataset is read once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use fxlab_core::data::LoadReport;
use fxlab_core::domain::BarSeries;
use fxlab_core::engine::{required_indicators, simulate, AccountRuinError, SimulationResult};
use fxlab_core::indicators::compute_indicators_shared;
use fxlab_core::signals::StrategyConfigError;

use crate::config::{ConfigError, RunConfig, RunId};
use crate::data_loader::{dataset_hash, load_dataset, LoadError};
use crate::metrics::{compute_metrics, PerformanceReport};
use crate::monte_carlo::{run_monte_carlo, MonteCarloError, MonteCarloSummary};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyConfigError),
    #[error("monte carlo error: {0}")]
    MonteCarlo(#[from] MonteCarloError),
}

impl RunError {
    /// Short machine-readable category, used as a sweep failure reason.
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::Config(_) => "config",
            RunError::Data(LoadError::Integrity(_)) => "data_integrity",
            RunError::Data(_) => "data_load",
            RunError::Strategy(_) => "strategy",
            RunError::MonteCarlo(_) => "monte_carlo",
        }
    }

    pub fn bar_index(&self) -> Option<usize> {
        match self {
            RunError::Data(e) => e.bar_index(),
            _ => None,
        }
    }
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: RunConfig,
    pub instrument: String,
    pub strategy_label: String,
    pub dataset_hash: String,
    pub bar_count: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub simulation: SimulationResult,
    pub report: PerformanceReport,
    pub monte_carlo: Option<MonteCarloSummary>,
    /// Present when this run loaded its own data.
    pub load_report: Option<LoadReport>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn is_blown(&self) -> bool {
        self.simulation.is_blown()
    }

    /// The ruin as an error value, for callers that treat it as a failure.
    pub fn ruin_error(&self) -> Option<AccountRuinError> {
        self.simulation.status.ruin_error()
    }
}

/// Load the configured dataset and run.
pub fn run_backtest(config: &RunConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let (series, load_report) = load_dataset(&config.data)?;
    let hash = dataset_hash(&series);
    run_backtest_on_series(config, Arc::new(series), &hash, Some(load_report))
}

/// Run against an already validated series. Does no I/O.
///
/// `config.data` is recorded in the result but not read; the caller is
/// responsible for `series` matching it.
pub fn run_backtest_on_series(
    config: &RunConfig,
    series: Arc<BarSeries>,
    dataset_hash: &str,
    load_report: Option<LoadReport>,
) -> Result<BacktestResult, RunError> {
    let generator = config.strategy.build()?;
    let sim_config = config.risk.simulator_config();

    let specs = required_indicators(generator.as_ref(), &sim_config);
    let frame = compute_indicators_shared(Arc::clone(&series), &specs);
    let simulation = simulate(&frame, generator.as_ref(), &sim_config);
    let report = compute_metrics(&simulation.ledger, &config.metrics);

    let monte_carlo = match &config.monte_carlo {
        Some(_) if simulation.ledger.is_empty() => {
            warn!(
                strategy = %config.strategy.label(),
                "no trades; monte carlo skipped"
            );
            None
        }
        Some(mc) => Some(run_monte_carlo(&simulation.ledger, mc)?),
        None => None,
    };

    let run_id = config.run_id();
    if let Some(ruin) = simulation.status.ruin_error() {
        warn!(
            run_id = %run_id,
            bar = ruin.bar_index,
            timestamp = %ruin.timestamp,
            equity = ruin.terminal_equity,
            "account blown"
        );
    }
    info!(
        run_id = %run_id,
        instrument = series.instrument(),
        timeframe = %series.timeframe(),
        strategy = %config.strategy.label(),
        trades = report.trade_count,
        final_equity = report.final_equity,
        sharpe = report.sharpe,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        instrument: series.instrument().to_string(),
        strategy_label: config.strategy.label(),
        dataset_hash: dataset_hash.to_string(),
        bar_count: series.len(),
        start: series.first_timestamp(),
        end: series.last_timestamp(),
        simulation,
        report,
        monte_carlo,
        load_report,
    })
}
