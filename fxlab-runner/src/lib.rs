//! FxLab Runner — configuration, data loading, backtest orchestration, metrics.
//!
//! This crate builds on `fxlab-core` to provide:
//! - TOML run and sweep configuration with strict key checking
//! - CSV bar loading on top of the core hygiene layer
//! - Single-backtest runner producing a performance report
//! - Monte Carlo trade resampling with per-run derived seeds
//! - Parallel, cancellable sweeps with incremental JSONL output
//! - Artifact export (CSV, JSON, Markdown)

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod monte_carlo;
pub mod runner;
pub mod sweep;

pub use config::{
    ConfigError, DataConfig, RiskConfig, RunConfig, RunId, StrategyGrid, SweepConfig,
};
pub use data_loader::{dataset_hash, load_csv_series, load_dataset, read_csv, LoadError};
pub use export::{load_report_json, load_trades_csv, load_trades_json, save_artifacts};
pub use metrics::{compute_metrics, MetricsConfig, PerformanceReport, ProfitFactor};
pub use monte_carlo::{
    run_monte_carlo, MonteCarloConfig, MonteCarloError, MonteCarloMode, MonteCarloSummary,
    Percentiles,
};
pub use runner::{run_backtest, run_backtest_on_series, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{
    run_sweep, CancelToken, ScenarioOutcome, ScenarioStatus, SweepError, SweepSummary,
};
