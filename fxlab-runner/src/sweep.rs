//! Parallel sweep: every dataset × every strategy, one independent backtest each.
//!
//! Datasets are loaded once and shared read-only. Scenarios run on rayon and
//! stream their outcomes over a channel to a single writer thread, which
//! appends one JSON line per finished scenario and flushes immediately, so a
//! killed sweep leaves a valid JSONL prefix behind.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use fxlab_core::domain::{BarSeries, Timeframe};
use fxlab_core::engine::AccountRuinError;
use fxlab_core::signals::StrategyConfig;

use crate::config::{ConfigError, DataConfig, RunConfig, RunId, SweepConfig};
use crate::data_loader::{dataset_hash, load_dataset, LoadError};
use crate::metrics::PerformanceReport;
use crate::runner::run_backtest_on_series;

// ─── Cancellation ────────────────────────────────────────────────────

/// Cooperative stop signal shared by every scenario of a sweep.
///
/// Checked before each scenario starts; a running simulation is never
/// interrupted midway.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also trips once `timeout` has elapsed from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().limited_to(timeout)
    }

    /// Same flag, with a deadline no later than `timeout` from now.
    pub fn limited_to(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

// ─── Outcomes ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioStatus {
    Completed,
    Blown,
    Failed,
    Cancelled,
}

/// One line of `sweep.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario_index: usize,
    pub instrument: String,
    pub timeframe: Timeframe,
    pub strategy: StrategyConfig,
    pub strategy_label: String,
    pub status: ScenarioStatus,
    pub run_id: Option<RunId>,
    pub dataset_hash: Option<String>,
    pub report: Option<PerformanceReport>,
    pub ruin: Option<AccountRuinError>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub total: usize,
    pub succeeded: usize,
    pub blown: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Failed scenarios by error kind.
    pub failure_reasons: BTreeMap<String, usize>,
    pub output: PathBuf,
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to write sweep output '{path}': {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ─── Core ────────────────────────────────────────────────────────────

struct LoadedDataset {
    series: Arc<BarSeries>,
    hash: String,
}

/// (kind, message) for a dataset that could not be loaded.
type DatasetFailure = (String, String);

struct Scenario<'a> {
    index: usize,
    data: &'a DataConfig,
    dataset: &'a Result<LoadedDataset, DatasetFailure>,
    strategy: &'a StrategyConfig,
}

/// Run every scenario of the sweep, writing outcomes to `config.output`.
///
/// A scenario that fails is logged, recorded and counted; the sweep carries
/// on. Only an unusable config or an unwritable output file is an error.
pub fn run_sweep(config: &SweepConfig, cancel: &CancelToken) -> Result<SweepSummary, SweepError> {
    config.validate()?;
    let cancel = match config.timeout_secs {
        Some(secs) => cancel.limited_to(Duration::from_secs(secs)),
        None => cancel.clone(),
    };

    let strategies = config.expanded_strategies();
    let datasets: Vec<Result<LoadedDataset, DatasetFailure>> =
        config.datasets.par_iter().map(load_shared).collect();

    let scenarios: Vec<Scenario<'_>> = config
        .datasets
        .iter()
        .zip(&datasets)
        .flat_map(|(data, dataset)| strategies.iter().map(move |s| (data, dataset, s)))
        .enumerate()
        .map(|(index, (data, dataset, strategy))| Scenario {
            index,
            data,
            dataset,
            strategy,
        })
        .collect();

    info!(
        datasets = config.datasets.len(),
        strategies = strategies.len(),
        scenarios = scenarios.len(),
        parallel = config.parallel,
        output = %config.output.display(),
        "starting sweep"
    );

    let file = create_output(&config.output)?;
    let (sender, receiver) = mpsc::channel::<ScenarioOutcome>();

    let (statuses, written) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || write_outcomes(file, receiver));

        let statuses: Vec<(ScenarioStatus, Option<String>)> = if config.parallel {
            scenarios
                .par_iter()
                .map_with(sender.clone(), |tx, scenario| {
                    run_one(scenario, config, &cancel, tx)
                })
                .collect()
        } else {
            scenarios
                .iter()
                .map(|scenario| run_one(scenario, config, &cancel, &sender))
                .collect()
        };
        drop(sender);

        let written = writer
            .join()
            .unwrap_or_else(|_| Err(std::io::Error::other("sweep writer thread panicked")));
        (statuses, written)
    });
    written.map_err(|source| SweepError::Output {
        path: config.output.clone(),
        source,
    })?;

    let summary = summarize(&statuses, config.output.clone());
    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        blown = summary.blown,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "sweep complete"
    );
    Ok(summary)
}

fn load_shared(data: &DataConfig) -> Result<LoadedDataset, DatasetFailure> {
    match load_dataset(data) {
        Ok((series, _)) => {
            let hash = dataset_hash(&series);
            Ok(LoadedDataset {
                series: Arc::new(series),
                hash,
            })
        }
        Err(e) => {
            let kind = match e {
                LoadError::Integrity(_) => "data_integrity",
                _ => "data_load",
            };
            error!(
                instrument = %data.instrument,
                timeframe = %data.timeframe,
                path = %data.path.display(),
                kind,
                error = %e,
                "dataset failed to load; its scenarios will fail"
            );
            Err((kind.to_string(), e.to_string()))
        }
    }
}

fn run_one(
    scenario: &Scenario<'_>,
    config: &SweepConfig,
    cancel: &CancelToken,
    tx: &Sender<ScenarioOutcome>,
) -> (ScenarioStatus, Option<String>) {
    if cancel.is_cancelled() {
        return (ScenarioStatus::Cancelled, None);
    }

    let mut outcome = ScenarioOutcome {
        scenario_index: scenario.index,
        instrument: scenario.data.instrument.clone(),
        timeframe: scenario.data.timeframe,
        strategy: scenario.strategy.clone(),
        strategy_label: scenario.strategy.label(),
        status: ScenarioStatus::Failed,
        run_id: None,
        dataset_hash: None,
        report: None,
        ruin: None,
        error_kind: None,
        error: None,
    };

    match scenario.dataset {
        Err((kind, message)) => {
            outcome.error_kind = Some(kind.clone());
            outcome.error = Some(message.clone());
        }
        Ok(dataset) => {
            let run_config = RunConfig {
                data: scenario.data.clone(),
                strategy: scenario.strategy.clone(),
                risk: config.risk.clone(),
                monte_carlo: None,
                metrics: config.metrics.clone(),
            };
            outcome.dataset_hash = Some(dataset.hash.clone());
            let series = Arc::clone(&dataset.series);
            match run_backtest_on_series(&run_config, series, &dataset.hash, None) {
                Ok(result) => {
                    outcome.ruin = result.ruin_error();
                    outcome.status = if outcome.ruin.is_some() {
                        ScenarioStatus::Blown
                    } else {
                        ScenarioStatus::Completed
                    };
                    outcome.run_id = Some(result.run_id);
                    outcome.report = Some(result.report);
                }
                Err(e) => {
                    error!(
                        instrument = %scenario.data.instrument,
                        timeframe = %scenario.data.timeframe,
                        strategy = %outcome.strategy_label,
                        kind = e.kind(),
                        error = %e,
                        "scenario failed"
                    );
                    outcome.error_kind = Some(e.kind().to_string());
                    outcome.error = Some(e.to_string());
                }
            }
        }
    }

    let status = outcome.status;
    let reason = outcome.error_kind.clone();
    // The writer only hangs up after an I/O error, which run_sweep reports.
    if tx.send(outcome).is_err() {
        warn!(scenario = scenario.index, "sweep writer gone; outcome dropped");
    }
    (status, reason)
}

fn create_output(path: &Path) -> Result<File, SweepError> {
    let io_err = |source| SweepError::Output {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    File::create(path).map_err(io_err)
}

fn write_outcomes(file: File, receiver: Receiver<ScenarioOutcome>) -> std::io::Result<()> {
    let mut out = BufWriter::new(file);
    for outcome in receiver {
        serde_json::to_writer(&mut out, &outcome)?;
        out.write_all(b"\n")?;
        out.flush()?;
    }
    Ok(())
}

fn summarize(statuses: &[(ScenarioStatus, Option<String>)], output: PathBuf) -> SweepSummary {
    let mut summary = SweepSummary {
        total: statuses.len(),
        succeeded: 0,
        blown: 0,
        failed: 0,
        cancelled: 0,
        failure_reasons: BTreeMap::new(),
        output,
    };
    for (status, reason) in statuses {
        match status {
            ScenarioStatus::Completed => summary.succeeded += 1,
            ScenarioStatus::Blown => summary.blown += 1,
            ScenarioStatus::Cancelled => summary.cancelled += 1,
            ScenarioStatus::Failed => {
                summary.failed += 1;
                let reason = reason.clone().unwrap_or_else(|| "unknown".to_string());
                *summary.failure_reasons.entry(reason).or_insert(0) += 1;
            }
        }
    }
    summary
}
