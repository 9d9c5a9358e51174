//! Monte Carlo trade resampling.
//!
//! Reorders (or redraws) a ledger's per-trade returns many times and compounds
//! each sequence into an equity path. The spread of outcomes measures how much
//! a result depends on the order its trades happened to arrive in.
//!
//! Every run derives its own RNG from `(seed, run_index)` through BLAKE3, so a
//! summary is bit-for-bit identical no matter how rayon schedules the runs.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use fxlab_core::domain::TradeLedger;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonteCarloMode {
    /// Shuffle the trade order; every trade appears exactly once.
    #[default]
    Permutation,
    /// Draw `n` trades with replacement.
    Bootstrap,
}

fn default_runs() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonteCarloConfig {
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub mode: MonteCarloMode,
    /// A path whose drawdown reaches this many percent is ruined and frozen.
    #[serde(default)]
    pub ruin_drawdown_pct: Option<f64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            seed: default_seed(),
            mode: MonteCarloMode::default(),
            ruin_drawdown_pct: None,
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> Result<(), MonteCarloError> {
        if self.runs == 0 {
            return Err(MonteCarloError::ZeroRuns);
        }
        if let Some(threshold) = self.ruin_drawdown_pct {
            if !(threshold > 0.0 && threshold <= 100.0) {
                return Err(MonteCarloError::InvalidRuinThreshold(threshold));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MonteCarloError {
    #[error("Monte Carlo needs at least one trade")]
    EmptyLedger,

    #[error("Monte Carlo runs must be >= 1")]
    ZeroRuns,

    #[error("ruin_drawdown_pct must be in (0, 100], got {0}")]
    InvalidRuinThreshold(f64),
}

// ─── Result types ────────────────────────────────────────────────────

/// 5/25/50/75/95th percentiles, linearly interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl Percentiles {
    /// Percentiles of `values`. All zero for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            p5: percentile(&sorted, 5.0),
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub runs: usize,
    pub seed: u64,
    pub mode: MonteCarloMode,
    pub trade_count: usize,
    /// Compounded return of the ledger in its recorded order, in percent.
    pub observed_return_pct: f64,
    pub final_return_pct: Percentiles,
    pub mean_final_return_pct: f64,
    /// Positive magnitude, percent of running peak equity.
    pub max_drawdown_pct: Percentiles,
    /// Fraction of runs whose final return is > 0.
    pub survival_rate: f64,
    pub ruined_runs: usize,
}

/// Outcome of one resampled path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathOutcome {
    pub final_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub ruined: bool,
}

// ─── Core ────────────────────────────────────────────────────────────

pub fn run_monte_carlo(
    ledger: &TradeLedger,
    config: &MonteCarloConfig,
) -> Result<MonteCarloSummary, MonteCarloError> {
    config.validate()?;
    if ledger.is_empty() {
        return Err(MonteCarloError::EmptyLedger);
    }

    let returns = ledger.returns_pct();
    let outcomes: Vec<PathOutcome> = (0..config.runs)
        .into_par_iter()
        .map(|run_index| {
            let mut rng = StdRng::seed_from_u64(run_seed(config.seed, run_index as u64));
            let sequence = resample(&returns, config.mode, &mut rng);
            compound_path(&sequence, config.ruin_drawdown_pct)
        })
        .collect();

    let finals: Vec<f64> = outcomes.iter().map(|o| o.final_return_pct).collect();
    let drawdowns: Vec<f64> = outcomes.iter().map(|o| o.max_drawdown_pct).collect();
    let survivors = outcomes.iter().filter(|o| o.final_return_pct > 0.0).count();
    let ruined_runs = outcomes.iter().filter(|o| o.ruined).count();

    let summary = MonteCarloSummary {
        runs: config.runs,
        seed: config.seed,
        mode: config.mode,
        trade_count: returns.len(),
        observed_return_pct: compound_path(&returns, None).final_return_pct,
        final_return_pct: Percentiles::from_values(&finals),
        mean_final_return_pct: finals.iter().sum::<f64>() / finals.len() as f64,
        max_drawdown_pct: Percentiles::from_values(&drawdowns),
        survival_rate: survivors as f64 / config.runs as f64,
        ruined_runs,
    };

    info!(
        runs = summary.runs,
        seed = summary.seed,
        trades = summary.trade_count,
        survival_rate = summary.survival_rate,
        ruined = summary.ruined_runs,
        "monte carlo complete"
    );
    Ok(summary)
}

/// Seed for one run: first 8 bytes (LE) of BLAKE3 over `(seed, run_index)`.
pub fn run_seed(seed: u64, run_index: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&seed.to_le_bytes());
    hasher.update(&run_index.to_le_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

fn resample(returns: &[f64], mode: MonteCarloMode, rng: &mut StdRng) -> Vec<f64> {
    match mode {
        MonteCarloMode::Permutation => {
            let mut sequence = returns.to_vec();
            sequence.shuffle(rng);
            sequence
        }
        MonteCarloMode::Bootstrap => (0..returns.len())
            .map(|_| returns[rng.gen_range(0..returns.len())])
            .collect(),
    }
}

/// Compound per-trade percent returns from equity 1.0.
///
/// The path stops at the first trade that takes equity to zero or below
/// (final return -100%) or whose drawdown reaches `ruin_drawdown_pct`.
pub fn compound_path(returns_pct: &[f64], ruin_drawdown_pct: Option<f64>) -> PathOutcome {
    let mut equity = 1.0_f64;
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    let mut ruined = false;

    for r in returns_pct {
        equity *= 1.0 + r / 100.0;
        if equity <= 0.0 {
            equity = 0.0;
            max_dd = 100.0;
            ruined = true;
            break;
        }
        if equity > peak {
            peak = equity;
        }
        let dd = (peak - equity) / peak * 100.0;
        if dd > max_dd {
            max_dd = dd;
        }
        if ruin_drawdown_pct.is_some_and(|threshold| dd >= threshold) {
            ruined = true;
            break;
        }
    }

    PathOutcome {
        final_return_pct: (equity - 1.0) * 100.0,
        max_drawdown_pct: max_dd,
        ruined,
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────

/// Linear-interpolation percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = pct / 100.0 * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 50.0), 3.0);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 5.0);
        assert!((percentile(&sorted, 5.0) - 1.2).abs() < 1e-12);
        assert!((percentile(&sorted, 95.0) - 4.8).abs() < 1e-12);
    }

    #[test]
    fn percentiles_sort_input() {
        let p = Percentiles::from_values(&[5.0, 1.0, 3.0, 2.0, 4.0]);
        assert_eq!(p.p50, 3.0);
        assert_eq!(p.p25, 2.0);
        assert_eq!(p.p75, 4.0);
    }

    #[test]
    fn compound_path_basic() {
        let out = compound_path(&[10.0, -10.0], None);
        assert!((out.final_return_pct - (-1.0)).abs() < 1e-9);
        assert!((out.max_drawdown_pct - 10.0).abs() < 1e-9);
        assert!(!out.ruined);
    }

    #[test]
    fn compound_path_wipeout_freezes() {
        let out = compound_path(&[5.0, -120.0, 50.0], None);
        assert_eq!(out.final_return_pct, -100.0);
        assert_eq!(out.max_drawdown_pct, 100.0);
        assert!(out.ruined);
    }

    #[test]
    fn compound_path_drawdown_threshold_freezes() {
        // 1.0 → 0.8 is a 20% drawdown; the later +50% never applies.
        let out = compound_path(&[-20.0, 50.0], Some(15.0));
        assert!(out.ruined);
        assert!((out.final_return_pct - (-20.0)).abs() < 1e-9);
    }

    #[test]
    fn run_seeds_differ_per_run() {
        assert_eq!(run_seed(42, 0), run_seed(42, 0));
        assert_ne!(run_seed(42, 0), run_seed(42, 1));
        assert_ne!(run_seed(42, 0), run_seed(43, 0));
    }

    #[test]
    fn validate_rejects_bad_threshold() {
        let config = MonteCarloConfig {
            ruin_drawdown_pct: Some(0.0),
            ..MonteCarloConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(MonteCarloError::InvalidRuinThreshold(0.0))
        );
        let config = MonteCarloConfig {
            ruin_drawdown_pct: Some(150.0),
            ..MonteCarloConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_ledger_rejected() {
        let err = run_monte_carlo(&TradeLedger::new(10_000.0), &MonteCarloConfig::default())
            .unwrap_err();
        assert_eq!(err, MonteCarloError::EmptyLedger);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn path_drawdown_is_bounded(returns in prop::collection::vec(-150.0..50.0_f64, 1..40)) {
            let outcome = compound_path(&returns, None);
            prop_assert!(outcome.max_drawdown_pct >= 0.0);
            prop_assert!(outcome.max_drawdown_pct <= 100.0);
            prop_assert!(outcome.final_return_pct >= -100.0);
        }

        #[test]
        fn percentiles_are_ordered(values in prop::collection::vec(-1_000_000i32..1_000_000, 1..200)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let p = Percentiles::from_values(&values);
            prop_assert!(p.p5 <= p.p25);
            prop_assert!(p.p25 <= p.p50);
            prop_assert!(p.p50 <= p.p75);
            prop_assert!(p.p75 <= p.p95);
        }
    }
}
