//! Serializable run and sweep configuration (TOML).
//!
//! Every table denies unknown fields, so a typo fails loudly at parse time.
//! Parsing only checks shape; [`RunConfig::validate`] and
//! [`SweepConfig::validate`] check value ranges.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use fxlab_core::data::{LoadOptions, DEFAULT_MAX_MISSING_FRACTION};
use fxlab_core::domain::Timeframe;
use fxlab_core::engine::{
    SimulatorConfig, SizingConfig, StopRule, TargetRule, DEFAULT_INITIAL_EQUITY,
};
use fxlab_core::signals::StrategyConfig;

use crate::data_loader::flexible_timestamp;
use crate::metrics::MetricsConfig;
use crate::monte_carlo::MonteCarloConfig;

/// Unique identifier for a run configuration (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn default_max_missing_fraction() -> f64 {
    DEFAULT_MAX_MISSING_FRACTION
}

fn default_initial_equity() -> f64 {
    DEFAULT_INITIAL_EQUITY
}

fn default_true() -> bool {
    true
}

// ─── [data] ─────────────────────────────────────────────────────────

/// One dataset: a CSV file of bars for one (instrument, timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub path: PathBuf,
    /// Inclusive window start.
    #[serde(default, with = "flexible_timestamp")]
    pub start: Option<DateTime<Utc>>,
    /// Inclusive window end.
    #[serde(default, with = "flexible_timestamp")]
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_max_missing_fraction")]
    pub max_missing_fraction: f64,
}

impl DataConfig {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            start: self.start,
            end: self.end,
            max_missing_fraction: self.max_missing_fraction,
        }
    }

    pub fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.instrument.trim().is_empty() {
            return Err(ConfigError::invalid(
                format!("{field}.instrument"),
                "must not be empty",
            ));
        }
        if !(0.0..=1.0).contains(&self.max_missing_fraction) {
            return Err(ConfigError::invalid(
                format!("{field}.max_missing_fraction"),
                format!("must be in [0, 1], got {}", self.max_missing_fraction),
            ));
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ConfigError::invalid(
                    format!("{field}.start"),
                    format!("start {start} is after end {end}"),
                ));
            }
        }
        Ok(())
    }
}

// ─── [risk] ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RiskConfig {
    #[serde(default = "default_initial_equity")]
    pub initial_equity: f64,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub stop: StopRule,
    #[serde(default)]
    pub target: TargetRule,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let sim = SimulatorConfig::default();
        Self {
            initial_equity: sim.initial_equity,
            sizing: sim.sizing,
            stop: sim.stop,
            target: sim.target,
        }
    }
}

impl RiskConfig {
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            initial_equity: self.initial_equity,
            sizing: self.sizing.clone(),
            stop: self.stop.clone(),
            target: self.target.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulator_config()
            .validate()
            .map_err(|message| ConfigError::invalid("risk", message))
    }
}

// ─── Single run ─────────────────────────────────────────────────────

/// Everything needed to reproduce one backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub data: DataConfig,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    /// Trade-order resampling; skipped when the section is absent.
    #[serde(default)]
    pub monte_carlo: Option<MonteCarloConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl RunConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read_config(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.data.validate("data")?;
        self.strategy
            .validate()
            .map_err(|e| ConfigError::invalid("strategy", e.to_string()))?;
        self.risk.validate()?;
        if let Some(mc) = &self.monte_carlo {
            mc.validate()
                .map_err(|e| ConfigError::invalid("monte_carlo", e.to_string()))?;
        }
        self.metrics
            .validate()
            .map_err(|message| ConfigError::invalid("metrics", message))
    }

    /// Deterministic hash of the full configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let bytes = serde_json::to_vec(self).unwrap_or_else(|_| format!("{self:?}").into_bytes());
        blake3::hash(&bytes).to_hex().to_string()
    }
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Sweep ──────────────────────────────────────────────────────────

/// A parameter grid for one strategy family. Expanded as a cartesian
/// product; combinations that fail validation (e.g. fast >= slow) are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum StrategyGrid {
    EmaCrossover {
        fast: Vec<usize>,
        slow: Vec<usize>,
        #[serde(default = "default_confirm_grid")]
        confirm_bars: Vec<usize>,
        #[serde(default = "default_allow_short_grid")]
        allow_short: Vec<bool>,
    },
    BollingerBreakout {
        period: Vec<usize>,
        width: Vec<f64>,
        #[serde(default = "default_allow_short_grid")]
        allow_short: Vec<bool>,
    },
    DonchianBreakout {
        period: Vec<usize>,
        #[serde(default = "default_allow_short_grid")]
        allow_short: Vec<bool>,
    },
    RsiReversion {
        period: Vec<usize>,
        oversold: Vec<f64>,
        overbought: Vec<f64>,
        trend_ema: Vec<usize>,
        #[serde(default = "default_allow_short_grid")]
        allow_short: Vec<bool>,
    },
}

fn default_confirm_grid() -> Vec<usize> {
    vec![1]
}

fn default_allow_short_grid() -> Vec<bool> {
    vec![true]
}

impl StrategyGrid {
    /// Every valid combination of the grid. Invalid ones are logged and dropped.
    pub fn expand(&self) -> Vec<StrategyConfig> {
        let (valid, dropped) = self.expand_counted();
        if dropped > 0 {
            warn!(
                strategy = self.kind(),
                dropped,
                kept = valid.len(),
                "grid combinations failed validation and were dropped"
            );
        }
        valid
    }

    /// Valid combinations and the number of invalid ones removed.
    pub fn expand_counted(&self) -> (Vec<StrategyConfig>, usize) {
        let mut all = self.combinations();
        let total = all.len();
        all.retain(|s| s.validate().is_ok());
        let dropped = total - all.len();
        (all, dropped)
    }

    fn kind(&self) -> &'static str {
        match self {
            StrategyGrid::EmaCrossover { .. } => "ema_crossover",
            StrategyGrid::BollingerBreakout { .. } => "bollinger_breakout",
            StrategyGrid::DonchianBreakout { .. } => "donchian_breakout",
            StrategyGrid::RsiReversion { .. } => "rsi_reversion",
        }
    }

    fn combinations(&self) -> Vec<StrategyConfig> {
        let mut out = Vec::new();
        match self {
            StrategyGrid::EmaCrossover {
                fast,
                slow,
                confirm_bars,
                allow_short,
            } => {
                for &fast in fast {
                    for &slow in slow {
                        for &confirm_bars in confirm_bars {
                            for &allow_short in allow_short {
                                out.push(StrategyConfig::EmaCrossover {
                                    fast,
                                    slow,
                                    confirm_bars,
                                    allow_short,
                                });
                            }
                        }
                    }
                }
            }
            StrategyGrid::BollingerBreakout {
                period,
                width,
                allow_short,
            } => {
                for &period in period {
                    for &width in width {
                        for &allow_short in allow_short {
                            out.push(StrategyConfig::BollingerBreakout {
                                period,
                                width,
                                allow_short,
                            });
                        }
                    }
                }
            }
            StrategyGrid::DonchianBreakout {
                period,
                allow_short,
            } => {
                for &period in period {
                    for &allow_short in allow_short {
                        out.push(StrategyConfig::DonchianBreakout {
                            period,
                            allow_short,
                        });
                    }
                }
            }
            StrategyGrid::RsiReversion {
                period,
                oversold,
                overbought,
                trend_ema,
                allow_short,
            } => {
                for &period in period {
                    for &oversold in oversold {
                        for &overbought in overbought {
                            for &trend_ema in trend_ema {
                                for &allow_short in allow_short {
                                    out.push(StrategyConfig::RsiReversion {
                                        period,
                                        oversold,
                                        overbought,
                                        trend_ema,
                                        allow_short,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

/// Datasets × strategies, run in parallel with incremental JSONL output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepConfig {
    pub datasets: Vec<DataConfig>,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub grids: Vec<StrategyGrid>,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// JSONL file, one line per completed scenario.
    pub output: PathBuf,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl SweepConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: SweepConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&read_config(path)?)
    }

    /// Explicit strategies followed by every grid expansion, in file order.
    pub fn expanded_strategies(&self) -> Vec<StrategyConfig> {
        let mut out = self.strategies.clone();
        for grid in &self.grids {
            out.extend(grid.expand());
        }
        out
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.datasets.is_empty() {
            return Err(ConfigError::invalid("datasets", "at least one dataset is required"));
        }
        for (i, dataset) in self.datasets.iter().enumerate() {
            dataset.validate(&format!("datasets[{i}]"))?;
        }
        for (i, strategy) in self.strategies.iter().enumerate() {
            strategy
                .validate()
                .map_err(|e| ConfigError::invalid(format!("strategies[{i}]"), e.to_string()))?;
        }
        if self.expanded_strategies().is_empty() {
            return Err(ConfigError::invalid(
                "strategies",
                "no valid strategy after expanding grids",
            ));
        }
        self.risk.validate()?;
        self.metrics
            .validate()
            .map_err(|message| ConfigError::invalid("metrics", message))?;
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::invalid("timeout_secs", "must be positive"));
        }
        Ok(())
    }
}
