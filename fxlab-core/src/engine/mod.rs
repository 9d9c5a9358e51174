//! Position & risk simulator.
//!
//! States: `Flat → OpenLong / OpenShort → Flat`. At most one position is open.
//! All mutable state lives in an explicit [`SimulatorState`], so independent
//! simulations can run on any number of threads at once.

pub mod exits;
pub mod rules;
pub mod simulator;
pub mod sizing;
pub mod state;

pub use exits::{check_intrabar_exit, IntrabarExit};
pub use rules::{StopRule, TargetRule};
pub use simulator::{
    required_indicators, simulate, simulate_series, SimulatorConfig, DEFAULT_INITIAL_EQUITY,
};
pub use sizing::{
    FixedDollar, FixedFractional, InvalidRiskParameterError, SizingConfig, SizingPolicy,
};
pub use state::{
    AccountRuinError, EquityPoint, InsufficientWarmupError, RunStatus, SimulationResult,
    SimulatorState, SkippedEntry,
};
