//! FxLab Core — domain types, bar hygiene, indicators, signals, simulator.
//!
//! Data flows one way:
//! raw bars → [`data`] validation → [`indicators`] → [`signals`] → [`engine`] → trades.
//!
//! Nothing here does I/O; loading files, metrics and orchestration live in
//! `fxlab-runner`.

pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod signals;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types that cross thread boundaries in a sweep are
    /// Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::TradeLedger>();
        require_sync::<domain::TradeLedger>();

        require_send::<indicators::IndicatorFrame>();
        require_sync::<indicators::IndicatorFrame>();

        require_send::<engine::SimulationResult>();
        require_sync::<engine::SimulationResult>();
        require_send::<engine::SimulatorConfig>();
        require_sync::<engine::SimulatorConfig>();

        require_send::<Box<dyn signals::SignalGenerator>>();
        require_sync::<Box<dyn signals::SignalGenerator>>();
        require_send::<Box<dyn engine::SizingPolicy>>();
        require_sync::<Box<dyn engine::SizingPolicy>>();
    }
}
