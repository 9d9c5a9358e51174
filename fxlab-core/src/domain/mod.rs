//! Domain types: bars, series, timeframes, positions, trades.

pub mod bar;
pub mod position;
pub mod series;
pub mod timeframe;
pub mod trade;

pub use bar::Bar;
pub use position::Position;
pub use series::BarSeries;
pub use timeframe::{Timeframe, TimeframeParseError};
pub use trade::{Direction, ExitReason, Trade, TradeLedger};
