//! Data hygiene: validation of upstream rows and gap accounting.

pub mod error;
pub mod gaps;
pub mod validate;

pub use error::DataIntegrityError;
pub use gaps::{gap_report, is_market_closed, GapReport};
pub use validate::{
    check_bar, load_bars, load_bars_with_report, LoadOptions, LoadReport, RawBar,
    DEFAULT_MAX_MISSING_FRACTION,
};
