//! Intrabar stop-loss / take-profit resolution.
//!
//! Only the bar's open, high and low are known, not the path between them.
//! Order of evaluation:
//! 1. stop-loss: a bar opening at or through the stop fills at the open (gap
//!    fill, the worse price); otherwise a touched stop fills at the stop.
//! 2. take-profit: a bar opening at or through the target fills at the open;
//!    otherwise a touched target fills at the target.
//!
//! When stop and target both lie inside the bar range the stop wins. This is
//! the conservative assumption: the worse outcome happened first.

use crate::domain::{Bar, Direction, ExitReason, Position};

/// An exit triggered inside a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntrabarExit {
    pub price: f64,
    pub reason: ExitReason,
    /// True when the fill happened at the open because price gapped through.
    pub gapped: bool,
}

/// Check the stop, then the target, of `position` against `bar`.
pub fn check_intrabar_exit(position: &Position, bar: &Bar) -> Option<IntrabarExit> {
    if let Some(exit) = check_stop(position.direction, position.stop_price, bar) {
        return Some(exit);
    }
    position
        .target_price
        .and_then(|target| check_target(position.direction, target, bar))
}

fn check_stop(direction: Direction, stop: f64, bar: &Bar) -> Option<IntrabarExit> {
    let (gapped, touched) = match direction {
        Direction::Long => (bar.open <= stop, bar.low <= stop),
        Direction::Short => (bar.open >= stop, bar.high >= stop),
    };
    fill(gapped, touched, stop, bar, ExitReason::StopLoss)
}

fn check_target(direction: Direction, target: f64, bar: &Bar) -> Option<IntrabarExit> {
    let (gapped, touched) = match direction {
        Direction::Long => (bar.open >= target, bar.high >= target),
        Direction::Short => (bar.open <= target, bar.low <= target),
    };
    fill(gapped, touched, target, bar, ExitReason::TakeProfit)
}

fn fill(gapped: bool, touched: bool, level: f64, bar: &Bar, reason: ExitReason) -> Option<IntrabarExit> {
    if gapped {
        Some(IntrabarExit {
            price: bar.open,
            reason,
            gapped: true,
        })
    } else if touched {
        Some(IntrabarExit {
            price: level,
            reason,
            gapped: false,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar::new(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(), open, high, low, close, 0.0)
    }

    fn position(direction: Direction, stop: f64, target: Option<f64>) -> Position {
        Position {
            direction,
            entry_price: 100.0,
            entry_time: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            entry_index: 0,
            size: 1.0,
            stop_price: stop,
            target_price: target,
            equity_at_entry: 10_000.0,
        }
    }

    #[test]
    fn long_stop_touched_fills_at_stop() {
        let exit = check_intrabar_exit(&position(Direction::Long, 95.0, None), &bar(99.0, 100.0, 94.0, 96.0)).unwrap();
        assert_eq!(exit.price, 95.0);
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert!(!exit.gapped);
    }

    #[test]
    fn long_stop_gapped_fills_at_open() {
        let exit = check_intrabar_exit(&position(Direction::Long, 95.0, None), &bar(90.0, 92.0, 89.0, 91.0)).unwrap();
        assert_eq!(exit.price, 90.0);
        assert!(exit.gapped);
    }

    #[test]
    fn short_stop_gapped_fills_at_open() {
        let exit = check_intrabar_exit(&position(Direction::Short, 105.0, None), &bar(108.0, 109.0, 107.0, 108.5)).unwrap();
        assert_eq!(exit.price, 108.0);
        assert_eq!(exit.reason, ExitReason::StopLoss);
    }

    #[test]
    fn stop_wins_when_both_inside_bar() {
        let pos = position(Direction::Long, 95.0, Some(105.0));
        let exit = check_intrabar_exit(&pos, &bar(100.0, 106.0, 94.0, 101.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::StopLoss);
        assert_eq!(exit.price, 95.0);
    }

    #[test]
    fn target_touched_and_gapped() {
        let pos = position(Direction::Long, 95.0, Some(105.0));
        let exit = check_intrabar_exit(&pos, &bar(101.0, 106.0, 100.0, 104.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_eq!(exit.price, 105.0);

        let exit = check_intrabar_exit(&pos, &bar(107.0, 108.0, 106.0, 107.5)).unwrap();
        assert_eq!(exit.price, 107.0);
        assert!(exit.gapped);

        let short = position(Direction::Short, 105.0, Some(95.0));
        let exit = check_intrabar_exit(&short, &bar(99.0, 100.0, 94.0, 96.0)).unwrap();
        assert_eq!(exit.reason, ExitReason::TakeProfit);
        assert_eq!(exit.price, 95.0);
    }

    #[test]
    fn quiet_bar_no_exit() {
        let pos = position(Direction::Long, 95.0, Some(105.0));
        assert!(check_intrabar_exit(&pos, &bar(100.0, 102.0, 98.0, 101.0)).is_none());
    }
}
