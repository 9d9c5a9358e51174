//! Property tests for data hygiene and simulator invariants.
//!
//! Uses proptest to verify:
//! 1. Accepted bars are sane: every bar passes the OHLC ordering, timestamps rise
//! 2. Indicator computation is bit-for-bit deterministic
//! 3. PnL conservation: final equity == initial + sum of trade PnL
//! 4. Trades never overlap and intrabar fills stay inside the bar
//! 5. Fixed-dollar sizing risks exactly the configured amount

use chrono::{DateTime, Duration, TimeZone, Utc};
use fxlab_core::data::{load_bars, LoadOptions, RawBar};
use fxlab_core::domain::{Bar, BarSeries, Direction, ExitReason, Position, Timeframe};
use fxlab_core::engine::{
    check_intrabar_exit, simulate_series, FixedDollar, SimulatorConfig, SizingConfig,
    SizingPolicy, StopRule, TargetRule,
};
use fxlab_core::indicators::{compute_indicators, BollingerBand, DonchianBand, IndicatorSpec};
use fxlab_core::signals::StrategyConfig;
use proptest::prelude::*;

fn ts(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::hours(i as i64)
}

fn bars_from_walk(steps: &[f64]) -> Vec<Bar> {
    let mut price = 1.2;
    let mut bars = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        let open = price;
        price = (price + step).max(0.2);
        let close = price;
        bars.push(Bar::new(
            ts(i),
            open,
            open.max(close) + 0.001,
            open.min(close) - 0.001,
            close,
            500.0,
        ));
    }
    bars
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_raw_row() -> impl Strategy<Value = (f64, f64, f64, f64)> {
    (
        prop_oneof![9 => 0.5..2.0_f64, 1 => -1.0..0.5_f64],
        0.0..0.05_f64,
        0.0..0.05_f64,
        prop_oneof![9 => 0.5..2.0_f64, 1 => Just(f64::NAN)],
    )
}

fn arb_steps(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.01..0.01_f64, len)
}

fn arb_strategy() -> impl Strategy<Value = StrategyConfig> {
    prop_oneof![
        (2..6usize, 7..20usize, 1..=3usize, any::<bool>()).prop_map(
            |(fast, slow, confirm_bars, allow_short)| StrategyConfig::EmaCrossover {
                fast,
                slow,
                confirm_bars,
                allow_short,
            }
        ),
        (5..25usize, 1.0..3.0_f64, any::<bool>()).prop_map(|(period, width, allow_short)| {
            StrategyConfig::BollingerBreakout {
                period,
                width,
                allow_short,
            }
        }),
        (3..30usize, any::<bool>()).prop_map(|(period, allow_short)| {
            StrategyConfig::DonchianBreakout {
                period,
                allow_short,
            }
        }),
        (2..10usize, 20.0..40.0_f64, 60.0..80.0_f64, 5..30usize, any::<bool>()).prop_map(
            |(period, oversold, overbought, trend_ema, allow_short)| {
                StrategyConfig::RsiReversion {
                    period,
                    oversold,
                    overbought,
                    trend_ema,
                    allow_short,
                }
            }
        ),
    ]
}

fn arb_sim_config() -> impl Strategy<Value = SimulatorConfig> {
    (
        10.0..500.0_f64,
        prop_oneof![
            (0.002..0.05_f64).prop_map(|distance| StopRule::FixedDistance { distance }),
            (2..20usize, 0.5..4.0_f64)
                .prop_map(|(period, multiple)| StopRule::AtrMultiple { period, multiple }),
        ],
        prop_oneof![
            Just(TargetRule::None),
            (0.5..4.0_f64).prop_map(|multiple| TargetRule::RiskMultiple { multiple }),
        ],
    )
        .prop_map(|(risk_dollars, stop, target)| SimulatorConfig {
            initial_equity: 10_000.0,
            sizing: SizingConfig::FixedDollar { risk_dollars },
            stop,
            target,
        })
}

// ── 1. Accepted Bars Are Sane ────────────────────────────────────────

proptest! {
    /// Whatever the loader accepts satisfies OHLC ordering, positive prices and
    /// strictly increasing timestamps.
    #[test]
    fn accepted_bars_are_sane(rows in prop::collection::vec(arb_raw_row(), 1..60)) {
        let raw: Vec<RawBar> = rows
            .iter()
            .enumerate()
            .map(|(i, &(open, up, down, close))| RawBar {
                timestamp: ts(i),
                open,
                high: open.max(close) + up,
                low: open.min(close) - down,
                close,
                volume: 10.0,
                placeholder: false,
            })
            .collect();
        let options = LoadOptions { max_missing_fraction: 1.0, ..LoadOptions::default() };

        if let Ok(series) = load_bars("EURUSD", Timeframe::H1, &raw, &options) {
            prop_assert_eq!(series.len(), raw.len());
            for bar in series.bars() {
                prop_assert!(bar.is_sane());
                prop_assert!(bar.low <= bar.open.min(bar.close));
                prop_assert!(bar.open.max(bar.close) <= bar.high);
            }
            for pair in series.bars().windows(2) {
                prop_assert!(pair[0].timestamp < pair[1].timestamp);
            }
        } else {
            let any_bad = raw.iter().any(|r| !Bar::from(*r).is_sane());
            prop_assert!(any_bad);
        }
    }
}

// ── 2. Deterministic Indicators ──────────────────────────────────────

proptest! {
    /// Two computations over the same series are identical to the bit.
    #[test]
    fn indicators_bit_identical(steps in arb_steps(1..120), period in 1..30usize) {
        let series = BarSeries::new("EURUSD", Timeframe::H1, bars_from_walk(&steps)).unwrap();
        let specs = vec![
            IndicatorSpec::sma(period),
            IndicatorSpec::ema(period),
            IndicatorSpec::rsi(period),
            IndicatorSpec::atr(period),
            IndicatorSpec::adx(period),
            IndicatorSpec::bollinger(period, 2.0, BollingerBand::Lower),
            IndicatorSpec::donchian(period, DonchianBand::Upper, true),
        ];
        let a = compute_indicators(&series, &specs);
        let b = compute_indicators(&series, &specs);
        for spec in &specs {
            let key = spec.key();
            let ca = a.column(&key).unwrap();
            let cb = b.column(&key).unwrap();
            prop_assert_eq!(ca.len(), series.len());
            for (x, y) in ca.iter().zip(cb) {
                prop_assert_eq!(x.to_bits(), y.to_bits(), "{} differs", key);
            }
        }
    }
}

// ── 3. PnL Conservation ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Realized equity is exactly initial equity plus the sum of trade PnL,
    /// and the last equity point agrees once the run has finished.
    #[test]
    fn pnl_is_conserved(
        steps in arb_steps(30..250),
        strategy in arb_strategy(),
        config in arb_sim_config(),
    ) {
        let series = BarSeries::new("EURUSD", Timeframe::H1, bars_from_walk(&steps)).unwrap();
        let generator = strategy.build().unwrap();
        let result = simulate_series(&series, generator.as_ref(), &config);

        let total: f64 = result.ledger.trades().iter().map(|t| t.pnl).sum();
        prop_assert!((result.final_equity() - config.initial_equity - total).abs() < 1e-6);

        if !result.is_blown() {
            let last = result.equity_curve.last().unwrap();
            prop_assert!((last.equity - result.final_equity()).abs() < 1e-6);
            prop_assert_eq!(result.bars_processed, series.len());
        }
    }
}

// ── 4. Trade Shape ───────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Trades are sequential, exit after they enter, and intrabar exits fill
    /// inside the exit bar's range.
    #[test]
    fn trades_are_well_formed(
        steps in arb_steps(30..250),
        strategy in arb_strategy(),
        config in arb_sim_config(),
    ) {
        let series = BarSeries::new("EURUSD", Timeframe::H1, bars_from_walk(&steps)).unwrap();
        let generator = strategy.build().unwrap();
        let result = simulate_series(&series, generator.as_ref(), &config);
        let trades = result.ledger.trades();

        for trade in trades {
            prop_assert!(trade.exit_index > trade.entry_index);
            prop_assert!(trade.size > 0.0);
            let bar = series.bars()[trade.exit_index];
            match trade.exit_reason {
                ExitReason::StopLoss | ExitReason::TakeProfit => {
                    prop_assert!(trade.exit_price >= bar.low && trade.exit_price <= bar.high);
                }
                ExitReason::SignalFlip | ExitReason::EndOfData => {
                    prop_assert_eq!(trade.exit_price, bar.close);
                }
            }
        }
        for pair in trades.windows(2) {
            prop_assert!(pair[0].exit_index <= pair[1].entry_index);
        }
    }

    /// Whatever the bar, a stop or target fill lies within `[low, high]`.
    #[test]
    fn intrabar_fill_within_range(
        entry in 0.5..2.0_f64,
        stop_gap in 0.001..0.2_f64,
        target_gap in 0.001..0.2_f64,
        open in 0.3..2.5_f64,
        up in 0.0..0.3_f64,
        down in 0.0..0.3_f64,
        close_frac in 0.0..1.0_f64,
        long in any::<bool>(),
    ) {
        let direction = if long { Direction::Long } else { Direction::Short };
        let low = (open - down).max(0.01);
        let high = open + up;
        let close = low + (high - low) * close_frac;
        let bar = Bar::new(ts(1), open, high.max(close), low.min(close), close, 0.0);
        let position = Position {
            direction,
            entry_price: entry,
            entry_time: ts(0),
            entry_index: 0,
            size: 1.0,
            stop_price: entry - direction.sign() * stop_gap,
            target_price: Some(entry + direction.sign() * target_gap),
            equity_at_entry: 10_000.0,
        };
        if let Some(exit) = check_intrabar_exit(&position, &bar) {
            prop_assert!(exit.price >= bar.low && exit.price <= bar.high);
        }
    }
}

// ── 5. Fixed-Dollar Sizing ───────────────────────────────────────────

proptest! {
    /// size × stop distance == risk dollars.
    #[test]
    fn fixed_dollar_risks_configured_amount(
        risk in 1.0..10_000.0_f64,
        distance in 0.0001..50.0_f64,
        equity in 1.0..1e6_f64,
    ) {
        let policy = FixedDollar { risk_dollars: risk };
        let size = policy.size(equity, distance).unwrap();
        prop_assert!((size * distance - risk).abs() < 1e-9 * risk);
    }

    /// A stop on the wrong side of entry is always rejected.
    #[test]
    fn non_positive_distance_rejected(distance in -50.0..=0.0_f64) {
        let policy = FixedDollar { risk_dollars: 100.0 };
        prop_assert!(policy.size(10_000.0, distance).is_err());
    }
}
