//! Integration tests for the CSV → validation → backtest pipeline.
//!
//! Every test writes its own CSV into a temp dir, so nothing depends on
//! fixtures outside the crate.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Duration, TimeZone, Utc};
use fxlab_core::data::{DataIntegrityError, LoadOptions};
use fxlab_core::domain::{ExitReason, Timeframe};
use fxlab_core::engine::RunStatus;
use fxlab_runner::{load_csv_series, run_backtest, LoadError, RunConfig, RunError};

/// Hourly bars from Tuesday 2024-01-02, a slow sine wave around 1.10.
fn sine_rows(n: usize) -> Vec<(String, f64, f64, f64, f64)> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = 1.10 + (i as f64 * 0.08).sin() * 0.01;
            let open = 1.10 + ((i as f64 - 1.0) * 0.08).sin() * 0.01;
            let ts = (start + Duration::hours(i as i64))
                .format("%Y-%m-%d %H:%M:%S")
                .to_string();
            (ts, open, open.max(close) + 0.0008, open.min(close) - 0.0008, close)
        })
        .collect()
}

/// Bars whose open is the previous close, padded half a point either side.
/// The bar at `gap_at` opens at its own close instead, gapping away from the
/// previous bar.
fn step_rows(closes: &[f64], gap_at: Option<usize>) -> Vec<(String, f64, f64, f64, f64)> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 || gap_at == Some(i) {
                close
            } else {
                closes[i - 1]
            };
            let ts = (start + Duration::hours(i as i64)).to_rfc3339();
            (ts, open, open.max(close) + 0.5, open.min(close) - 0.5, close)
        })
        .collect()
}

fn write_csv(dir: &Path, name: &str, rows: &[(String, f64, f64, f64, f64)]) -> PathBuf {
    let mut text = String::from("timestamp,open,high,low,close,volume\n");
    for (ts, o, h, l, c) in rows {
        writeln!(text, "{ts},{o},{h},{l},{c},1000").unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn run_toml(csv: &Path, extra: &str) -> String {
    format!(
        r#"
        [data]
        instrument = "EURUSD"
        timeframe = "H1"
        path = "{}"

        [strategy]
        type = "ema_crossover"
        fast = 5
        slow = 20

        {extra}
        "#,
        csv.display()
    )
}

#[test]
fn loads_clean_csv() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_csv(tmp.path(), "eurusd.csv", &sine_rows(120));
    let (series, report) =
        load_csv_series(&path, "EURUSD", Timeframe::H1, &LoadOptions::default()).unwrap();
    assert_eq!(series.len(), 120);
    assert_eq!(report.rows_read, 120);
    assert_eq!(report.gaps.missing_slots, 0);
    assert_eq!(report.duplicates_replaced, 0);
}

#[test]
fn high_below_low_is_integrity_error() {
    let tmp = tempfile::tempdir().unwrap();
    let mut rows = sine_rows(50);
    // Row 17: high < low.
    let (ts, o, _, _, c) = rows[17].clone();
    rows[17] = (ts, o, 1.05, 1.15, c);
    let path = write_csv(tmp.path(), "bad.csv", &rows);

    let err = load_csv_series(&path, "EURUSD", Timeframe::H1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Integrity(DataIntegrityError::OhlcViolation { index: 17, .. })
    ));
    assert_eq!(err.bar_index(), Some(17));
}

#[test]
fn too_many_gaps_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    // Keep every other hour: half the expected slots are missing.
    let rows: Vec<_> = sine_rows(48).into_iter().step_by(2).collect();
    let path = write_csv(tmp.path(), "gappy.csv", &rows);

    let err = load_csv_series(&path, "EURUSD", Timeframe::H1, &LoadOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::Integrity(DataIntegrityError::TooManyGaps { .. })
    ));

    let lenient = LoadOptions {
        max_missing_fraction: 0.6,
        ..LoadOptions::default()
    };
    let (_, report) = load_csv_series(&path, "EURUSD", Timeframe::H1, &lenient).unwrap();
    assert_eq!(report.gaps.missing_slots, 23);
}

#[test]
fn date_window_trims_rows() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_csv(tmp.path(), "eurusd.csv", &sine_rows(72));
    let options = LoadOptions {
        start: Some(Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap()),
        end: Some(Utc.with_ymd_and_hms(2024, 1, 3, 23, 0, 0).unwrap()),
        ..LoadOptions::default()
    };
    let (series, report) = load_csv_series(&path, "EURUSD", Timeframe::H1, &options).unwrap();
    assert_eq!(series.len(), 24);
    assert_eq!(report.rows_outside_window, 48);
}

#[test]
fn run_backtest_end_to_end() {
    let tmp = tempfile::tempdir().unwrap();
    let path = write_csv(tmp.path(), "eurusd.csv", &sine_rows(400));
    let config = RunConfig::from_toml_str(&run_toml(
        &path,
        r#"
        [risk]
        initial_equity = 10000.0
        sizing = { type = "fixed_dollar", risk_dollars = 100.0 }
        stop = { type = "fixed_distance", distance = 0.005 }

        [monte_carlo]
        runs = 200
        seed = 11
        "#,
    ))
    .unwrap();

    let result = run_backtest(&config).unwrap();
    assert_eq!(result.bar_count, 400);
    assert_eq!(result.simulation.status, RunStatus::Completed);
    assert!(result.report.trade_count > 0);
    assert!(
        (result.report.final_equity - result.simulation.final_equity()).abs() < 1e-9
    );
    let mc = result.monte_carlo.as_ref().unwrap();
    assert_eq!(mc.runs, 200);
    assert_eq!(mc.seed, 11);
    assert!(result.load_report.is_some());

    // Same config, same data: identical outcome.
    let again = run_backtest(&config).unwrap();
    assert_eq!(again.run_id, result.run_id);
    assert_eq!(again.simulation, result.simulation);
    assert_eq!(again.report, result.report);
    assert_eq!(again.monte_carlo, result.monte_carlo);
}

#[test]
fn run_backtest_reports_integrity_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let mut rows = sine_rows(60);
    rows[30].1 = -1.0;
    let path = write_csv(tmp.path(), "neg.csv", &rows);
    let config = RunConfig::from_toml_str(&run_toml(&path, "")).unwrap();

    let err = run_backtest(&config).unwrap_err();
    assert_eq!(err.kind(), "data_integrity");
    assert_eq!(err.bar_index(), Some(30));
    assert!(matches!(err, RunError::Data(LoadError::Integrity(_))));
}

#[test]
fn ruin_keeps_partial_results() {
    let tmp = tempfile::tempdir().unwrap();
    // Flat at 100, a step to 110 that triggers a long entry at bar 30 with its
    // stop at 109, then bar 31 opens at 50 and fills the stop at the open.
    let closes: Vec<f64> = (0..40)
        .map(|i| match i {
            0..=29 => 100.0,
            30 => 110.0,
            _ => 50.0,
        })
        .collect();
    let rows = step_rows(&closes, Some(31));
    assert_eq!(rows[31].1, 50.0);
    let path = write_csv(tmp.path(), "gap.csv", &rows);
    let config = RunConfig::from_toml_str(&run_toml(
        &path,
        r#"
        [risk]
        initial_equity = 500.0
        sizing = { type = "fixed_dollar", risk_dollars = 100.0 }
        stop = { type = "fixed_distance", distance = 1.0 }
        "#,
    ))
    .unwrap();

    let result = run_backtest(&config).unwrap();
    assert!(result.is_blown());
    let ruin = result.ruin_error().unwrap();
    assert_eq!(ruin.bar_index, 31);
    // size 100 × (110 - 50) = 6000 lost on 500 of equity
    assert!((ruin.terminal_equity - (-5_500.0)).abs() < 1e-6);
    assert_eq!(result.simulation.bars_processed, 32);
    assert_eq!(result.report.trade_count, 1);
    let trade = &result.simulation.ledger.trades()[0];
    assert_eq!(trade.entry_index, 30);
    assert_eq!(trade.exit_index, 31);
    assert_eq!(trade.exit_price, 50.0);
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert!((result.report.final_equity - (-5_500.0)).abs() < 1e-6);
}

#[test]
fn missing_file_is_data_load_error() {
    let tmp = tempfile::tempdir().unwrap();
    let config =
        RunConfig::from_toml_str(&run_toml(&tmp.path().join("absent.csv"), "")).unwrap();
    let err = run_backtest(&config).unwrap_err();
    assert_eq!(err.kind(), "data_load");
    assert_eq!(err.bar_index(), None);
}
