//! Sweep integration: failure isolation, cancellation, JSONL output.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{Duration, TimeZone, Utc};
use fxlab_runner::{run_sweep, CancelToken, ScenarioOutcome, ScenarioStatus, SweepConfig};

fn write_sine_csv(dir: &Path, name: &str, n: usize, phase: f64) -> PathBuf {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut text = String::from("timestamp,open,high,low,close\n");
    for i in 0..n {
        let close = 1.25 + (i as f64 * 0.09 + phase).sin() * 0.012;
        let open = 1.25 + ((i as f64 - 1.0) * 0.09 + phase).sin() * 0.012;
        let ts = (start + Duration::hours(i as i64)).to_rfc3339();
        writeln!(
            text,
            "{ts},{open},{},{},{close}",
            open.max(close) + 0.0007,
            open.min(close) - 0.0007
        )
        .unwrap();
    }
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn write_broken_csv(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(
        &path,
        "timestamp,open,high,low,close\n\
         2024-01-02 00:00,1.10,1.11,1.09,1.105\n\
         2024-01-02 01:00,1.10,1.08,1.12,1.10\n",
    )
    .unwrap();
    path
}

fn sweep_toml(datasets: &[(&str, &Path)], output: &Path, parallel: bool) -> String {
    let mut text = format!(
        "output = \"{}\"\nparallel = {parallel}\n\n",
        output.display()
    );
    for (instrument, path) in datasets {
        writeln!(
            text,
            "[[datasets]]\ninstrument = \"{instrument}\"\ntimeframe = \"H1\"\npath = \"{}\"\n",
            path.display()
        )
        .unwrap();
    }
    text.push_str(
        r#"
        [[strategies]]
        type = "donchian_breakout"
        period = 20

        [[grids]]
        type = "ema_crossover"
        fast = [5, 10]
        slow = [10, 30]

        [risk]
        initial_equity = 10000.0
        sizing = { type = "fixed_dollar", risk_dollars = 50.0 }
        stop = { type = "atr_multiple", period = 14, multiple = 2.0 }
        "#,
    );
    text
}

fn read_outcomes(path: &Path) -> Vec<ScenarioOutcome> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn failing_dataset_does_not_abort_sweep() {
    let tmp = tempfile::tempdir().unwrap();
    let good = write_sine_csv(tmp.path(), "eurusd.csv", 300, 0.0);
    let bad = write_broken_csv(tmp.path(), "broken.csv");
    let output = tmp.path().join("out/sweep.jsonl");
    let config = SweepConfig::from_toml_str(&sweep_toml(
        &[("EURUSD", &good), ("GBPUSD", &bad)],
        &output,
        true,
    ))
    .unwrap();

    // 1 explicit + 3 valid grid combos ((5,10) (5,30) (10,30)) per dataset.
    assert_eq!(config.expanded_strategies().len(), 4);

    let summary = run_sweep(&config, &CancelToken::new()).unwrap();
    assert_eq!(summary.total, 8);
    assert_eq!(summary.succeeded + summary.blown, 4);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.cancelled, 0);
    assert_eq!(summary.failure_reasons.get("data_integrity"), Some(&4));

    let outcomes = read_outcomes(&output);
    assert_eq!(outcomes.len(), 8);
    for outcome in &outcomes {
        match outcome.instrument.as_str() {
            "EURUSD" => {
                assert_ne!(outcome.status, ScenarioStatus::Failed);
                assert!(outcome.report.is_some());
                assert!(outcome.run_id.is_some());
            }
            _ => {
                assert_eq!(outcome.status, ScenarioStatus::Failed);
                assert_eq!(outcome.error_kind.as_deref(), Some("data_integrity"));
                assert!(outcome.error.as_deref().unwrap().contains("bar 1"));
            }
        }
    }
}

#[test]
fn pre_cancelled_token_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let good = write_sine_csv(tmp.path(), "eurusd.csv", 300, 0.0);
    let output = tmp.path().join("sweep.jsonl");
    let config =
        SweepConfig::from_toml_str(&sweep_toml(&[("EURUSD", &good)], &output, true)).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let summary = run_sweep(&config, &token).unwrap();
    assert_eq!(summary.cancelled, summary.total);
    assert_eq!(summary.succeeded, 0);
    assert!(read_outcomes(&output).is_empty());
}

#[test]
fn one_line_per_scenario() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_sine_csv(tmp.path(), "eurusd.csv", 300, 0.0);
    let b = write_sine_csv(tmp.path(), "usdjpy.csv", 300, 1.3);
    let output = tmp.path().join("sweep.jsonl");
    let config = SweepConfig::from_toml_str(&sweep_toml(
        &[("EURUSD", &a), ("USDJPY", &b)],
        &output,
        true,
    ))
    .unwrap();

    let summary = run_sweep(&config, &CancelToken::new()).unwrap();
    let outcomes = read_outcomes(&output);
    assert_eq!(outcomes.len(), summary.total);

    let mut indices: Vec<usize> = outcomes.iter().map(|o| o.scenario_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (0..summary.total).collect::<Vec<_>>());
}

#[test]
fn serial_and_parallel_agree() {
    let tmp = tempfile::tempdir().unwrap();
    let a = write_sine_csv(tmp.path(), "eurusd.csv", 300, 0.0);
    let b = write_sine_csv(tmp.path(), "usdjpy.csv", 300, 2.1);

    let mut by_mode = Vec::new();
    for parallel in [false, true] {
        let output = tmp.path().join(format!("sweep_{parallel}.jsonl"));
        let config = SweepConfig::from_toml_str(&sweep_toml(
            &[("EURUSD", &a), ("USDJPY", &b)],
            &output,
            parallel,
        ))
        .unwrap();
        run_sweep(&config, &CancelToken::new()).unwrap();
        let mut outcomes = read_outcomes(&output);
        outcomes.sort_by_key(|o| o.scenario_index);
        by_mode.push(outcomes);
    }
    assert_eq!(by_mode[0], by_mode[1]);
}
