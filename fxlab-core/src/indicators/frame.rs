//! IndicatorFrame — a bar series plus its precomputed indicator columns.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::spec::IndicatorSpec;
use crate::domain::{Bar, BarSeries};

/// Bars and named indicator columns, all the same length as the series.
///
/// Built once before the bar loop and read by index during it. Columns are
/// `NaN` before their lookback and at placeholder bars.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    series: Arc<BarSeries>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl IndicatorFrame {
    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn shared_series(&self) -> Arc<BarSeries> {
        Arc::clone(&self.series)
    }

    pub fn bars(&self) -> &[Bar] {
        self.series.bars()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.series.get(index)
    }

    /// Defined value of column `key` at `index`; `None` for a missing column,
    /// an out-of-range index, or `NaN`.
    pub fn value(&self, key: &str, index: usize) -> Option<f64> {
        self.columns
            .get(key)
            .and_then(|col| col.get(index).copied())
            .filter(|v| !v.is_nan())
    }

    /// Shorthand for `value(&spec.key(), index)`.
    pub fn value_of(&self, spec: &IndicatorSpec, index: usize) -> Option<f64> {
        self.value(&spec.key(), index)
    }

    pub fn column(&self, key: &str) -> Option<&[f64]> {
        self.columns.get(key).map(|v| v.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }

    /// True when every spec has a defined value at `index`.
    pub fn all_defined(&self, specs: &[IndicatorSpec], index: usize) -> bool {
        specs.iter().all(|s| self.value_of(s, index).is_some())
    }

    /// First index at which every spec is defined.
    pub fn first_ready_index(&self, specs: &[IndicatorSpec]) -> Option<usize> {
        let keys: Vec<String> = specs.iter().map(|s| s.key()).collect();
        (0..self.len()).find(|&i| keys.iter().all(|k| self.value(k, i).is_some()))
    }
}

/// Compute every requested indicator over `series`.
///
/// Pure and deterministic. Duplicate specs (same key) are computed once.
///
/// # Panics
/// If a spec fails [`IndicatorSpec::validate`].
pub fn compute_indicators(series: &BarSeries, specs: &[IndicatorSpec]) -> IndicatorFrame {
    compute_indicators_shared(Arc::new(series.clone()), specs)
}

/// As [`compute_indicators`], sharing an already reference-counted series.
pub fn compute_indicators_shared(series: Arc<BarSeries>, specs: &[IndicatorSpec]) -> IndicatorFrame {
    // Placeholders are not observations: compute over real bars only,
    // then scatter back leaving NaN at placeholder positions.
    let real_index: Vec<usize> = series
        .bars()
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.placeholder)
        .map(|(i, _)| i)
        .collect();
    let real_bars: Vec<Bar> = real_index.iter().map(|&i| series.bars()[i]).collect();

    let mut columns = BTreeMap::new();
    for spec in specs {
        let indicator = spec.build();
        let key = indicator.name().to_string();
        if columns.contains_key(&key) {
            continue;
        }
        let compact = indicator.compute(&real_bars);
        let mut full = vec![f64::NAN; series.len()];
        for (&dst, value) in real_index.iter().zip(compact) {
            full[dst] = value;
        }
        columns.insert(key, full);
    }

    IndicatorFrame { series, columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Timeframe;
    use crate::indicators::{make_bars, BollingerBand};

    fn series(closes: &[f64]) -> BarSeries {
        BarSeries::new("TEST", Timeframe::H1, make_bars(closes)).unwrap()
    }

    #[test]
    fn value_is_none_for_warmup_missing_column_and_out_of_range() {
        let frame = compute_indicators(&series(&[2.0, 3.0, 4.0, 5.0]), &[IndicatorSpec::sma(3)]);
        assert_eq!(frame.value("sma_3", 1), None);
        assert_eq!(frame.value("sma_3", 2), Some(3.0));
        assert_eq!(frame.value("sma_3", 10), None);
        assert_eq!(frame.value("ema_3", 2), None);
        assert_eq!(frame.column("sma_3").unwrap().len(), 4);
    }

    #[test]
    fn duplicate_specs_computed_once() {
        let specs = [IndicatorSpec::ema(3), IndicatorSpec::ema(3), IndicatorSpec::atr(2)];
        let frame = compute_indicators(&series(&[2.0, 3.0, 4.0, 5.0]), &specs);
        assert_eq!(frame.keys().collect::<Vec<_>>(), vec!["atr_2", "ema_3"]);
    }

    #[test]
    fn placeholder_index_holds_nan_and_is_skipped() {
        let mut bars = make_bars(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        let c = bars[2].close;
        bars[3] = Bar {
            open: c,
            high: c,
            low: c,
            close: c,
            volume: 0.0,
            placeholder: true,
            ..bars[3]
        };
        let s = BarSeries::new("TEST", Timeframe::H1, bars).unwrap();
        let frame = compute_indicators(&s, &[IndicatorSpec::sma(3)]);
        assert_eq!(frame.value("sma_3", 2), Some(11.0));
        assert_eq!(frame.value("sma_3", 3), None);
        // window over real bars 1, 2, 4 → closes 11, 12, 14
        assert_eq!(frame.value("sma_3", 4), Some(37.0 / 3.0));
    }

    #[test]
    fn first_ready_index_is_max_lookback() {
        let closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let specs = [
            IndicatorSpec::ema(5),
            IndicatorSpec::rsi(14),
            IndicatorSpec::bollinger(20, 2.0, BollingerBand::Upper),
        ];
        let frame = compute_indicators(&series(&closes), &specs);
        assert_eq!(frame.first_ready_index(&specs), Some(19));
        assert!(frame.all_defined(&specs, 19));
        assert!(!frame.all_defined(&specs, 18));
    }

    #[test]
    fn does_not_mutate_input() {
        let s = series(&[2.0, 3.0, 4.0, 5.0, 6.0]);
        let before = s.clone();
        let _ = compute_indicators(&s, &[IndicatorSpec::ema(2), IndicatorSpec::adx(2)]);
        assert_eq!(s, before);
    }
}
