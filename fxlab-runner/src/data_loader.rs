//! CSV bar loading for the runner.
//!
//! Reads `timestamp,open,high,low,close[,volume][,placeholder]` rows, parses
//! timestamps leniently, and hands the rows to the core bar-hygiene layer.
//! Nothing here repairs data: a bad row is an error.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use fxlab_core::data::{load_bars_with_report, DataIntegrityError, LoadOptions, LoadReport, RawBar};
use fxlab_core::domain::{BarSeries, Timeframe};

use crate::config::DataConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognised timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error(transparent)]
    Integrity(#[from] DataIntegrityError),
}

impl LoadError {
    /// Offending bar index, for integrity failures that have one.
    pub fn bar_index(&self) -> Option<usize> {
        match self {
            LoadError::Integrity(e) => e.bar_index(),
            LoadError::Timestamp { row, .. } => Some(*row),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    placeholder: Option<bool>,
}

/// Parse a timestamp in any of the accepted layouts, interpreted as UTC:
/// RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM:SS`,
/// or a bare `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for layout in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Read raw rows from any CSV source with a header line.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawBar>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row, record) in csv_reader.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let timestamp =
            parse_timestamp(&record.timestamp).ok_or_else(|| LoadError::Timestamp {
                row,
                value: record.timestamp.clone(),
            })?;
        rows.push(RawBar {
            timestamp,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume.unwrap_or(0.0),
            placeholder: record.placeholder.unwrap_or(false),
        });
    }
    Ok(rows)
}

/// Read raw rows from a CSV file.
pub fn read_csv(path: &Path) -> Result<Vec<RawBar>, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_rows(file)
}

/// Load and validate a series from a CSV file.
pub fn load_csv_series(
    path: &Path,
    instrument: &str,
    timeframe: Timeframe,
    options: &LoadOptions,
) -> Result<(BarSeries, LoadReport), LoadError> {
    let rows = read_csv(path)?;
    let (series, report) = load_bars_with_report(instrument, timeframe, &rows, options)?;
    info!(
        instrument,
        timeframe = %timeframe,
        path = %path.display(),
        bars = series.len(),
        missing = report.gaps.missing_slots,
        duplicates = report.duplicates_replaced,
        "loaded bar series"
    );
    Ok((series, report))
}

/// Load the dataset described by a `[data]` config section.
pub fn load_dataset(config: &DataConfig) -> Result<(BarSeries, LoadReport), LoadError> {
    load_csv_series(
        &config.path,
        &config.instrument,
        config.timeframe,
        &config.load_options(),
    )
}

/// Content hash of a validated series (BLAKE3 over every bar field).
///
/// Two runs on the same bars share a hash regardless of the file they came from.
pub fn dataset_hash(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.instrument().as_bytes());
    hasher.update(series.timeframe().as_str().as_bytes());
    for bar in series.bars() {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
        hasher.update(&[bar.placeholder as u8]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Serde adapter for optional config timestamps written in any
/// [`parse_timestamp`] layout. Serializes as RFC 3339.
pub(crate) mod flexible_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            super::parse_timestamp(&s)
                .ok_or_else(|| D::Error::custom(format!("unrecognised timestamp '{s}'")))
        })
        .transpose()
    }
}
