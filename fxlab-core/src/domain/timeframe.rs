//! Bar timeframes for forex/futures series.
//!
//! A closed set of intervals. Gap accounting steps through the expected
//! timeline by [`Timeframe::duration`].

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown timeframe '{0}' (expected one of M1, M5, M15, M30, H1, H4, D1)")]
pub struct TimeframeParseError(pub String);

impl Timeframe {
    pub const ALL: [Timeframe; 7] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H4,
        Timeframe::D1,
    ];

    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    /// Accepts the canonical names (`H1`) and the common lowercase aliases (`1h`, `1d`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tf = match s.trim().to_ascii_lowercase().as_str() {
            "m1" | "1m" | "1min" => Timeframe::M1,
            "m5" | "5m" | "5min" => Timeframe::M5,
            "m15" | "15m" | "15min" => Timeframe::M15,
            "m30" | "30m" | "30min" => Timeframe::M30,
            "h1" | "1h" | "60m" => Timeframe::H1,
            "h4" | "4h" | "240m" => Timeframe::H4,
            "d1" | "1d" | "daily" => Timeframe::D1,
            _ => return Err(TimeframeParseError(s.to_string())),
        };
        Ok(tf)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.as_str().to_string()
    }
}
