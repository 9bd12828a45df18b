use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minute-aligned candle interval used across the candle store and indicator engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    /// Duration of this timeframe in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 5 * 60_000,
            Timeframe::M15 => 15 * 60_000,
            Timeframe::M30 => 30 * 60_000,
            Timeframe::H1 => 60 * 60_000,
            Timeframe::H4 => 4 * 60 * 60_000,
            Timeframe::D1 => 24 * 60 * 60_000,
        }
    }

    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    /// Returns the start of the period (ms since epoch) containing `timestamp_ms`.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let period = self.duration_ms();
        timestamp_ms - timestamp_ms.rem_euclid(period)
    }

    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        timestamp_ms.rem_euclid(self.duration_ms()) == 0
    }

    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m1" | "1m" => Ok(Timeframe::M1),
            "m5" | "5m" => Ok(Timeframe::M5),
            "m15" | "15m" => Ok(Timeframe::M15),
            "m30" | "30m" => Ok(Timeframe::M30),
            "h1" | "1h" => Ok(Timeframe::H1),
            "h4" | "4h" => Ok(Timeframe::H4),
            "d1" | "1d" => Ok(Timeframe::D1),
            _ => anyhow::bail!("invalid timeframe: '{}'", s),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}
