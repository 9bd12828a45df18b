use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendPattern {
    HigherHigh,
    HigherLow,
    LowerHigh,
    LowerLow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStructure {
    pub pattern: TrendPattern,
    pub price: Decimal,
    pub timestamp: i64,
    pub previous_swing_price: Decimal,
    pub price_change_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Ranging,
    Transition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendStrengthLevel {
    VeryWeak,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl TrendStrengthLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s < 20.0 => TrendStrengthLevel::VeryWeak,
            s if s < 40.0 => TrendStrengthLevel::Weak,
            s if s < 60.0 => TrendStrengthLevel::Moderate,
            s if s < 80.0 => TrendStrengthLevel::Strong,
            _ => TrendStrengthLevel::VeryStrong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendState {
    pub direction: TrendDirection,
    /// 0..=100
    pub strength: f64,
    pub strength_level: TrendStrengthLevel,
    pub pattern_count: u32,
    pub confirmed: bool,
    pub start_timestamp: i64,
    pub last_update: i64,
}

impl TrendState {
    pub fn ranging(now: i64) -> Self {
        Self {
            direction: TrendDirection::Ranging,
            strength: 0.0,
            strength_level: TrendStrengthLevel::VeryWeak,
            pattern_count: 0,
            confirmed: false,
            start_timestamp: now,
            last_update: now,
        }
    }
}
