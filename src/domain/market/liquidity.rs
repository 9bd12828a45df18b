use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquiditySide {
    BuySide,
    SellSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityState {
    Active,
    Partial,
    Swept,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub side: LiquiditySide,
    pub price: Decimal,
    pub touch_count: u32,
    /// 0..=100
    pub strength: f64,
    pub volume_profile: Decimal,
    pub state: LiquidityState,
    pub created_at: i64,
    /// Index of the candle, within the window used to build this level, where it
    /// was created — used to drive the `T_liq` candle-count expiry.
    pub created_at_index: usize,
}

impl LiquidityLevel {
    pub fn touched_by(&self, high: Decimal, low: Decimal) -> bool {
        match self.side {
            LiquiditySide::BuySide => high >= self.price,
            LiquiditySide::SellSide => low <= self.price,
        }
    }

    pub fn is_expired(&self, current_index: usize, max_age_candles: usize) -> bool {
        current_index.saturating_sub(self.created_at_index) > max_age_candles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepDirection {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepPhase {
    NoBreach,
    Breached,
    CloseConfirmed,
    SweepCompleted,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub direction: SweepDirection,
    pub breached_level: Decimal,
    pub breach_time: i64,
    pub close_time: i64,
    pub reversal_time: Option<i64>,
    pub breach_distance: Decimal,
    /// 0..=100
    pub reversal_strength: f64,
    pub valid: bool,
}
