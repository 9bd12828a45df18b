use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBlockKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub kind: OrderBlockKind,
    pub top: Decimal,
    pub bottom: Decimal,
    pub left_time: i64,
    pub right_time: i64,
    /// Strength on a 1-10 scale.
    pub strength: u8,
    pub mitigated: bool,
    pub touch_count: u32,
    pub created_at: i64,
}

impl OrderBlock {
    /// Expired when older than `max_age_ms`, touched 3+ times, or already mitigated
    /// (spec §3 OrderBlock expiry conditions).
    pub fn is_expired(&self, now: i64, max_age_ms: i64) -> bool {
        self.mitigated || self.touch_count >= 3 || (now - self.created_at) > max_age_ms
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.bottom && price <= self.top
    }
}
