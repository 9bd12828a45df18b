use super::order_block::OrderBlockKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub kind: OrderBlockKind,
    pub top: Decimal,
    pub bottom: Decimal,
    pub c1_time: i64,
    pub c2_time: i64,
    pub c3_time: i64,
    pub gap_size: Decimal,
    pub filled: bool,
    /// 0..=100
    pub fill_percent: Decimal,
}

impl FairValueGap {
    /// Updates fill-percent from the lowest low (bullish) / highest high (bearish)
    /// seen since formation, clamped to [0, 100]. Destroys (marks filled) at 100.
    pub fn update_fill(&mut self, candle_low: Decimal, candle_high: Decimal) {
        if self.gap_size.is_zero() {
            return;
        }
        let intrusion = match self.kind {
            OrderBlockKind::Bullish => (self.top - candle_low).max(Decimal::ZERO),
            OrderBlockKind::Bearish => (candle_high - self.bottom).max(Decimal::ZERO),
        };
        let pct = (intrusion / self.gap_size * Decimal::from(100))
            .max(Decimal::ZERO)
            .min(Decimal::from(100));
        if pct > self.fill_percent {
            self.fill_percent = pct;
        }
        if self.fill_percent >= Decimal::from(100) {
            self.filled = true;
        }
    }
}
