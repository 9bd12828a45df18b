use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmsKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmsState {
    Potential,
    Confirmed,
    Invalidated,
    Established,
}

/// Break of Market Structure: a confirmed close through a structural swing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakOfMarketStructure {
    pub kind: BmsKind,
    pub breached_level: Decimal,
    pub break_price: Decimal,
    pub state: BmsState,
    /// 0..=100
    pub confidence: f64,
}
