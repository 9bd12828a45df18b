use super::order_block::{OrderBlock, OrderBlockKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An OrderBlock whose boundary was closed through, re-interpreted in the
/// opposite role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerBlock {
    pub original_kind: OrderBlockKind,
    pub top: Decimal,
    pub bottom: Decimal,
    pub left_time: i64,
    pub right_time: i64,
    pub break_time: i64,
    pub break_price: Decimal,
}

impl BreakerBlock {
    pub fn from_broken_order_block(ob: &OrderBlock, break_time: i64, break_price: Decimal) -> Self {
        Self {
            original_kind: ob.kind,
            top: ob.top,
            bottom: ob.bottom,
            left_time: ob.left_time,
            right_time: ob.right_time,
            break_time,
            break_price,
        }
    }
}
