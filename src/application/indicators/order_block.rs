use super::swing_detector::detect_swing_points;
use crate::domain::market::{Candle, OrderBlock, OrderBlockKind, SwingKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Default swing lookback (spec §4.4: "lookback L (default 5)").
pub const DEFAULT_SWING_LOOKBACK: usize = 5;
/// Minimum candle body for a candidate order-block origin candle.
pub const DEFAULT_MIN_BODY: f64 = 0.0005;

/// Detects order blocks: for each confirmed swing low, walk back up to 5
/// candles to find the last bearish candle with a body >= B_min, forming a
/// BULLISH order block; symmetrically a swing high yields a BEARISH block
/// (spec §4.4).
pub fn detect_order_blocks(candles: &[Candle], now: i64) -> Vec<OrderBlock> {
    let swings = detect_swing_points(candles, DEFAULT_SWING_LOOKBACK);
    let mut blocks = Vec::new();

    for swing in &swings {
        let idx = swing.candle_index;
        let walk_start = idx.saturating_sub(5);
        match swing.kind {
            SwingKind::Low => {
                for i in (walk_start..=idx).rev() {
                    let candle = &candles[i];
                    if candle.is_bearish() && is_significant_body(candle) {
                        blocks.push(build_block(candles, i, OrderBlockKind::Bullish, now));
                        break;
                    }
                }
            }
            SwingKind::High => {
                for i in (walk_start..=idx).rev() {
                    let candle = &candles[i];
                    if candle.is_bullish() && is_significant_body(candle) {
                        blocks.push(build_block(candles, i, OrderBlockKind::Bearish, now));
                        break;
                    }
                }
            }
        }
    }

    blocks
}

fn is_significant_body(candle: &Candle) -> bool {
    if candle.open.is_zero() {
        return false;
    }
    let body_pct = (candle.body() / candle.open).to_f64().unwrap_or(0.0).abs();
    body_pct >= DEFAULT_MIN_BODY
}

fn build_block(candles: &[Candle], index: usize, kind: OrderBlockKind, now: i64) -> OrderBlock {
    let candle = &candles[index];
    let range_pct = if !candle.open.is_zero() {
        ((candle.high - candle.low) / candle.open).to_f64().unwrap_or(0.0)
    } else {
        0.0
    };
    let avg_volume = average_volume(candles, index);
    let volume_ratio = if avg_volume > Decimal::ZERO {
        (candle.volume / avg_volume).to_f64().unwrap_or(1.0)
    } else {
        1.0
    };
    let candle_count_score = (candles.len() - index).min(20) as f64 / 20.0;

    let raw = range_pct.min(1.0) * 0.4 + volume_ratio.min(2.0) / 2.0 * 0.4 + candle_count_score * 0.2;
    let strength = (1.0 + raw * 9.0).clamp(1.0, 10.0) as u8;

    OrderBlock {
        kind,
        top: candle.high,
        bottom: candle.low,
        left_time: candle.open_time,
        right_time: candle.open_time,
        strength,
        mitigated: false,
        touch_count: 0,
        created_at: now,
    }
}

fn average_volume(candles: &[Candle], index: usize) -> Decimal {
    let lookback = 20.min(index);
    if lookback == 0 {
        return Decimal::ZERO;
    }
    let start = index - lookback;
    let sum: Decimal = candles[start..index].iter().map(|c| c.volume).sum();
    sum / Decimal::from(lookback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time: 0,
            open,
            high,
            low,
            close,
            volume,
            closed: true,
        }
    }

    #[test]
    fn no_blocks_when_too_few_candles() {
        let candles = vec![candle(dec!(100), dec!(101), dec!(99), dec!(100.5), dec!(10))];
        assert!(detect_order_blocks(&candles, 0).is_empty());
    }
}
