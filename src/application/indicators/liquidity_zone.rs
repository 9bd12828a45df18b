use super::swing_detector::detect_swing_points;
use crate::domain::market::{Candle, LiquidityLevel, LiquiditySide, LiquidityState, SwingKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Default candle-age before an unswept level expires (spec §4.4 `T_liq`).
pub const DEFAULT_MAX_AGE_CANDLES: usize = 200;
const SWING_RANGE: usize = 3;

/// Projects BUY_SIDE levels above swing highs and SELL_SIDE levels below
/// swing lows (spec §4.4 Liquidity Zone).
pub fn detect_liquidity_levels(candles: &[Candle], now: i64) -> Vec<LiquidityLevel> {
    let swings = detect_swing_points(candles, SWING_RANGE);
    let mut levels = Vec::new();

    for swing in &swings {
        let (side, price) = match swing.kind {
            SwingKind::High => (LiquiditySide::BuySide, swing.price),
            SwingKind::Low => (LiquiditySide::SellSide, swing.price),
        };
        let volume_profile = local_average_volume(candles, swing.candle_index);
        let strength = compute_strength(swing.price, candles, swing.candle_index, now);

        levels.push(LiquidityLevel {
            side,
            price,
            touch_count: 0,
            strength,
            volume_profile,
            state: LiquidityState::Active,
            created_at: now,
            created_at_index: swing.candle_index,
        });
    }
    levels
}

fn local_average_volume(candles: &[Candle], index: usize) -> Decimal {
    let lookback = 20.min(index);
    if lookback == 0 {
        return candles.get(index).map(|c| c.volume).unwrap_or(Decimal::ZERO);
    }
    let start = index - lookback;
    let sum: Decimal = candles[start..index].iter().map(|c| c.volume).sum();
    sum / Decimal::from(lookback)
}

fn compute_strength(price: Decimal, candles: &[Candle], index: usize, now: i64) -> f64 {
    let base = swing_magnitude_score(price, candles, index);
    let touch = touch_score(0);
    let volume = volume_ratio_score(candles, index);
    let decay = time_decay_score(candles, index, now);
    (base * 0.25 + touch * 0.35 + volume * 0.25 + decay * 0.15).clamp(0.0, 100.0)
}

fn swing_magnitude_score(price: Decimal, candles: &[Candle], index: usize) -> f64 {
    let lookback = 20.min(index);
    if lookback == 0 {
        return 50.0;
    }
    let start = index - lookback;
    let avg: Decimal = candles[start..index].iter().map(|c| (c.high + c.low) / Decimal::from(2)).sum::<Decimal>()
        / Decimal::from(lookback);
    if avg.is_zero() {
        return 50.0;
    }
    let deviation = ((price - avg) / avg).to_f64().unwrap_or(0.0).abs();
    (deviation * 1000.0).clamp(0.0, 100.0)
}

/// Diminishing-returns log scaling: touches beyond the first contribute less.
fn touch_score(touch_count: u32) -> f64 {
    if touch_count == 0 {
        return 0.0;
    }
    (((touch_count as f64) + 1.0).ln() * 40.0).clamp(0.0, 100.0)
}

fn volume_ratio_score(candles: &[Candle], index: usize) -> f64 {
    let avg = local_average_volume(candles, index);
    if avg.is_zero() {
        return 50.0;
    }
    let ratio = (candles[index].volume / avg).to_f64().unwrap_or(1.0);
    (ratio * 50.0).clamp(0.0, 100.0)
}

fn time_decay_score(candles: &[Candle], index: usize, _now: i64) -> f64 {
    let age = candles.len().saturating_sub(index);
    (100.0 - age as f64).clamp(0.0, 100.0)
}

/// Advances level state against one new closed candle: ACTIVE -> PARTIAL on
/// touch, -> SWEPT on a close beyond the level; expires stale levels.
pub fn update_levels(levels: &mut [LiquidityLevel], candle: &Candle, current_index: usize) {
    for level in levels.iter_mut() {
        if level.state == LiquidityState::Expired || level.state == LiquidityState::Swept {
            continue;
        }
        if level.is_expired(current_index, DEFAULT_MAX_AGE_CANDLES) {
            level.state = LiquidityState::Expired;
            continue;
        }
        if level.touched_by(candle.high, candle.low) {
            level.touch_count += 1;
            let closed_through = match level.side {
                LiquiditySide::BuySide => candle.close > level.price,
                LiquiditySide::SellSide => candle.close < level.price,
            };
            level.state = if closed_through {
                LiquidityState::Swept
            } else {
                LiquidityState::Partial
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_score_has_diminishing_returns() {
        let first = touch_score(1);
        let second = touch_score(2) - first;
        let third = touch_score(3) - touch_score(2);
        assert!(second < first);
        assert!(third < second);
    }
}
