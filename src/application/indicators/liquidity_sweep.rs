use crate::domain::market::{Candle, LiquidityLevel, LiquiditySide, LiquiditySweep, SweepDirection, SweepPhase};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Candle-count window within which a reversal must occur (spec §4.4 `R`).
pub const DEFAULT_REVERSAL_WINDOW: usize = 10;
/// Minimum distance beyond the level, as a fraction of price, to count as a breach.
pub const DEFAULT_MIN_BREACH_PCT: f64 = 0.0002;
/// Maximum distance beyond the level before a breach is considered too violent
/// to be a genuine liquidity grab.
pub const DEFAULT_MAX_BREACH_PCT: f64 = 0.01;
/// Minimum reversal distance, as a fraction of price, required to confirm a sweep.
pub const DEFAULT_REVERSAL_CONFIRMATION_PCT: f64 = 0.0005;

/// Runs the three-phase sweep state machine (spec §4.4) against candles
/// following a liquidity level's formation. Returns a completed sweep only
/// when phase SWEEP_COMPLETED is reached within `DEFAULT_REVERSAL_WINDOW`.
pub fn detect_sweep(level: &LiquidityLevel, candles_after: &[Candle]) -> Option<LiquiditySweep> {
    let mut phase = SweepPhase::NoBreach;
    let mut breach_time = 0i64;
    let mut breach_distance = Decimal::ZERO;
    let mut close_time = 0i64;
    let mut candles_since_breach = 0usize;

    for candle in candles_after {
        match phase {
            SweepPhase::NoBreach => {
                if let Some(distance) = breach_distance_for(level, candle) {
                    phase = SweepPhase::Breached;
                    breach_time = candle.open_time;
                    breach_distance = distance;
                }
            }
            SweepPhase::Breached => {
                candles_since_breach += 1;
                if closed_beyond(level, candle) {
                    phase = SweepPhase::CloseConfirmed;
                    close_time = candle.open_time;
                } else if candles_since_breach > DEFAULT_REVERSAL_WINDOW {
                    phase = SweepPhase::TimedOut;
                    break;
                }
            }
            SweepPhase::CloseConfirmed => {
                candles_since_breach += 1;
                if candles_since_breach > DEFAULT_REVERSAL_WINDOW {
                    phase = SweepPhase::TimedOut;
                    break;
                }
                if reversed_back(level, candle) {
                    let reversal_strength =
                        score_reversal(level, candle, breach_distance, candles_since_breach);
                    return Some(LiquiditySweep {
                        direction: sweep_direction(level),
                        breached_level: level.price,
                        breach_time,
                        close_time,
                        reversal_time: Some(candle.open_time),
                        breach_distance,
                        reversal_strength,
                        valid: true,
                    });
                }
            }
            SweepPhase::SweepCompleted | SweepPhase::TimedOut => break,
        }
    }
    None
}

fn breach_distance_for(level: &LiquidityLevel, candle: &Candle) -> Option<Decimal> {
    if level.price.is_zero() {
        return None;
    }
    let (extreme, beyond) = match level.side {
        LiquiditySide::BuySide => (candle.high, candle.high > level.price),
        LiquiditySide::SellSide => (candle.low, candle.low < level.price),
    };
    if !beyond {
        return None;
    }
    let distance = (extreme - level.price).abs();
    let pct = (distance / level.price).to_f64().unwrap_or(0.0);
    if pct >= DEFAULT_MIN_BREACH_PCT && pct <= DEFAULT_MAX_BREACH_PCT {
        Some(distance)
    } else {
        None
    }
}

fn closed_beyond(level: &LiquidityLevel, candle: &Candle) -> bool {
    match level.side {
        LiquiditySide::BuySide => candle.close > level.price,
        LiquiditySide::SellSide => candle.close < level.price,
    }
}

fn reversed_back(level: &LiquidityLevel, candle: &Candle) -> bool {
    if level.price.is_zero() {
        return false;
    }
    let reversed = match level.side {
        LiquiditySide::BuySide => candle.close < level.price,
        LiquiditySide::SellSide => candle.close > level.price,
    };
    if !reversed {
        return false;
    }
    let distance = (candle.close - level.price).abs();
    let pct = (distance / level.price).to_f64().unwrap_or(0.0);
    pct >= DEFAULT_REVERSAL_CONFIRMATION_PCT
}

fn sweep_direction(level: &LiquidityLevel) -> SweepDirection {
    match level.side {
        // Sweeping buy-side liquidity (above highs) then reversing down is bearish-turned-bullish
        // per ICT convention: a sell-side sweep precedes a bullish continuation.
        LiquiditySide::BuySide => SweepDirection::Bearish,
        LiquiditySide::SellSide => SweepDirection::Bullish,
    }
}

fn score_reversal(level: &LiquidityLevel, candle: &Candle, breach_distance: Decimal, candles_elapsed: usize) -> f64 {
    let distance_score = if level.price.is_zero() {
        0.0
    } else {
        ((breach_distance / level.price).to_f64().unwrap_or(0.0) * 10_000.0).clamp(0.0, 100.0)
    };
    let speed_score = (100.0 - (candles_elapsed as f64 / DEFAULT_REVERSAL_WINDOW as f64) * 100.0).clamp(0.0, 100.0);
    let volume_score = 50.0; // local average unavailable without full history; neutral weight
    let cleanliness_score = if candle.body().is_zero() {
        50.0
    } else {
        60.0
    };
    (distance_score * 0.30 + speed_score * 0.30 + volume_score * 0.25 + cleanliness_score * 0.15).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{LiquidityState, Timeframe};
    use rust_decimal_macros::dec;

    fn c(open_time: i64, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "EURUSD".into(),
            timeframe: Timeframe::M1,
            open_time,
            open: close,
            high,
            low,
            close,
            volume: dec!(1000),
            closed: true,
        }
    }

    #[test]
    fn sell_side_sweep_completes_on_reversal_candle() {
        let level = LiquidityLevel {
            side: LiquiditySide::SellSide,
            price: dec!(1.0900),
            touch_count: 0,
            strength: 50.0,
            volume_profile: dec!(1000),
            state: LiquidityState::Active,
            created_at: 0,
            created_at_index: 0,
        };
        let candles = vec![
            c(1, dec!(1.0910), dec!(1.0902), dec!(1.0905)),
            c(2, dec!(1.0903), dec!(1.0895), dec!(1.0897)),
            c(3, dec!(1.0901), dec!(1.0896), dec!(1.0899)),
            c(4, dec!(1.0908), dec!(1.0899), dec!(1.0905)),
        ];
        let sweep = detect_sweep(&level, &candles);
        assert!(sweep.is_some());
        let sweep = sweep.unwrap();
        assert_eq!(sweep.direction, SweepDirection::Bullish);
        assert!(sweep.reversal_strength >= 30.0 && sweep.reversal_strength <= 100.0);
    }
}
