use super::swing_detector::detect_swing_points;
use crate::domain::market::{
    Candle, SwingKind, SwingPoint, TrendDirection, TrendPattern, TrendState, TrendStrengthLevel, TrendStructure,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

pub const DEFAULT_SWING_STRENGTH: usize = 3;
/// Minimum confirmed patterns before a trend is considered confirmed (spec
/// §9's resolved open question; configurable, default 2).
pub const DEFAULT_MIN_PATTERNS_FOR_CONFIRMATION: u32 = 2;
const NOISE_FILTER_ATR_MULTIPLIER: f64 = 0.3;

fn average_true_range(candles: &[Candle], period: usize) -> Decimal {
    if candles.len() < 2 {
        return Decimal::ZERO;
    }
    let window = period.min(candles.len() - 1);
    let start = candles.len() - window;
    let mut sum = Decimal::ZERO;
    for i in start..candles.len() {
        if i == 0 {
            continue;
        }
        let high = candles[i].high;
        let low = candles[i].low;
        let prev_close = candles[i - 1].close;
        let tr = (high - low).max((high - prev_close).abs()).max((low - prev_close).abs());
        sum += tr;
    }
    if window == 0 {
        Decimal::ZERO
    } else {
        sum / Decimal::from(window)
    }
}

/// Classifies successive swing points into HH/HL/LH/LL patterns, filtering
/// moves smaller than `0.3 * ATR` as noise (spec §4.4 Trend Recognition).
pub fn detect_trend_structures(candles: &[Candle]) -> Vec<TrendStructure> {
    let swings = detect_swing_points(candles, DEFAULT_SWING_STRENGTH);
    let atr = average_true_range(candles, 14);
    let noise_floor = atr * Decimal::try_from(NOISE_FILTER_ATR_MULTIPLIER).unwrap_or(Decimal::ZERO);

    let mut structures = Vec::new();
    let mut last_high: Option<&SwingPoint> = None;
    let mut last_low: Option<&SwingPoint> = None;

    for swing in &swings {
        match swing.kind {
            SwingKind::High => {
                if let Some(prev) = last_high {
                    let delta = (swing.price - prev.price).abs();
                    if delta >= noise_floor {
                        let pattern = if swing.price > prev.price {
                            TrendPattern::HigherHigh
                        } else {
                            TrendPattern::LowerHigh
                        };
                        structures.push(build_structure(candles, swing, prev, pattern));
                    }
                }
                last_high = Some(swing);
            }
            SwingKind::Low => {
                if let Some(prev) = last_low {
                    let delta = (swing.price - prev.price).abs();
                    if delta >= noise_floor {
                        let pattern = if swing.price > prev.price {
                            TrendPattern::HigherLow
                        } else {
                            TrendPattern::LowerLow
                        };
                        structures.push(build_structure(candles, swing, prev, pattern));
                    }
                }
                last_low = Some(swing);
            }
        }
    }
    structures
}

fn build_structure(candles: &[Candle], swing: &SwingPoint, prev: &SwingPoint, pattern: TrendPattern) -> TrendStructure {
    let price_change_pct = if prev.price.is_zero() {
        0.0
    } else {
        ((swing.price - prev.price) / prev.price).to_f64().unwrap_or(0.0) * 100.0
    };
    TrendStructure {
        pattern,
        price: swing.price,
        timestamp: candles.get(swing.candle_index).map(|c| c.open_time).unwrap_or(0),
        previous_swing_price: prev.price,
        price_change_pct,
    }
}

/// Folds a sequence of trend structures into the current `TrendState`,
/// preserving `confirmed` across unchanged directions (spec §4.5).
pub fn fold_trend_state(structures: &[TrendStructure], prior: Option<&TrendState>, now: i64) -> TrendState {
    if structures.is_empty() {
        return prior.cloned().unwrap_or_else(|| TrendState::ranging(now));
    }

    let hh_hl = structures
        .iter()
        .filter(|s| matches!(s.pattern, TrendPattern::HigherHigh | TrendPattern::HigherLow))
        .count();
    let ll_lh = structures
        .iter()
        .filter(|s| matches!(s.pattern, TrendPattern::LowerLow | TrendPattern::LowerHigh))
        .count();

    let last_pattern = structures.last().unwrap().pattern;
    let prev_last_pattern = structures.len().checked_sub(2).map(|i| structures[i].pattern);
    let direction_flip = prev_last_pattern.is_some_and(|p| direction_of(p) != direction_of(last_pattern));

    let direction = if direction_flip {
        TrendDirection::Transition
    } else if hh_hl > ll_lh {
        TrendDirection::Uptrend
    } else if ll_lh > hh_hl {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Ranging
    };

    let pattern_consistency = if structures.is_empty() {
        0.0
    } else {
        (hh_hl.max(ll_lh) as f64 / structures.len() as f64) * 100.0
    };
    let momentum = structures.last().map(|s| s.price_change_pct.abs().min(10.0) * 10.0).unwrap_or(0.0);
    let structure_quality = (structures.len().min(10) as f64 / 10.0) * 100.0;
    let consecutive_strength = (hh_hl.max(ll_lh).min(5) as f64 / 5.0) * 100.0;

    let strength = (pattern_consistency * 0.35 + momentum * 0.25 + structure_quality * 0.20 + consecutive_strength * 0.20)
        .clamp(0.0, 100.0);

    let pattern_count = hh_hl.max(ll_lh) as u32;
    let confirmed = pattern_count >= DEFAULT_MIN_PATTERNS_FOR_CONFIRMATION && strength >= 40.0;

    let start_timestamp = match prior {
        Some(p) if p.direction == direction => p.start_timestamp,
        _ => now,
    };

    TrendState {
        direction,
        strength,
        strength_level: TrendStrengthLevel::from_score(strength),
        pattern_count,
        confirmed: confirmed || (prior.is_some_and(|p| p.confirmed) && prior.map(|p| p.direction) == Some(direction)),
        start_timestamp,
        last_update: now,
    }
}

fn direction_of(pattern: TrendPattern) -> bool {
    matches!(pattern, TrendPattern::HigherHigh | TrendPattern::HigherLow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_structures_preserve_prior_state() {
        let prior = TrendState {
            direction: TrendDirection::Uptrend,
            strength: 55.0,
            strength_level: TrendStrengthLevel::Moderate,
            pattern_count: 3,
            confirmed: true,
            start_timestamp: 10,
            last_update: 10,
        };
        let next = fold_trend_state(&[], Some(&prior), 20);
        assert_eq!(next.direction, TrendDirection::Uptrend);
        assert!(next.confirmed);
    }
}
