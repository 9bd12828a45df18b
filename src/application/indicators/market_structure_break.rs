use super::swing_detector::detect_swing_points;
use crate::domain::market::{
    BmsKind, BmsState, BreakOfMarketStructure, Candle, SwingKind, TrendDirection,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

const SWING_RANGE: usize = 3;
/// Minimum close-through distance as a fraction of price (spec §4.4 BMS).
const MIN_BREAK_DISTANCE_PCT: f64 = 0.003;
/// Minimum follow-through distance as a fraction of price, within `FOLLOW_THROUGH_WINDOW`.
const MIN_FOLLOW_THROUGH_PCT: f64 = 0.005;
const FOLLOW_THROUGH_WINDOW: usize = 3;

/// Detects confirmed breaks of market structure against the most recent
/// structural swings (spec §4.4). `candles` must include enough trailing
/// history to evaluate follow-through for the final break found.
pub fn detect_breaks_of_structure(candles: &[Candle], trend: Option<TrendDirection>) -> Vec<BreakOfMarketStructure> {
    let swings = detect_swing_points(candles, SWING_RANGE);
    let mut breaks = Vec::new();

    for swing in &swings {
        let break_index = match find_break_candle(candles, swing.candle_index, swing.kind, swing.price) {
            Some(idx) => idx,
            None => continue,
        };
        let break_candle = &candles[break_index];
        let kind = match swing.kind {
            SwingKind::High => BmsKind::Bullish,
            SwingKind::Low => BmsKind::Bearish,
        };

        let break_distance_pct = distance_pct(swing.price, break_candle.close);
        if break_distance_pct < MIN_BREAK_DISTANCE_PCT {
            continue;
        }

        let follow_through_pct = max_follow_through(candles, break_index, kind);
        let volume_ratio = volume_ratio(candles, break_index);
        let structure_quality = new_swing_formed(candles, break_index, kind, SWING_RANGE);
        let trend_alignment = trend_alignment_score(kind, trend);

        let state = if follow_through_pct >= MIN_FOLLOW_THROUGH_PCT {
            BmsState::Confirmed
        } else {
            BmsState::Potential
        };

        let confidence = confidence_score(break_distance_pct, follow_through_pct, volume_ratio, structure_quality, trend_alignment);

        breaks.push(BreakOfMarketStructure {
            kind,
            breached_level: swing.price,
            break_price: break_candle.close,
            state,
            confidence,
        });
    }
    breaks
}

fn find_break_candle(candles: &[Candle], swing_index: usize, kind: SwingKind, swing_price: Decimal) -> Option<usize> {
    candles.iter().enumerate().skip(swing_index + 1).find_map(|(i, c)| {
        let broken = match kind {
            SwingKind::High => c.close > swing_price,
            SwingKind::Low => c.close < swing_price,
        };
        broken.then_some(i)
    })
}

fn distance_pct(level: Decimal, price: Decimal) -> f64 {
    if level.is_zero() {
        return 0.0;
    }
    ((price - level).abs() / level).to_f64().unwrap_or(0.0)
}

fn max_follow_through(candles: &[Candle], break_index: usize, kind: BmsKind) -> f64 {
    let break_price = candles[break_index].close;
    let end = (break_index + FOLLOW_THROUGH_WINDOW).min(candles.len() - 1);
    candles[break_index..=end]
        .iter()
        .map(|c| {
            let extreme = match kind {
                BmsKind::Bullish => c.high,
                BmsKind::Bearish => c.low,
            };
            distance_pct(break_price, extreme)
        })
        .fold(0.0, f64::max)
}

fn volume_ratio(candles: &[Candle], index: usize) -> f64 {
    let lookback = 20.min(index);
    if lookback == 0 {
        return 1.0;
    }
    let start = index - lookback;
    let avg: Decimal = candles[start..index].iter().map(|c| c.volume).sum::<Decimal>() / Decimal::from(lookback);
    if avg.is_zero() {
        return 1.0;
    }
    (candles[index].volume / avg).to_f64().unwrap_or(1.0)
}

/// Whether a new swing forms in the break's direction shortly after (spec's
/// "structure quality" component); returns a 0..=1 score rather than a bool
/// to keep the confidence formula smooth.
fn new_swing_formed(candles: &[Candle], break_index: usize, kind: BmsKind, range: usize) -> f64 {
    let end = (break_index + range * 2).min(candles.len());
    if end <= break_index {
        return 0.0;
    }
    let window = &candles[break_index..end];
    let swings = detect_swing_points(window, range.min(window.len().saturating_sub(1)).max(1));
    let found = swings.iter().any(|s| match kind {
        BmsKind::Bullish => s.kind == SwingKind::Low,
        BmsKind::Bearish => s.kind == SwingKind::High,
    });
    if found { 1.0 } else { 0.0 }
}

fn trend_alignment_score(kind: BmsKind, trend: Option<TrendDirection>) -> f64 {
    match (kind, trend) {
        (BmsKind::Bullish, Some(TrendDirection::Uptrend)) => 1.0,
        (BmsKind::Bearish, Some(TrendDirection::Downtrend)) => 1.0,
        (_, Some(TrendDirection::Ranging)) | (_, None) => 0.5,
        _ => 0.0,
    }
}

fn confidence_score(
    break_distance_pct: f64,
    follow_through_pct: f64,
    volume_ratio: f64,
    structure_quality: f64,
    trend_alignment: f64,
) -> f64 {
    let break_score = (break_distance_pct / MIN_BREAK_DISTANCE_PCT * 100.0).clamp(0.0, 100.0);
    let follow_score = (follow_through_pct / MIN_FOLLOW_THROUGH_PCT * 100.0).clamp(0.0, 100.0);
    let volume_score = (volume_ratio * 50.0).clamp(0.0, 100.0);
    let structure_score = structure_quality * 100.0;
    let trend_score = trend_alignment * 100.0;

    (break_score * 0.25 + follow_score * 0.20 + volume_score * 0.20 + structure_score * 0.20 + trend_score * 0.15)
        .clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use rust_decimal_macros::dec;

    fn c(open_time: i64, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
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
    fn confirmed_break_requires_follow_through() {
        let candles = vec![
            c(0, dec!(101), dec!(98), dec!(100)),
            c(1, dec!(102), dec!(99), dec!(100)),
            c(2, dec!(99), dec!(96), dec!(97)),
            c(3, dec!(100), dec!(97), dec!(98)),
            c(4, dec!(101), dec!(98), dec!(99)),
            c(5, dec!(96), dec!(90), dec!(91)),
            c(6, dec!(92), dec!(85), dec!(86)),
            c(7, dec!(87), dec!(80), dec!(81)),
            c(8, dec!(82), dec!(75), dec!(76)),
        ];
        let breaks = detect_breaks_of_structure(&candles, Some(TrendDirection::Downtrend));
        assert!(breaks.iter().any(|b| b.kind == BmsKind::Bearish));
    }
}
