use crate::domain::market::{Candle, SwingKind, SwingPoint};

/// A candle at `index` is a swing high if its high is strictly greater than
/// all `range` candles on either side (Williams-fractal style, spec §4.4/§4.7).
fn is_swing_high(candles: &[Candle], index: usize, range: usize) -> bool {
    if index < range || index + range >= candles.len() {
        return false;
    }
    let high = candles[index].high;
    (1..=range).all(|i| candles[index - i].high < high) && (1..=range).all(|i| candles[index + i].high <= high)
}

fn is_swing_low(candles: &[Candle], index: usize, range: usize) -> bool {
    if index < range || index + range >= candles.len() {
        return false;
    }
    let low = candles[index].low;
    (1..=range).all(|i| candles[index - i].low > low) && (1..=range).all(|i| candles[index + i].low >= low)
}

/// Scans the full slice for confirmed swing points using a fractal of `range`
/// candles either side (default 3, spec §4.4 Trend Recognition).
pub fn detect_swing_points(candles: &[Candle], range: usize) -> Vec<SwingPoint> {
    let mut points = Vec::new();
    if candles.len() <= range * 2 {
        return points;
    }
    for index in range..candles.len() - range {
        if is_swing_high(candles, index, range) {
            points.push(SwingPoint {
                kind: SwingKind::High,
                price: candles[index].high,
                candle_index: index,
                strength: range as u8,
            });
        }
        if is_swing_low(candles, index, range) {
            points.push(SwingPoint {
                kind: SwingKind::Low,
                price: candles[index].low,
                candle_index: index,
                strength: range as u8,
            });
        }
    }
    points
}

/// Most recent confirmed swing high/low, scanning backward from the end of
/// the slice (used by MSS / order-block detection for "last valid swing").
pub fn last_swing_high_low(candles: &[Candle], range: usize) -> (Option<SwingPoint>, Option<SwingPoint>) {
    let points = detect_swing_points(candles, range);
    let high = points.iter().rev().find(|p| p.kind == SwingKind::High).cloned();
    let low = points.iter().rev().find(|p| p.kind == SwingKind::Low).cloned();
    (high, low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn c(high: Decimal, low: Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time: 0,
            open: (high + low) / dec!(2),
            high,
            low,
            close: (high + low) / dec!(2),
            volume: dec!(1),
            closed: true,
        }
    }

    #[test]
    fn detects_a_simple_swing_high() {
        let candles = vec![
            c(dec!(100), dec!(95)),
            c(dec!(102), dec!(97)),
            c(dec!(105), dec!(99)),
            c(dec!(103), dec!(98)),
            c(dec!(101), dec!(96)),
        ];
        let points = detect_swing_points(&candles, 2);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].kind, SwingKind::High);
        assert_eq!(points[0].price, dec!(105));
    }
}
