use crate::domain::market::{Candle, FairValueGap, OrderBlockKind};
use rust_decimal::Decimal;

/// Minimum gap size, in absolute price units, to qualify as an FVG (spec §4.4
/// "gap-size ... >= G_min"). Expressed relative to c2's open in practice.
pub const DEFAULT_MIN_GAP_PCT: f64 = 0.0005;

/// Scans a rolling three-candle window for fair value gaps (spec §4.4).
/// BULLISH when c3.low > c1.high; BEARISH when c3.high < c1.low.
pub fn detect_fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }
    for i in 0..candles.len() - 2 {
        let c1 = &candles[i];
        let c2 = &candles[i + 1];
        let c3 = &candles[i + 2];

        if c3.low > c1.high {
            let gap_size = c3.low - c1.high;
            if meets_min_gap(gap_size, c2) {
                gaps.push(FairValueGap {
                    kind: OrderBlockKind::Bullish,
                    top: c3.low,
                    bottom: c1.high,
                    c1_time: c1.open_time,
                    c2_time: c2.open_time,
                    c3_time: c3.open_time,
                    gap_size,
                    filled: false,
                    fill_percent: Decimal::ZERO,
                });
            }
        }

        if c3.high < c1.low {
            let gap_size = c1.low - c3.high;
            if meets_min_gap(gap_size, c2) {
                gaps.push(FairValueGap {
                    kind: OrderBlockKind::Bearish,
                    top: c1.low,
                    bottom: c3.high,
                    c1_time: c1.open_time,
                    c2_time: c2.open_time,
                    c3_time: c3.open_time,
                    gap_size,
                    filled: false,
                    fill_percent: Decimal::ZERO,
                });
            }
        }
    }
    gaps
}

fn meets_min_gap(gap_size: Decimal, reference_candle: &Candle) -> bool {
    if reference_candle.open.is_zero() {
        return false;
    }
    use rust_decimal::prelude::ToPrimitive;
    let pct = (gap_size / reference_candle.open).to_f64().unwrap_or(0.0);
    pct >= DEFAULT_MIN_GAP_PCT
}

/// Updates fill state for every subsequent candle traded through the gap
/// (spec §4.4: destroyed once fill_percent reaches 100).
pub fn apply_fill_updates(gaps: &mut [FairValueGap], candles_after: &[Candle]) {
    for gap in gaps.iter_mut() {
        if gap.filled {
            continue;
        }
        for candle in candles_after {
            gap.update_fill(candle.low, candle.high);
            if gap.filled {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use rust_decimal_macros::dec;

    fn c(open_time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time,
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            closed: true,
        }
    }

    #[test]
    fn detects_bullish_gap_between_c1_high_and_c3_low() {
        let candles = vec![
            c(0, dec!(100), dec!(102), dec!(99), dec!(101)),
            c(60_000, dec!(101), dec!(110), dec!(101), dec!(109)),
            c(120_000, dec!(109), dec!(112), dec!(105), dec!(111)),
        ];
        let gaps = detect_fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].bottom, dec!(102));
        assert_eq!(gaps[0].top, dec!(105));
    }
}
