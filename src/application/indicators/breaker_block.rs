use crate::domain::market::{BreakerBlock, Candle, OrderBlock, OrderBlockKind};

/// Checks a set of active order blocks against one new closed candle; any
/// block whose boundary is closed through is flagged mitigated and yields a
/// successor BreakerBlock (spec §4.4).
pub fn detect_breaks(blocks: &mut [OrderBlock], candle: &Candle) -> Vec<BreakerBlock> {
    let mut breakers = Vec::new();
    for block in blocks.iter_mut() {
        if block.mitigated {
            continue;
        }
        let broken = match block.kind {
            OrderBlockKind::Bullish => candle.close < block.bottom,
            OrderBlockKind::Bearish => candle.close > block.top,
        };
        if broken {
            block.mitigated = true;
            breakers.push(BreakerBlock::from_broken_order_block(
                block,
                candle.open_time,
                candle.close,
            ));
        }
    }
    breakers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(close: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time: 100,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            closed: true,
        }
    }

    #[test]
    fn bullish_block_breaks_on_close_below_bottom() {
        let mut blocks = vec![OrderBlock {
            kind: OrderBlockKind::Bullish,
            top: dec!(110),
            bottom: dec!(100),
            left_time: 0,
            right_time: 0,
            strength: 5,
            mitigated: false,
            touch_count: 0,
            created_at: 0,
        }];
        let breakers = detect_breaks(&mut blocks, &candle(dec!(99)));
        assert_eq!(breakers.len(), 1);
        assert!(blocks[0].mitigated);
    }
}
