use super::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An immutable-once-closed OHLCV candle for one (symbol, timeframe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub closed: bool,
}

impl Candle {
    /// True when the OHLC invariants from spec §3/§8 hold:
    /// low <= min(open, close), high >= max(open, close), volume >= 0,
    /// open_time aligned to the timeframe.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open.min(self.close)
            && self.high >= self.open.max(self.close)
            && self.volume >= Decimal::ZERO
            && self.timeframe.is_period_start(self.open_time)
    }

    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M15,
            open_time: 1_704_067_200_000,
            open,
            high,
            low,
            close,
            volume: dec!(1),
            closed: true,
        }
    }

    #[test]
    fn well_formed_candle_passes() {
        let c = candle(dec!(100), dec!(105), dec!(98), dec!(103));
        assert!(c.is_well_formed());
    }

    #[test]
    fn high_below_close_is_malformed() {
        let c = candle(dec!(100), dec!(101), dec!(98), dec!(103));
        assert!(!c.is_well_formed());
    }

    #[test]
    fn misaligned_open_time_is_malformed() {
        let mut c = candle(dec!(100), dec!(105), dec!(98), dec!(103));
        c.open_time += 1;
        assert!(!c.is_well_formed());
    }
}
