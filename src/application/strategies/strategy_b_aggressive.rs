use super::traits::{AnalysisContext, TradingStrategy};
use crate::domain::market::{LiquiditySide, OrderBlockKind, SweepDirection, Timeframe};
use crate::domain::trading::{Direction, Signal};
use rust_decimal::Decimal;
use uuid::Uuid;

const MIN_CONFIDENCE: f64 = 0.60;
const MIN_RISK_REWARD: f64 = 3.0;
/// How many M15 candles back an unfilled FVG may have formed to still count
/// as "within N candles" of the sweep (spec §4.7 Strategy B).
const FVG_RECENCY_CANDLES: i64 = 10;
const STOP_BUFFER_PCT: f64 = 0.001;

/// Reacts immediately to a completed liquidity sweep confirmed by a same-side
/// unfilled FVG on M15 (spec §4.7 Strategy B).
pub struct AggressiveStrategy;

impl TradingStrategy for AggressiveStrategy {
    fn id(&self) -> &'static str {
        "strategy_b_aggressive"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Option<Signal> {
        let sweep = ctx.m15.snapshot.liquidity_sweeps.iter().find(|s| s.valid)?;
        let direction = match sweep.direction {
            SweepDirection::Bullish => Direction::Long,
            SweepDirection::Bearish => Direction::Short,
        };
        let fvg_kind = match direction {
            Direction::Long => OrderBlockKind::Bullish,
            Direction::Short => OrderBlockKind::Bearish,
        };
        let candle_period_ms = Timeframe::M15.duration_ms();
        let window_start = sweep.reversal_time.unwrap_or(sweep.close_time) - candle_period_ms * FVG_RECENCY_CANDLES;
        let fvg = ctx
            .m15
            .snapshot
            .fair_value_gaps
            .iter()
            .find(|g| g.kind == fvg_kind && !g.filled && g.c3_time >= window_start)?;

        let entry = ctx.current_price;
        let buffer = Decimal::try_from(STOP_BUFFER_PCT).unwrap_or(Decimal::ZERO);
        let extreme = extreme_for_sweep(sweep, direction);
        let stop = match direction {
            Direction::Long => extreme - extreme * buffer,
            Direction::Short => extreme + extreme * buffer,
        };

        let take_profit = match direction {
            Direction::Long => {
                let risk = (entry - stop).abs();
                entry + risk * Decimal::try_from(MIN_RISK_REWARD).unwrap_or(Decimal::ONE)
            }
            Direction::Short => {
                let risk = (entry - stop).abs();
                entry - risk * Decimal::try_from(MIN_RISK_REWARD).unwrap_or(Decimal::ONE)
            }
        };

        let risk_reward = Signal::compute_risk_reward(entry, stop, take_profit);
        if risk_reward < MIN_RISK_REWARD {
            return None;
        }

        let sweep_side = match sweep.direction {
            SweepDirection::Bullish => LiquiditySide::SellSide,
            SweepDirection::Bearish => LiquiditySide::BuySide,
        };
        let confidence = confidence_for(sweep.reversal_strength, sweep_side);
        if confidence < MIN_CONFIDENCE {
            return None;
        }

        Some(Signal {
            id: Uuid::new_v4(),
            strategy_id: self.id().to_string(),
            symbol: ctx.symbol.clone(),
            direction,
            entry,
            stop,
            take_profit,
            size: Decimal::ZERO, // sized downstream by signal_engine from the risk formula
            confidence,
            timestamp: ctx.timestamp,
            timeframe: Timeframe::M15,
            rationale: format!("completed {:?} liquidity sweep confirmed by unfilled FVG", sweep_side),
            risk_reward,
        })
    }
}

fn extreme_for_sweep(sweep: &crate::domain::market::LiquiditySweep, direction: Direction) -> Decimal {
    match direction {
        Direction::Long => sweep.breached_level - sweep.breach_distance,
        Direction::Short => sweep.breached_level + sweep.breach_distance,
    }
}

fn confidence_for(reversal_strength: f64, _side: LiquiditySide) -> f64 {
    (MIN_CONFIDENCE + (reversal_strength / 100.0) * (1.0 - MIN_CONFIDENCE)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mtf_engine::IndicatorSnapshot;
    use crate::application::strategies::traits::TimeframeView;
    use crate::domain::market::FairValueGap;
    use rust_decimal_macros::dec;

    fn ctx_with(sweep: crate::domain::market::LiquiditySweep, fvg: FairValueGap) -> AnalysisContext {
        AnalysisContext {
            symbol: "BTCUSDT".into(),
            m1: TimeframeView::default(),
            m15: TimeframeView {
                candles: vec![],
                snapshot: IndicatorSnapshot {
                    liquidity_sweeps: vec![sweep],
                    fair_value_gaps: vec![fvg],
                    ..Default::default()
                },
            },
            h1: TimeframeView::default(),
            current_price: dec!(100),
            timestamp: 100_000,
        }
    }

    #[test]
    fn emits_long_signal_on_sell_side_sweep_with_bullish_fvg() {
        let sweep = crate::domain::market::LiquiditySweep {
            direction: SweepDirection::Bullish,
            breached_level: dec!(95),
            breach_time: 0,
            close_time: 60_000,
            reversal_time: Some(90_000),
            breach_distance: dec!(1),
            reversal_strength: 80.0,
            valid: true,
        };
        let fvg = FairValueGap {
            kind: OrderBlockKind::Bullish,
            top: dec!(98),
            bottom: dec!(96),
            c1_time: 0,
            c2_time: 60_000,
            c3_time: 90_000,
            gap_size: dec!(2),
            filled: false,
            fill_percent: Decimal::ZERO,
        };
        let ctx = ctx_with(sweep, fvg);
        let signal = AggressiveStrategy.analyze(&ctx);
        assert!(signal.is_some());
        let signal = signal.unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.risk_reward >= MIN_RISK_REWARD);
    }

    #[test]
    fn no_signal_without_matching_fvg() {
        let sweep = crate::domain::market::LiquiditySweep {
            direction: SweepDirection::Bullish,
            breached_level: dec!(95),
            breach_time: 0,
            close_time: 60_000,
            reversal_time: Some(90_000),
            breach_distance: dec!(1),
            reversal_strength: 80.0,
            valid: true,
        };
        let fvg = FairValueGap {
            kind: OrderBlockKind::Bearish,
            top: dec!(98),
            bottom: dec!(96),
            c1_time: 0,
            c2_time: 60_000,
            c3_time: 90_000,
            gap_size: dec!(2),
            filled: false,
            fill_percent: Decimal::ZERO,
        };
        let ctx = ctx_with(sweep, fvg);
        assert!(AggressiveStrategy.analyze(&ctx).is_none());
    }
}
