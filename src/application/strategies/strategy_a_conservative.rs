use super::traits::{AnalysisContext, TradingStrategy};
use crate::domain::market::{BmsKind, BmsState, LiquiditySide, OrderBlockKind};
use crate::domain::trading::{Direction, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

const MIN_CONFIDENCE: f64 = 0.80;
const MIN_RISK_REWARD: f64 = 2.0;
const STOP_TOLERANCE_MIN: f64 = 0.001;
const STOP_TOLERANCE_MAX: f64 = 0.003;

/// Top-down confirmation strategy: H1 structure, M15 zone, M1 trigger
/// (spec §4.7 Strategy A).
pub struct ConservativeStrategy;

impl TradingStrategy for ConservativeStrategy {
    fn id(&self) -> &'static str {
        "strategy_a_conservative"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Option<Signal> {
        let direction = confirmed_h1_direction(ctx)?;
        let zone = aligned_m15_zone(ctx, direction)?;
        if !m1_entry_trigger(ctx, direction, zone) {
            return None;
        }

        let entry = ctx.current_price;
        let stop = build_stop(direction, zone, STOP_TOLERANCE_MIN, STOP_TOLERANCE_MAX, entry);
        let take_profit = nearest_opposite_liquidity(ctx, direction, entry, stop)?;

        let risk_reward = Signal::compute_risk_reward(entry, stop, take_profit);
        if risk_reward < MIN_RISK_REWARD {
            return None;
        }

        let confidence = MIN_CONFIDENCE;
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
            timeframe: crate::domain::market::Timeframe::M15,
            rationale: "H1 confirmed BMS + aligned M15 zone + M1 re-entry trigger".to_string(),
            risk_reward,
        })
    }
}

fn confirmed_h1_direction(ctx: &AnalysisContext) -> Option<Direction> {
    ctx.h1.snapshot.bms.iter().find_map(|b| {
        if b.state != BmsState::Confirmed {
            return None;
        }
        match b.kind {
            BmsKind::Bullish => Some(Direction::Long),
            BmsKind::Bearish => Some(Direction::Short),
        }
    })
}

#[derive(Clone, Copy)]
struct Zone {
    top: Decimal,
    bottom: Decimal,
}

fn aligned_m15_zone(ctx: &AnalysisContext, direction: Direction) -> Option<Zone> {
    let ob_kind = match direction {
        Direction::Long => OrderBlockKind::Bullish,
        Direction::Short => OrderBlockKind::Bearish,
    };
    if let Some(ob) = ctx.m15.snapshot.order_blocks.iter().find(|b| b.kind == ob_kind && !b.mitigated) {
        return Some(Zone { top: ob.top, bottom: ob.bottom });
    }
    if let Some(fvg) = ctx.m15.snapshot.fair_value_gaps.iter().find(|g| g.kind == ob_kind && !g.filled) {
        return Some(Zone { top: fvg.top, bottom: fvg.bottom });
    }
    None
}

fn m1_entry_trigger(ctx: &AnalysisContext, direction: Direction, zone: Zone) -> bool {
    let reenters_zone = ctx.current_price >= zone.bottom && ctx.current_price <= zone.top;
    let micro_break = ctx.m1.candles.last().is_some_and(|c| match direction {
        Direction::Long => c.is_bullish(),
        Direction::Short => c.is_bearish(),
    });
    reenters_zone || micro_break
}

fn build_stop(direction: Direction, zone: Zone, min_pct: f64, max_pct: f64, entry: Decimal) -> Decimal {
    let tolerance_pct = (min_pct + max_pct) / 2.0;
    let tolerance = Decimal::try_from(tolerance_pct).unwrap_or(Decimal::ZERO);
    match direction {
        Direction::Long => zone.bottom - zone.bottom * tolerance,
        Direction::Short => zone.top + zone.top * tolerance,
    }
    .min(if direction == Direction::Long { entry } else { Decimal::MAX })
    .max(if direction == Direction::Short { entry } else { Decimal::MIN })
}

fn nearest_opposite_liquidity(ctx: &AnalysisContext, direction: Direction, entry: Decimal, stop: Decimal) -> Option<Decimal> {
    let side = match direction {
        Direction::Long => LiquiditySide::BuySide,
        Direction::Short => LiquiditySide::SellSide,
    };
    let risk = (entry - stop).abs();
    if risk.is_zero() {
        return None;
    }
    ctx.h1
        .snapshot
        .liquidity_levels
        .iter()
        .chain(ctx.m15.snapshot.liquidity_levels.iter())
        .filter(|l| l.side == side)
        .filter(|l| match direction {
            Direction::Long => l.price > entry,
            Direction::Short => l.price < entry,
        })
        .min_by_key(|l| (l.price - entry).abs().to_f64().map(|f| (f * 1e8) as i64).unwrap_or(i64::MAX))
        .map(|l| l.price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mtf_engine::IndicatorSnapshot;
    use crate::application::strategies::traits::TimeframeView;
    use crate::domain::market::{BreakOfMarketStructure, Candle, LiquidityLevel, LiquidityState, OrderBlock, Timeframe};
    use rust_decimal_macros::dec;

    fn candle(close: Decimal, bullish: bool) -> Candle {
        let (open, c) = if bullish { (close - dec!(1), close) } else { (close + dec!(1), close) };
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time: 0,
            open,
            high: close + dec!(1),
            low: close - dec!(1),
            close: c,
            volume: dec!(1000),
            closed: true,
        }
    }

    #[test]
    fn requires_confirmed_h1_bms_to_emit() {
        let ctx = AnalysisContext {
            symbol: "BTCUSDT".into(),
            m1: TimeframeView::default(),
            m15: TimeframeView::default(),
            h1: TimeframeView::default(),
            current_price: dec!(100),
            timestamp: 0,
        };
        let strategy = ConservativeStrategy;
        assert!(strategy.analyze(&ctx).is_none());
    }

    #[test]
    fn emits_long_signal_on_full_confirmation_chain() {
        let h1_bms = BreakOfMarketStructure {
            kind: BmsKind::Bullish,
            breached_level: dec!(95),
            break_price: dec!(97),
            state: BmsState::Confirmed,
            confidence: 80.0,
        };
        let m15_ob = OrderBlock {
            kind: OrderBlockKind::Bullish,
            top: dec!(101),
            bottom: dec!(99),
            left_time: 0,
            right_time: 0,
            strength: 7,
            mitigated: false,
            touch_count: 0,
            created_at: 0,
        };
        let liquidity = LiquidityLevel {
            side: LiquiditySide::BuySide,
            price: dec!(110),
            touch_count: 0,
            strength: 70.0,
            volume_profile: dec!(1000),
            state: LiquidityState::Active,
            created_at: 0,
            created_at_index: 0,
        };
        let ctx = AnalysisContext {
            symbol: "BTCUSDT".into(),
            m1: TimeframeView {
                candles: vec![candle(dec!(100), true)],
                snapshot: IndicatorSnapshot::default(),
            },
            m15: TimeframeView {
                candles: vec![],
                snapshot: IndicatorSnapshot {
                    order_blocks: vec![m15_ob],
                    liquidity_levels: vec![liquidity.clone()],
                    ..Default::default()
                },
            },
            h1: TimeframeView {
                candles: vec![],
                snapshot: IndicatorSnapshot {
                    bms: vec![h1_bms],
                    liquidity_levels: vec![liquidity],
                    ..Default::default()
                },
            },
            current_price: dec!(100),
            timestamp: 1_000,
        };
        let strategy = ConservativeStrategy;
        let signal = strategy.analyze(&ctx);
        assert!(signal.is_some());
        let signal = signal.unwrap();
        assert_eq!(signal.direction, Direction::Long);
        assert!(signal.risk_reward >= MIN_RISK_REWARD);
    }
}
