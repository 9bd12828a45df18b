use super::traits::{AnalysisContext, TradingStrategy};
use crate::domain::market::{OrderBlockKind, Timeframe, TrendDirection};
use crate::domain::trading::{Direction, Signal};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

const MIN_CONFIDENCE: f64 = 0.70;
const MIN_RISK_REWARD: f64 = 1.5;
const STOP_BUFFER_PCT: f64 = 0.002;

/// Weighted-score strategy blending H1 trend, M15 pattern, and liquidity
/// proximity (spec §4.7 Strategy C).
pub struct HybridStrategy;

impl TradingStrategy for HybridStrategy {
    fn id(&self) -> &'static str {
        "strategy_c_hybrid"
    }

    fn analyze(&self, ctx: &AnalysisContext) -> Option<Signal> {
        let direction = dominant_direction(ctx)?;
        let trend_score = trend_component(ctx, direction);
        let pattern_score = pattern_component(ctx, direction);
        let liquidity_score = liquidity_component(ctx, direction);

        let weighted = trend_score * 0.40 + pattern_score * 0.35 + liquidity_score * 0.25;
        if weighted < MIN_CONFIDENCE {
            return None;
        }

        let entry = ctx.current_price;
        let buffer = Decimal::try_from(STOP_BUFFER_PCT).unwrap_or(Decimal::ZERO);
        let stop = match direction {
            Direction::Long => entry - entry * buffer,
            Direction::Short => entry + entry * buffer,
        };
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            return None;
        }
        let rr = Decimal::try_from(MIN_RISK_REWARD).unwrap_or(Decimal::ONE);
        let take_profit = match direction {
            Direction::Long => entry + risk * rr,
            Direction::Short => entry - risk * rr,
        };

        let risk_reward = Signal::compute_risk_reward(entry, stop, take_profit);
        if risk_reward < MIN_RISK_REWARD {
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
            confidence: weighted,
            timestamp: ctx.timestamp,
            timeframe: Timeframe::M15,
            rationale: format!(
                "weighted score {:.2} (trend {:.2}, pattern {:.2}, liquidity {:.2})",
                weighted, trend_score, pattern_score, liquidity_score
            ),
            risk_reward,
        })
    }
}

fn dominant_direction(ctx: &AnalysisContext) -> Option<Direction> {
    match ctx.h1.snapshot.trend.as_ref()?.direction {
        TrendDirection::Uptrend => Some(Direction::Long),
        TrendDirection::Downtrend => Some(Direction::Short),
        _ => None,
    }
}

fn trend_component(ctx: &AnalysisContext, direction: Direction) -> f64 {
    let trend = match ctx.h1.snapshot.trend.as_ref() {
        Some(t) => t,
        None => return 0.0,
    };
    let aligned = matches!(
        (direction, trend.direction),
        (Direction::Long, TrendDirection::Uptrend) | (Direction::Short, TrendDirection::Downtrend)
    );
    if aligned { (trend.strength / 100.0).clamp(0.0, 1.0) } else { 0.0 }
}

fn pattern_component(ctx: &AnalysisContext, direction: Direction) -> f64 {
    let kind = match direction {
        Direction::Long => OrderBlockKind::Bullish,
        Direction::Short => OrderBlockKind::Bearish,
    };
    let has_ob = ctx.m15.snapshot.order_blocks.iter().any(|b| b.kind == kind && !b.mitigated);
    let has_fvg = ctx.m15.snapshot.fair_value_gaps.iter().any(|g| g.kind == kind && !g.filled);
    match (has_ob, has_fvg) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.6,
        (false, false) => 0.0,
    }
}

fn liquidity_component(ctx: &AnalysisContext, direction: Direction) -> f64 {
    let side = match direction {
        Direction::Long => crate::domain::market::LiquiditySide::BuySide,
        Direction::Short => crate::domain::market::LiquiditySide::SellSide,
    };
    let nearest = ctx
        .m15
        .snapshot
        .liquidity_levels
        .iter()
        .filter(|l| l.side == side)
        .filter_map(|l| (l.price - ctx.current_price).abs().checked_div(ctx.current_price))
        .filter_map(|pct| pct.to_f64())
        .fold(f64::MAX, f64::min);

    if nearest == f64::MAX {
        return 0.0;
    }
    (1.0 - (nearest / 0.02)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::mtf_engine::IndicatorSnapshot;
    use crate::application::strategies::traits::TimeframeView;
    use crate::domain::market::{LiquidityLevel, LiquiditySide, LiquidityState, OrderBlock, TrendState, TrendStrengthLevel};
    use rust_decimal_macros::dec;

    #[test]
    fn emits_long_signal_when_all_components_align() {
        let trend = TrendState {
            direction: TrendDirection::Uptrend,
            strength: 80.0,
            strength_level: TrendStrengthLevel::Strong,
            pattern_count: 3,
            confirmed: true,
            start_timestamp: 0,
            last_update: 0,
        };
        let ob = OrderBlock {
            kind: OrderBlockKind::Bullish,
            top: dec!(101),
            bottom: dec!(99),
            left_time: 0,
            right_time: 0,
            strength: 8,
            mitigated: false,
            touch_count: 0,
            created_at: 0,
        };
        let liquidity = LiquidityLevel {
            side: LiquiditySide::BuySide,
            price: dec!(100.5),
            touch_count: 0,
            strength: 60.0,
            volume_profile: dec!(1000),
            state: LiquidityState::Active,
            created_at: 0,
            created_at_index: 0,
        };
        let ctx = AnalysisContext {
            symbol: "BTCUSDT".into(),
            m1: TimeframeView::default(),
            m15: TimeframeView {
                candles: vec![],
                snapshot: IndicatorSnapshot {
                    order_blocks: vec![ob],
                    liquidity_levels: vec![liquidity],
                    ..Default::default()
                },
            },
            h1: TimeframeView {
                candles: vec![],
                snapshot: IndicatorSnapshot { trend: Some(trend), ..Default::default() },
            },
            current_price: dec!(100),
            timestamp: 0,
        };
        let signal = HybridStrategy.analyze(&ctx);
        assert!(signal.is_some());
        assert_eq!(signal.unwrap().direction, Direction::Long);
    }

    #[test]
    fn no_signal_when_trend_is_ranging() {
        let ctx = AnalysisContext {
            symbol: "BTCUSDT".into(),
            m1: TimeframeView::default(),
            m15: TimeframeView::default(),
            h1: TimeframeView::default(),
            current_price: dec!(100),
            timestamp: 0,
        };
        assert!(HybridStrategy.analyze(&ctx).is_none());
    }
}
