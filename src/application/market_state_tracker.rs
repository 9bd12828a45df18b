use crate::domain::market::{BmsKind, BmsState, BreakOfMarketStructure, MarketState, MarketStateKind, TrendDirection, TrendState};

/// Evaluates the ordered rules in spec §4.6 and computes the weighted
/// confidence. Returns the candidate state; callers gate publication through
/// `MarketState::should_transition`.
pub fn evaluate(
    trend: &TrendState,
    bms: &[BreakOfMarketStructure],
    liquidity_alignment: f64,
    now: i64,
) -> MarketState {
    let state = if trend.direction == TrendDirection::Ranging || trend.strength < 40.0 {
        MarketStateKind::Ranging
    } else if trend.direction == TrendDirection::Transition {
        MarketStateKind::Transitioning
    } else if trend.direction == TrendDirection::Uptrend && has_confirmed(bms, BmsKind::Bullish) {
        MarketStateKind::Bullish
    } else if trend.direction == TrendDirection::Downtrend && has_confirmed(bms, BmsKind::Bearish) {
        MarketStateKind::Bearish
    } else {
        MarketStateKind::Ranging
    };

    let bms_confidence = matching_confidence(bms, state);
    let confidence = (trend.strength * 0.40 + bms_confidence * 0.35 + liquidity_alignment * 0.25).clamp(0.0, 100.0);

    MarketState { state, confidence, timestamp: now }
}

fn has_confirmed(bms: &[BreakOfMarketStructure], kind: BmsKind) -> bool {
    bms.iter().any(|b| b.kind == kind && b.state == BmsState::Confirmed)
}

fn matching_confidence(bms: &[BreakOfMarketStructure], state: MarketStateKind) -> f64 {
    let kind = match state {
        MarketStateKind::Bullish => BmsKind::Bullish,
        MarketStateKind::Bearish => BmsKind::Bearish,
        _ => return 0.0,
    };
    bms.iter()
        .filter(|b| b.kind == kind && b.state == BmsState::Confirmed)
        .map(|b| b.confidence)
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::TrendStrengthLevel;

    fn trend(direction: TrendDirection, strength: f64) -> TrendState {
        TrendState {
            direction,
            strength,
            strength_level: TrendStrengthLevel::from_score(strength),
            pattern_count: 3,
            confirmed: true,
            start_timestamp: 0,
            last_update: 0,
        }
    }

    #[test]
    fn weak_trend_forces_ranging() {
        let state = evaluate(&trend(TrendDirection::Uptrend, 20.0), &[], 0.0, 0);
        assert_eq!(state.state, MarketStateKind::Ranging);
    }

    #[test]
    fn uptrend_with_confirmed_bullish_bms_is_bullish() {
        let bms = vec![BreakOfMarketStructure {
            kind: BmsKind::Bullish,
            breached_level: Default::default(),
            break_price: Default::default(),
            state: BmsState::Confirmed,
            confidence: 80.0,
        }];
        let state = evaluate(&trend(TrendDirection::Uptrend, 70.0), &bms, 50.0, 0);
        assert_eq!(state.state, MarketStateKind::Bullish);
        assert!(state.confidence > 60.0);
    }
}
