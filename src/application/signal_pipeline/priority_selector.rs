use crate::domain::trading::Signal;

/// Picks the single highest-scoring signal from one evaluation batch
/// (spec §4.8 Priority Selector). Ties broken by earlier timestamp.
pub fn select(signals: &[Signal]) -> Option<&Signal> {
    signals.iter().fold(None, |best: Option<&Signal>, candidate| match best {
        None => Some(candidate),
        Some(current) => {
            let candidate_score = score(candidate);
            let current_score = score(current);
            if candidate_score > current_score
                || (candidate_score == current_score && candidate.timestamp < current.timestamp)
            {
                Some(candidate)
            } else {
                Some(current)
            }
        }
    })
}

fn score(signal: &Signal) -> f64 {
    let confidence_component = 0.5 * signal.confidence;
    let rr_component = 0.3 * (signal.risk_reward / 5.0).min(1.0);
    let rank_component = 0.2 * (strategy_rank(&signal.strategy_id) as f64 / 3.0);
    confidence_component + rr_component + rank_component
}

fn strategy_rank(strategy_id: &str) -> u8 {
    if strategy_id.contains("strategy_a") {
        3
    } else if strategy_id.contains("strategy_c") {
        2
    } else if strategy_id.contains("strategy_b") {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::Direction;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn signal(strategy_id: &str, confidence: f64, risk_reward: f64, timestamp: i64) -> Signal {
        Signal {
            id: Uuid::new_v4(),
            strategy_id: strategy_id.into(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            entry: dec!(100),
            stop: dec!(95),
            take_profit: dec!(115),
            size: dec!(1),
            confidence,
            timestamp,
            timeframe: crate::domain::market::Timeframe::M15,
            rationale: String::new(),
            risk_reward,
        }
    }

    #[test]
    fn picks_higher_scoring_signal() {
        let signals = vec![
            signal("strategy_b_aggressive", 0.65, 3.0, 0),
            signal("strategy_a_conservative", 0.82, 2.2, 0),
        ];
        let winner = select(&signals).unwrap();
        assert_eq!(winner.strategy_id, "strategy_a_conservative");
    }

    #[test]
    fn breaks_ties_with_earlier_timestamp() {
        let signals = vec![signal("strategy_a_conservative", 0.8, 2.0, 1000), signal("strategy_a_conservative", 0.8, 2.0, 500)];
        let winner = select(&signals).unwrap();
        assert_eq!(winner.timestamp, 500);
    }
}
