use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStateKind {
    Bullish,
    Bearish,
    Ranging,
    Transitioning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    pub state: MarketStateKind,
    /// 0..=100
    pub confidence: f64,
    pub timestamp: i64,
}

impl MarketState {
    /// spec §4.6: a state change requires confidence >= 60, |delta confidence| >= 30,
    /// and the new state differing from the prior one.
    pub fn should_transition(prior: Option<&MarketState>, candidate: &MarketState) -> bool {
        if candidate.confidence < 60.0 {
            return false;
        }
        match prior {
            None => true,
            Some(p) => {
                p.state != candidate.state
                    && (candidate.confidence - p.confidence).abs() >= 30.0
            }
        }
    }
}
