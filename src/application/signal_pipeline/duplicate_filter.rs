use crate::domain::trading::Signal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::VecDeque;

/// Rolling window of recently-accepted signals (spec §4.8 Duplicate Filter).
pub const DEFAULT_WINDOW_SIZE: usize = 100;
const DUPLICATE_TIME_WINDOW_MS: i64 = 5 * 60 * 1000;
const DUPLICATE_ENTRY_DELTA_PCT: f64 = 0.01;

pub struct DuplicateFilter {
    window: VecDeque<Signal>,
    capacity: usize,
}

impl DuplicateFilter {
    pub fn new(capacity: usize) -> Self {
        Self { window: VecDeque::with_capacity(capacity), capacity }
    }

    /// Returns `true` and records the signal if it is not a duplicate of
    /// anything currently in the window; otherwise drops it and returns `false`.
    pub fn accept(&mut self, signal: Signal) -> bool {
        if self.window.iter().any(|existing| is_duplicate(existing, &signal)) {
            return false;
        }
        if self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(signal);
        true
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

fn is_duplicate(existing: &Signal, candidate: &Signal) -> bool {
    if existing.direction != candidate.direction {
        return false;
    }
    if (candidate.timestamp - existing.timestamp).abs() > DUPLICATE_TIME_WINDOW_MS {
        return false;
    }
    if existing.entry.is_zero() {
        return false;
    }
    let delta_pct = ((candidate.entry - existing.entry) / existing.entry).abs().to_f64().unwrap_or(1.0);
    delta_pct <= DUPLICATE_ENTRY_DELTA_PCT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::Direction;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn signal(entry: rust_decimal::Decimal, timestamp: i64) -> Signal {
        Signal {
            id: Uuid::new_v4(),
            strategy_id: "strategy_a_conservative".into(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            entry,
            stop: entry - dec!(10),
            take_profit: entry + dec!(30),
            size: dec!(1),
            confidence: 0.8,
            timestamp,
            timeframe: crate::domain::market::Timeframe::M15,
            rationale: String::new(),
            risk_reward: 3.0,
        }
    }

    #[test]
    fn rejects_near_duplicate_within_window() {
        let mut filter = DuplicateFilter::new(10);
        assert!(filter.accept(signal(dec!(100), 0)));
        assert!(!filter.accept(signal(dec!(100.5), 60_000)));
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn accepts_signal_outside_entry_delta() {
        let mut filter = DuplicateFilter::new(10);
        assert!(filter.accept(signal(dec!(100), 0)));
        assert!(filter.accept(signal(dec!(105), 60_000)));
        assert_eq!(filter.len(), 2);
    }

    #[test]
    fn evicts_oldest_when_capacity_exceeded() {
        let mut filter = DuplicateFilter::new(1);
        filter.accept(signal(dec!(100), 0));
        filter.accept(signal(dec!(500), 10_000_000));
        assert_eq!(filter.len(), 1);
    }
}
