use super::candle::Candle;
use std::collections::VecDeque;

/// Outcome of offering a candle to a [`CandleRing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingWriteOutcome {
    /// Appended as a new closed candle.
    Appended,
    /// Replaced the tail (live update of the still-open candle).
    TailReplaced,
    /// Rejected: open_time earlier than the tail's open_time.
    RejectedStale,
    /// Accepted but a gap exists between the tail and the new candle.
    GapDetected,
}

/// Bounded, strictly-ordered ring of closed candles for one (symbol, timeframe).
///
/// Invariant: open_times are strictly increasing with no duplicates. On overflow
/// the oldest candle is evicted (LRU).
#[derive(Debug, Clone)]
pub struct CandleRing {
    capacity: usize,
    candles: VecDeque<Candle>,
    rejected_count: u64,
    gap_count: u64,
}

impl CandleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity),
            rejected_count: 0,
            gap_count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn tail(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count
    }

    pub fn gap_count(&self) -> u64 {
        self.gap_count
    }

    /// Read-only snapshot of the ring, oldest first.
    pub fn snapshot(&self) -> Vec<Candle> {
        self.candles.iter().cloned().collect()
    }

    pub fn last_n(&self, n: usize) -> Vec<Candle> {
        let len = self.candles.len();
        let start = len.saturating_sub(n);
        self.candles.iter().skip(start).cloned().collect()
    }

    /// Offer a *closed* candle to the ring.
    pub fn push_closed(&mut self, candle: Candle) -> RingWriteOutcome {
        debug_assert!(candle.closed);
        let tf_ms = candle.timeframe.duration_ms();

        match self.candles.back() {
            None => {
                self.candles.push_back(candle);
                RingWriteOutcome::Appended
            }
            Some(tail) if candle.open_time == tail.open_time => {
                *self.candles.back_mut().unwrap() = candle;
                RingWriteOutcome::TailReplaced
            }
            Some(tail) if candle.open_time < tail.open_time => {
                self.rejected_count += 1;
                RingWriteOutcome::RejectedStale
            }
            Some(tail) => {
                let expected_next = tail.open_time + tf_ms;
                let gapped = candle.open_time != expected_next;
                if gapped {
                    self.gap_count += 1;
                }
                self.candles.push_back(candle);
                self.evict_overflow();
                if gapped {
                    RingWriteOutcome::GapDetected
                } else {
                    RingWriteOutcome::Appended
                }
            }
        }
    }

    fn evict_overflow(&mut self) {
        while self.candles.len() > self.capacity {
            self.candles.pop_front();
        }
    }

    /// All open_times strictly increasing, no duplicates (spec §8 universal property).
    pub fn is_strictly_ordered(&self) -> bool {
        self.candles
            .iter()
            .zip(self.candles.iter().skip(1))
            .all(|(a, b)| a.open_time < b.open_time)
    }
}
