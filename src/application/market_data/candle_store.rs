use crate::domain::market::{Candle, CandleRing, RingWriteOutcome, Timeframe};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maps (symbol, timeframe) to a bounded ring. One mutex per ring (spec §5);
/// the outer map lock is only held for lookup/insert, never across an await
/// on ring I/O since ring writes are synchronous.
pub struct CandleStore {
    capacity: usize,
    rings: RwLock<HashMap<(String, Timeframe), Arc<std::sync::Mutex<CandleRing>>>>,
}

impl CandleStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rings: RwLock::new(HashMap::new()),
        }
    }

    async fn ring_for(&self, symbol: &str, timeframe: Timeframe) -> Arc<std::sync::Mutex<CandleRing>> {
        let key = (symbol.to_uppercase(), timeframe);
        if let Some(ring) = self.rings.read().await.get(&key) {
            return ring.clone();
        }
        let mut rings = self.rings.write().await;
        rings
            .entry(key)
            .or_insert_with(|| Arc::new(std::sync::Mutex::new(CandleRing::new(self.capacity))))
            .clone()
    }

    pub async fn push_closed(&self, candle: Candle) -> RingWriteOutcome {
        let ring = self.ring_for(&candle.symbol, candle.timeframe).await;
        let mut guard = ring.lock().expect("candle ring mutex poisoned");
        guard.push_closed(candle)
    }

    pub async fn snapshot(&self, symbol: &str, timeframe: Timeframe) -> Vec<Candle> {
        let ring = self.ring_for(symbol, timeframe).await;
        let guard = ring.lock().expect("candle ring mutex poisoned");
        guard.snapshot()
    }

    pub async fn last_n(&self, symbol: &str, timeframe: Timeframe, n: usize) -> Vec<Candle> {
        let ring = self.ring_for(symbol, timeframe).await;
        let guard = ring.lock().expect("candle ring mutex poisoned");
        guard.last_n(n)
    }

    pub async fn tail(&self, symbol: &str, timeframe: Timeframe) -> Option<Candle> {
        let ring = self.ring_for(symbol, timeframe).await;
        let guard = ring.lock().expect("candle ring mutex poisoned");
        guard.tail().cloned()
    }

    pub async fn len(&self, symbol: &str, timeframe: Timeframe) -> usize {
        let ring = self.ring_for(symbol, timeframe).await;
        let guard = ring.lock().expect("candle ring mutex poisoned");
        guard.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn candle(symbol: &str, timeframe: Timeframe, open_time: i64, close: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timeframe,
            open_time,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
            closed: true,
        }
    }

    #[tokio::test]
    async fn push_and_snapshot_round_trips() {
        let store = CandleStore::new(10);
        store.push_closed(candle("btcusdt", Timeframe::M1, 0, dec!(100))).await;
        store.push_closed(candle("BTCUSDT", Timeframe::M1, 60_000, dec!(101))).await;
        let snap = store.snapshot("BtcUsdt", Timeframe::M1).await;
        assert_eq!(snap.len(), 2);
    }
}
