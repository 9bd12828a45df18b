use crate::application::event_bus::EventBus;
use crate::domain::events::TradingEvent;
use crate::domain::market::Timeframe;
use crate::domain::ports::Exchange;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use super::candle_store::CandleStore;

pub const DEFAULT_LOAD_LIMIT: u32 = 500;
pub const MAX_LOAD_LIMIT: u32 = 1000;
const DEFAULT_WEIGHT_BUDGET_PER_MINUTE: u32 = 1200;
const WEIGHT_PER_REQUEST: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 5;

/// Sliding-window request-weight limiter (spec §4.3).
struct RateLimiter {
    budget_per_minute: u32,
    timestamps: VecDeque<Instant>,
}

impl RateLimiter {
    fn new(budget_per_minute: u32) -> Self {
        Self {
            budget_per_minute,
            timestamps: VecDeque::new(),
        }
    }

    /// Blocks until enough weight budget is free for one request.
    async fn acquire(&mut self) {
        loop {
            let now = Instant::now();
            while self
                .timestamps
                .front()
                .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(60))
            {
                self.timestamps.pop_front();
            }
            let used: u32 = self.timestamps.len() as u32 * WEIGHT_PER_REQUEST;
            if used + WEIGHT_PER_REQUEST <= self.budget_per_minute {
                self.timestamps.push_back(now);
                return;
            }
            sleep(Duration::from_millis(250)).await;
        }
    }
}

/// Backfills candle rings from the exchange REST surface with rate limiting,
/// retry, and chronological-ordering validation (spec §4.3).
pub struct HistoricalLoader {
    exchange: Arc<dyn Exchange>,
    store: Arc<CandleStore>,
    bus: Arc<EventBus>,
    limiter: Mutex<RateLimiter>,
}

impl HistoricalLoader {
    pub fn new(exchange: Arc<dyn Exchange>, store: Arc<CandleStore>, bus: Arc<EventBus>) -> Self {
        Self {
            exchange,
            store,
            bus,
            limiter: Mutex::new(RateLimiter::new(DEFAULT_WEIGHT_BUDGET_PER_MINUTE)),
        }
    }

    /// Loads up to `limit` candles (clamped to `MAX_LOAD_LIMIT`) for a symbol
    /// and timeframe, retrying transient failures with capped exponential
    /// backoff, then validates ordering before writing into the ring.
    pub async fn load_history(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        limit: u32,
    ) -> Result<usize> {
        let limit = limit.min(MAX_LOAD_LIMIT);
        let mut attempt = 0u32;
        let mut delay = BASE_BACKOFF;
        let candles = loop {
            attempt += 1;
            self.limiter.lock().await.acquire().await;
            match self.exchange.fetch_ohlcv(symbol, timeframe, start_ms, limit).await {
                Ok(candles) => break candles,
                Err(err) if attempt < MAX_ATTEMPTS => {
                    warn!(symbol, attempt, %err, "historical load failed, retrying");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_BACKOFF);
                }
                Err(err) => return Err(err),
            }
        };

        let mut duplicates = 0u32;
        let mut gaps = 0u32;
        let mut prev_open_time: Option<i64> = None;
        let tf_ms = timeframe.duration_ms();
        for candle in &candles {
            if let Some(prev) = prev_open_time {
                if candle.open_time == prev {
                    duplicates += 1;
                } else if candle.open_time != prev + tf_ms {
                    gaps += 1;
                }
            }
            prev_open_time = Some(candle.open_time);
        }

        let loaded = candles.len();
        for candle in candles {
            self.store.push_closed(candle).await;
        }

        if gaps > 0 || duplicates > 0 {
            warn!(symbol, gaps, duplicates, "historical load found gaps or duplicates");
        }

        self.bus
            .publish(TradingEvent::CandleClosed {
                symbol: symbol.to_string(),
                timeframe,
                timestamp: start_ms,
            })
            .await;
        info!(symbol, loaded, "historical data loaded");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rate_limiter_admits_requests_up_to_budget() {
        let mut limiter = RateLimiter::new(10);
        limiter.acquire().await;
        assert_eq!(limiter.timestamps.len(), 1);
    }
}
