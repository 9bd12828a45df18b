use crate::application::event_bus::EventBus;
use crate::domain::events::TradingEvent;
use crate::domain::market::{Candle, Timeframe};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::candle_store::CandleStore;

/// Fraction of `tail.close` an incoming open price may deviate by before
/// being treated as an outlier (spec §4.2, default 0.5).
const DEFAULT_OUTLIER_FRACTION: f64 = 0.5;

/// Classifies raw kline updates into store writes and bus events (spec §4.2).
/// Keeps a small in-memory cache of the still-open bar per (symbol,timeframe)
/// so it can detect the closed-flag transition independently of the store,
/// which only ever holds closed candles.
pub struct RealtimeProcessor {
    store: Arc<CandleStore>,
    bus: Arc<EventBus>,
    current_bar: Mutex<HashMap<(String, Timeframe), Candle>>,
    outlier_fraction: f64,
    rejected_count: AtomicU64,
    gap_count: AtomicU64,
    outlier_count: AtomicU64,
}

impl RealtimeProcessor {
    pub fn new(store: Arc<CandleStore>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            current_bar: Mutex::new(HashMap::new()),
            outlier_fraction: DEFAULT_OUTLIER_FRACTION,
            rejected_count: AtomicU64::new(0),
            gap_count: AtomicU64::new(0),
            outlier_count: AtomicU64::new(0),
        }
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    pub fn gap_count(&self) -> u64 {
        self.gap_count.load(Ordering::Relaxed)
    }

    fn is_outlier(&self, tail: &Candle, candle: &Candle) -> bool {
        if tail.close.is_zero() {
            return false;
        }
        let delta = (tail.close - candle.open).abs();
        let fraction = delta / tail.close;
        fraction > Decimal::try_from(self.outlier_fraction).unwrap_or(Decimal::ZERO)
    }

    /// Processes one raw kline update, writing to the store and publishing
    /// bus events as classified by spec §4.2.
    pub async fn process(&self, candle: Candle) {
        let key = (candle.symbol.to_uppercase(), candle.timeframe);
        let mut cache = self.current_bar.lock().await;
        let cached = cache.get(&key).cloned();

        match cached {
            None => {
                cache.insert(key, candle.clone());
                drop(cache);
                if candle.closed {
                    self.close_bar(candle).await;
                } else {
                    self.bus
                        .publish(TradingEvent::CandleReceived {
                            symbol: candle.symbol.clone(),
                            timeframe: candle.timeframe,
                            timestamp: candle.open_time,
                        })
                        .await;
                }
            }
            Some(tail) if candle.open_time == tail.open_time => {
                if self.is_outlier(&tail, &candle) {
                    self.outlier_count.fetch_add(1, Ordering::Relaxed);
                    warn!(symbol = %candle.symbol, "outlier candle rejected");
                    return;
                }
                if candle.closed {
                    cache.remove(&key);
                    drop(cache);
                    self.close_bar(candle).await;
                } else {
                    cache.insert(key, candle.clone());
                    drop(cache);
                    self.bus
                        .publish(TradingEvent::CandleReceived {
                            symbol: candle.symbol.clone(),
                            timeframe: candle.timeframe,
                            timestamp: candle.open_time,
                        })
                        .await;
                }
            }
            Some(tail) if candle.open_time > tail.open_time => {
                let expected_next = tail.open_time + candle.timeframe.duration_ms();
                if candle.open_time != expected_next {
                    self.gap_count.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        symbol = %candle.symbol,
                        expected = expected_next,
                        actual = candle.open_time,
                        "candle gap detected"
                    );
                }
                cache.insert(key, candle.clone());
                drop(cache);
                if candle.closed {
                    self.close_bar(candle).await;
                } else {
                    self.bus
                        .publish(TradingEvent::CandleReceived {
                            symbol: candle.symbol.clone(),
                            timeframe: candle.timeframe,
                            timestamp: candle.open_time,
                        })
                        .await;
                }
            }
            Some(_) => {
                self.rejected_count.fetch_add(1, Ordering::Relaxed);
                warn!(symbol = %candle.symbol, open_time = candle.open_time, "stale candle rejected");
            }
        }
    }

    async fn close_bar(&self, candle: Candle) {
        self.store.push_closed(candle.clone()).await;
        self.bus
            .publish_with_priority(
                5,
                TradingEvent::CandleClosed {
                    symbol: candle.symbol.clone(),
                    timeframe: candle.timeframe,
                    timestamp: candle.open_time,
                },
            )
            .await;
        self.bus
            .publish_with_priority(
                3,
                TradingEvent::CandleReceived {
                    symbol: candle.symbol.clone(),
                    timeframe: candle.timeframe,
                    timestamp: candle.open_time,
                },
            )
            .await;
    }
}
