use crate::application::event_bus::EventBus;
use crate::application::indicators::{
    apply_fill_updates, detect_breaks, detect_breaks_of_structure, detect_fair_value_gaps, detect_liquidity_levels,
    detect_order_blocks, detect_sweep, detect_trend_structures, fold_trend_state, update_levels,
};
use crate::application::market_data::CandleStore;
use crate::application::market_state_tracker;
use crate::domain::events::{EventHandler, TradingEvent};
use crate::domain::market::{
    BreakOfMarketStructure, BreakerBlock, FairValueGap, LiquidityLevel, LiquiditySweep, MarketState, OrderBlock,
    Timeframe, TrendState,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Timeframes the engine maintains a detector set for by default (spec §4.5).
pub fn default_timeframes() -> Vec<Timeframe> {
    vec![Timeframe::M1, Timeframe::M15, Timeframe::H1]
}

/// Everything the engine knows about one (symbol, timeframe) pair.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    pub order_blocks: Vec<OrderBlock>,
    pub fair_value_gaps: Vec<FairValueGap>,
    pub breaker_blocks: Vec<BreakerBlock>,
    pub liquidity_levels: Vec<LiquidityLevel>,
    pub liquidity_sweeps: Vec<LiquiditySweep>,
    pub bms: Vec<BreakOfMarketStructure>,
    pub trend: Option<TrendState>,
    pub market_state: Option<MarketState>,
}

/// Runs the indicator detector pipeline per timeframe on every closed candle
/// and publishes `INDICATORS_UPDATED` / `MARKET_STATE_CHANGED` (spec §4.5/4.6).
pub struct MtfEngine {
    store: Arc<CandleStore>,
    bus: Arc<EventBus>,
    timeframes: Vec<Timeframe>,
    snapshots: RwLock<HashMap<(String, Timeframe), IndicatorSnapshot>>,
}

impl MtfEngine {
    pub fn new(store: Arc<CandleStore>, bus: Arc<EventBus>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            store,
            bus,
            timeframes,
            snapshots: RwLock::new(HashMap::new()),
        }
    }

    pub fn watches(&self, timeframe: Timeframe) -> bool {
        self.timeframes.contains(&timeframe)
    }

    pub async fn snapshot(&self, symbol: &str, timeframe: Timeframe) -> Option<IndicatorSnapshot> {
        self.snapshots.read().await.get(&(symbol.to_uppercase(), timeframe)).cloned()
    }

    /// Cross-timeframe trend-alignment score: fraction of watched timeframes
    /// agreeing with the majority direction.
    pub async fn trend_alignment(&self, symbol: &str) -> f64 {
        let snapshots = self.snapshots.read().await;
        let directions: Vec<_> = self
            .timeframes
            .iter()
            .filter_map(|tf| snapshots.get(&(symbol.to_uppercase(), *tf)))
            .filter_map(|s| s.trend.as_ref().map(|t| t.direction))
            .collect();
        if directions.is_empty() {
            return 0.0;
        }
        let max = [
            crate::domain::market::TrendDirection::Uptrend,
            crate::domain::market::TrendDirection::Downtrend,
            crate::domain::market::TrendDirection::Ranging,
            crate::domain::market::TrendDirection::Transition,
        ]
        .iter()
        .map(|candidate| directions.iter().filter(|d| *d == candidate).count())
        .max()
        .unwrap_or(0);
        max as f64 / directions.len() as f64 * 100.0
    }

    /// Count of watched timeframes with a CONFIRMED BMS in the given direction.
    pub async fn bms_alignment(&self, symbol: &str, kind: crate::domain::market::BmsKind) -> usize {
        let snapshots = self.snapshots.read().await;
        self.timeframes
            .iter()
            .filter_map(|tf| snapshots.get(&(symbol.to_uppercase(), *tf)))
            .filter(|s| {
                s.bms
                    .iter()
                    .any(|b| b.kind == kind && b.state == crate::domain::market::BmsState::Confirmed)
            })
            .count()
    }

    async fn process_closed_candle(&self, symbol: &str, timeframe: Timeframe, timestamp: i64) {
        if !self.watches(timeframe) {
            return;
        }
        let candles = self.store.snapshot(symbol, timeframe).await;
        if candles.is_empty() {
            return;
        }

        let mut order_blocks = detect_order_blocks(&candles, timestamp);
        let breaker_blocks = candles.last().map(|c| detect_breaks(&mut order_blocks, c)).unwrap_or_default();

        let mut fair_value_gaps = detect_fair_value_gaps(&candles);
        apply_fill_updates(&mut fair_value_gaps, &candles);

        let mut liquidity_levels = detect_liquidity_levels(&candles, timestamp);
        if let Some(last) = candles.last() {
            update_levels(&mut liquidity_levels, last, candles.len().saturating_sub(1));
        }
        let liquidity_sweeps: Vec<LiquiditySweep> = liquidity_levels
            .iter()
            .filter_map(|level| detect_sweep(level, &candles))
            .collect();

        let structures = detect_trend_structures(&candles);
        let prior_trend = {
            let snapshots = self.snapshots.read().await;
            snapshots.get(&(symbol.to_uppercase(), timeframe)).and_then(|s| s.trend.clone())
        };
        let trend = fold_trend_state(&structures, prior_trend.as_ref(), timestamp);

        let bms = detect_breaks_of_structure(&candles, Some(trend.direction));

        let liquidity_alignment = liquidity_cluster_score(&liquidity_levels);
        let market_state = market_state_tracker::evaluate(&trend, &bms, liquidity_alignment, timestamp);

        let prior_market_state = {
            let snapshots = self.snapshots.read().await;
            snapshots.get(&(symbol.to_uppercase(), timeframe)).and_then(|s| s.market_state.clone())
        };

        let order_blocks_count = order_blocks.len();
        let fvg_count = fair_value_gaps.len();

        {
            let mut snapshots = self.snapshots.write().await;
            snapshots.insert(
                (symbol.to_uppercase(), timeframe),
                IndicatorSnapshot {
                    order_blocks,
                    fair_value_gaps,
                    breaker_blocks,
                    liquidity_levels,
                    liquidity_sweeps: liquidity_sweeps.clone(),
                    bms,
                    trend: Some(trend.clone()),
                    market_state: Some(market_state.clone()),
                },
            );
        }

        for sweep in liquidity_sweeps {
            self.bus
                .publish(TradingEvent::LiquiditySweepDetected {
                    symbol: symbol.to_string(),
                    timeframe,
                    sweep,
                })
                .await;
        }

        if MarketState::should_transition(prior_market_state.as_ref(), &market_state) {
            self.bus
                .publish(TradingEvent::MarketStateChanged {
                    symbol: symbol.to_string(),
                    previous: prior_market_state,
                    current: market_state,
                })
                .await;
        }

        self.bus
            .publish(TradingEvent::IndicatorsUpdated {
                symbol: symbol.to_string(),
                timeframe,
                order_blocks: order_blocks_count,
                fair_value_gaps: fvg_count,
            })
            .await;
    }
}

/// Presence of liquidity levels clustered within a small band, used as a
/// coarse proxy for the spec's cross-timeframe "liquidity-cluster" signal
/// until the full multi-timeframe price comparison is wired in by the caller.
fn liquidity_cluster_score(levels: &[LiquidityLevel]) -> f64 {
    if levels.len() < 2 {
        return 0.0;
    }
    (levels.iter().map(|l| l.strength).sum::<f64>() / levels.len() as f64).clamp(0.0, 100.0)
}

#[async_trait]
impl EventHandler for MtfEngine {
    async fn handle(&self, event: &TradingEvent) {
        if let TradingEvent::CandleClosed { symbol, timeframe, timestamp } = event {
            self.process_closed_candle(symbol, *timeframe, *timestamp).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Candle;
    use rust_decimal_macros::dec;

    fn candle(open_time: i64, high: rust_decimal::Decimal, low: rust_decimal::Decimal, close: rust_decimal::Decimal) -> Candle {
        Candle {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            open_time,
            open: close,
            high,
            low,
            close,
            volume: dec!(1000),
            closed: true,
        }
    }

    #[tokio::test]
    async fn processes_closed_candle_and_records_snapshot() {
        let store = Arc::new(CandleStore::new(500));
        let bus = Arc::new(EventBus::new(100));
        bus.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let engine = MtfEngine::new(store.clone(), bus.clone(), default_timeframes());

        for i in 0..10 {
            let base = dec!(100) + rust_decimal::Decimal::from(i);
            store
                .push_closed(candle(i * 60_000, base + dec!(1), base - dec!(1), base))
                .await;
        }

        engine.process_closed_candle("BTCUSDT", Timeframe::M1, 600_000).await;
        let snapshot = engine.snapshot("BTCUSDT", Timeframe::M1).await;
        assert!(snapshot.is_some());
    }

    #[test]
    fn unwatched_timeframe_is_rejected() {
        let engine_timeframes = default_timeframes();
        assert!(!engine_timeframes.contains(&Timeframe::M30));
    }
}
