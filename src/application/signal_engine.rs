//! Wires the strategy layer into the event bus (spec §4.7-§4.10).
//!
//! Subscribes to `IndicatorsUpdated` for the M15 timeframe, the trigger for
//! a full evaluation pass: by the time that event is published, `MtfEngine`
//! has already committed its snapshot for every timeframe of the symbol, so
//! M1/M15/H1 views are all consistent for this candle close.

use crate::application::event_bus::EventBus;
use crate::application::execution::order_executor::OrderExecutor;
use crate::application::market_data::candle_store::CandleStore;
use crate::application::mtf_engine::MtfEngine;
use crate::application::position::position_manager::PositionManager;
use crate::application::risk::daily_loss_monitor::DailyLossMonitor;
use crate::application::risk::risk_validator::RiskValidator;
use crate::application::signal_pipeline::{priority_selector, DuplicateFilter};
use crate::application::strategies::traits::{AnalysisContext, TimeframeView, TradingStrategy};
use crate::application::strategies::{AggressiveStrategy, ConservativeStrategy, HybridStrategy};
use crate::domain::events::{EventHandler, TradingEvent};
use crate::domain::market::Timeframe;
use crate::domain::trading::{Direction, OrderSide};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Evaluates all strategies for a symbol on every M15 candle close, then
/// validates and executes the single best-ranked signal (spec §4.7-§4.12).
pub struct SignalEngine {
    bus: Arc<EventBus>,
    candle_store: Arc<CandleStore>,
    mtf_engine: Arc<MtfEngine>,
    risk_validator: Arc<RiskValidator>,
    daily_loss_monitor: Arc<DailyLossMonitor>,
    order_executor: Arc<OrderExecutor>,
    position_manager: Arc<PositionManager>,
    strategies: Vec<Box<dyn TradingStrategy>>,
    duplicate_filter: Mutex<DuplicateFilter>,
    leverage: u32,
    account_balance: AtomicU64,
}

impl SignalEngine {
    pub fn new(
        bus: Arc<EventBus>,
        candle_store: Arc<CandleStore>,
        mtf_engine: Arc<MtfEngine>,
        risk_validator: Arc<RiskValidator>,
        daily_loss_monitor: Arc<DailyLossMonitor>,
        order_executor: Arc<OrderExecutor>,
        position_manager: Arc<PositionManager>,
        leverage: u32,
    ) -> Self {
        Self {
            bus,
            candle_store,
            mtf_engine,
            risk_validator,
            daily_loss_monitor,
            order_executor,
            position_manager,
            strategies: vec![Box::new(ConservativeStrategy), Box::new(AggressiveStrategy), Box::new(HybridStrategy)],
            duplicate_filter: Mutex::new(DuplicateFilter::default()),
            leverage,
            // Bits of a f64 account balance, updated out-of-band by the orchestrator's
            // balance sync loop; Decimal has no lock-free atomic so we store the bit pattern.
            account_balance: AtomicU64::new(0),
        }
    }

    /// Called by the orchestrator's balance sync loop to keep risk sizing current.
    pub fn set_account_balance(&self, balance: Decimal) {
        let as_f64 = rust_decimal::prelude::ToPrimitive::to_f64(&balance).unwrap_or(0.0);
        self.account_balance.store(as_f64.to_bits(), Ordering::Relaxed);
    }

    fn account_balance(&self) -> Decimal {
        let bits = self.account_balance.load(Ordering::Relaxed);
        Decimal::try_from(f64::from_bits(bits)).unwrap_or(Decimal::ZERO)
    }

    async fn timeframe_view(&self, symbol: &str, timeframe: Timeframe) -> TimeframeView {
        let candles = self.candle_store.snapshot(symbol, timeframe).await;
        let snapshot = self.mtf_engine.snapshot(symbol, timeframe).await.unwrap_or_default();
        TimeframeView { candles, snapshot }
    }

    async fn build_context(&self, symbol: &str, timestamp: i64) -> Option<AnalysisContext> {
        let m1 = self.timeframe_view(symbol, Timeframe::M1).await;
        let m15 = self.timeframe_view(symbol, Timeframe::M15).await;
        let h1 = self.timeframe_view(symbol, Timeframe::H1).await;
        let current_price = m1.candles.last().or(m15.candles.last())?.close;
        Some(AnalysisContext { symbol: symbol.to_string(), m1, m15, h1, current_price, timestamp })
    }

    async fn evaluate(&self, symbol: &str, timestamp: i64) {
        let Some(ctx) = self.build_context(symbol, timestamp).await else {
            return;
        };

        let candidates: Vec<_> = self.strategies.iter().filter_map(|strategy| strategy.analyze(&ctx)).collect();
        if candidates.is_empty() {
            return;
        }
        for candidate in &candidates {
            self.bus.publish(TradingEvent::SignalGenerated { signal: candidate.clone() }).await;
        }

        let Some(mut best) = priority_selector::select(&candidates).cloned() else {
            return;
        };

        {
            let mut filter = self.duplicate_filter.lock().await;
            if !filter.accept(best.clone()) {
                info!(symbol, strategy_id = %best.strategy_id, "signal dropped as duplicate");
                return;
            }
        }

        let entry_blocked = self.daily_loss_monitor.is_entry_blocked();
        let balance = self.account_balance();
        // Strategies emit entry/stop/take-profit only; size is derived here from
        // the same risk formula the validator checks it against (spec §4.9).
        best.size = self.risk_validator.reference_size(balance, best.entry, best.stop);
        if let Err(violation) = self.risk_validator.validate(&best, balance, entry_blocked) {
            warn!(symbol, strategy_id = %best.strategy_id, %violation, "signal rejected by risk validator");
            self.bus
                .publish(TradingEvent::SignalRejected {
                    strategy_id: best.strategy_id.clone(),
                    symbol: symbol.to_string(),
                    reason: violation.to_string(),
                })
                .await;
            return;
        }
        self.bus.publish(TradingEvent::RiskCheckPassed { signal_id: best.id, symbol: symbol.to_string() }).await;

        let side = match best.direction {
            Direction::Long => OrderSide::Buy,
            Direction::Short => OrderSide::Sell,
        };

        match self
            .position_manager
            .open(symbol, best.strategy_id.clone(), best.direction, best.size, best.entry, self.leverage, best.stop, best.take_profit, timestamp)
            .await
        {
            Ok(position) => {
                if let Err(err) = self.order_executor.execute_market(symbol, side, best.size, best.direction, false, Some(&position)).await {
                    warn!(symbol, error = %err, "order execution failed after position was opened");
                }
            }
            Err(violation) => {
                warn!(symbol, %violation, "position manager rejected signal");
                self.bus
                    .publish(TradingEvent::SignalRejected { strategy_id: best.strategy_id.clone(), symbol: symbol.to_string(), reason: violation.to_string() })
                    .await;
            }
        }
    }
}

#[async_trait]
impl EventHandler for SignalEngine {
    async fn handle(&self, event: &TradingEvent) {
        if let TradingEvent::IndicatorsUpdated { symbol, timeframe, .. } = event {
            if *timeframe == Timeframe::M15 {
                self.evaluate(symbol, chrono::Utc::now().timestamp_millis()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::execution::order_tracker::OrderTracker;
    use crate::domain::market::Candle;
    use rust_decimal_macros::dec;

    struct NoopExchange;

    #[async_trait]
    impl crate::domain::ports::Exchange for NoopExchange {
        async fn fetch_ohlcv(&self, _symbol: &str, _timeframe: Timeframe, _start_ms: i64, _limit: u32) -> anyhow::Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _symbol: &str, _timeframe: Timeframe) -> anyhow::Result<tokio::sync::mpsc::Receiver<Candle>> {
            let (_tx, rx) = tokio::sync::mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, order: &crate::domain::trading::Order) -> anyhow::Result<crate::domain::trading::Order> {
            Ok(order.clone())
        }
        async fn cancel_order(&self, _symbol: &str, _order_id: uuid::Uuid) -> anyhow::Result<()> {
            Ok(())
        }
        async fn fetch_order(&self, _symbol: &str, _order_id: uuid::Uuid) -> anyhow::Result<crate::domain::trading::Order> {
            anyhow::bail!("not found")
        }
        async fn fetch_open_orders(&self, _symbol: &str) -> anyhow::Result<Vec<crate::domain::trading::Order>> {
            Ok(vec![])
        }
        async fn fetch_positions(&self) -> anyhow::Result<Vec<crate::domain::trading::Position>> {
            Ok(vec![])
        }
        async fn fetch_balance(&self) -> anyhow::Result<Decimal> {
            Ok(dec!(10000))
        }
        async fn server_time_ms(&self) -> anyhow::Result<i64> {
            Ok(0)
        }
    }

    fn engine() -> SignalEngine {
        let bus = Arc::new(EventBus::new(64));
        let store = Arc::new(CandleStore::new(256));
        let mtf = Arc::new(MtfEngine::new(store.clone(), bus.clone(), crate::application::mtf_engine::default_timeframes()));
        let risk = Arc::new(RiskValidator::new(crate::application::risk::risk_validator::RiskConfig::default()));
        let loss_monitor = Arc::new(DailyLossMonitor::new(bus.clone(), 5.0));
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let exchange: Arc<dyn crate::domain::ports::Exchange> = Arc::new(NoopExchange);
        let executor = Arc::new(OrderExecutor::new(exchange, bus.clone(), tracker));
        let positions = Arc::new(PositionManager::new(bus.clone()));
        let engine = SignalEngine::new(bus, store, mtf, risk, loss_monitor, executor, positions, 5);
        engine.set_account_balance(dec!(10000));
        engine
    }

    #[tokio::test]
    async fn evaluate_with_no_candles_does_nothing() {
        let engine = engine();
        engine.evaluate("BTCUSDT", 0).await;
    }

    #[tokio::test]
    async fn account_balance_round_trips_through_bit_storage() {
        let engine = engine();
        engine.set_account_balance(dec!(12345.6789));
        assert_eq!(engine.account_balance(), Decimal::try_from(12345.6789_f64).unwrap());
    }
}
