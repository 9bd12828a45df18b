use crate::application::event_bus::EventBus;
use crate::application::execution::{OrderExecutor, OrderTracker};
use crate::application::market_data::{CandleStore, HistoricalLoader, RealtimeProcessor};
use crate::application::mtf_engine::MtfEngine;
use crate::application::position::{EmergencyManager, PositionManager, PositionMonitor};
use crate::application::risk::{DailyLossMonitor, RiskValidator};
use crate::application::signal_engine::SignalEngine;
use crate::config::Config;
use crate::domain::errors::OrchestratorError;
use crate::domain::events::LoggingHandler;
use crate::domain::ports::Exchange;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Aggregates every subsystem and owns the dependency-ordered start/stop
/// sequence (spec §4.13): Event Bus -> Candle Store -> Historical Loader ->
/// Realtime Processor -> MTF Engine -> Strategy Layer -> Risk Validator ->
/// Order Executor -> Order Tracker -> Position Manager -> Position Monitor.
pub struct Orchestrator {
    pub bus: Arc<EventBus>,
    pub candle_store: Arc<CandleStore>,
    pub historical_loader: Arc<HistoricalLoader>,
    pub realtime_processor: Arc<RealtimeProcessor>,
    pub mtf_engine: Arc<MtfEngine>,
    pub risk_validator: Arc<RiskValidator>,
    pub daily_loss_monitor: Arc<DailyLossMonitor>,
    pub order_executor: Arc<OrderExecutor>,
    pub order_tracker: Arc<OrderTracker>,
    pub position_manager: Arc<PositionManager>,
    pub position_monitor: Arc<PositionMonitor>,
    pub emergency_manager: Arc<EmergencyManager>,
    pub signal_engine: Arc<SignalEngine>,
    exchange: Arc<dyn Exchange>,
    config: Config,
    started: AtomicBool,
    sync_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    balance_sync_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn build(config: Config, exchange: Arc<dyn Exchange>) -> Self {
        let bus = Arc::new(EventBus::new(config.bus.max_queue_size));
        let candle_store = Arc::new(CandleStore::new(config.storage.max_candles_per_storage));
        let historical_loader = Arc::new(HistoricalLoader::new(exchange.clone(), candle_store.clone(), bus.clone()));
        let realtime_processor = Arc::new(RealtimeProcessor::new(candle_store.clone(), bus.clone()));
        let mtf_engine = Arc::new(MtfEngine::new(candle_store.clone(), bus.clone(), config.storage.timeframes.clone()));
        let risk_validator = Arc::new(RiskValidator::new(config.risk.to_application_config()));
        let daily_loss_monitor = Arc::new(DailyLossMonitor::new(bus.clone(), config.risk.daily_loss_limit_pct));
        let order_tracker = Arc::new(OrderTracker::new(bus.clone()));
        let order_executor = Arc::new(OrderExecutor::new(exchange.clone(), bus.clone(), order_tracker.clone()));
        let position_manager = Arc::new(PositionManager::new(bus.clone()));
        let position_monitor = Arc::new(PositionMonitor::new(exchange.clone(), position_manager.clone()));
        let emergency_manager = Arc::new(EmergencyManager::with_enabled(
            bus.clone(),
            position_manager.clone(),
            order_executor.clone(),
            config.emergency_liquidation_enabled,
        ));
        let signal_engine = Arc::new(SignalEngine::new(
            bus.clone(),
            candle_store.clone(),
            mtf_engine.clone(),
            risk_validator.clone(),
            daily_loss_monitor.clone(),
            order_executor.clone(),
            position_manager.clone(),
            config.risk.leverage,
        ));

        Self {
            bus,
            candle_store,
            historical_loader,
            realtime_processor,
            mtf_engine,
            risk_validator,
            daily_loss_monitor,
            order_executor,
            order_tracker,
            position_manager,
            position_monitor,
            emergency_manager,
            signal_engine,
            exchange,
            config,
            started: AtomicBool::new(false),
            sync_task: tokio::sync::Mutex::new(None),
            balance_sync_task: tokio::sync::Mutex::new(None),
        }
    }

    /// Starts subsystems in dependency order. Aborts and leaves already-
    /// started services running-but-unused on failure (spec §7 propagation:
    /// "failures within orchestration-level startup abort startup").
    pub async fn start(&self, now_ms: i64) -> Result<(), OrchestratorError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        info!("orchestrator starting");

        self.bus.start(self.config.bus.worker_count).await;
        self.bus.subscribe_all(self.mtf_engine.clone()).await;
        self.bus.subscribe_all(self.signal_engine.clone()).await;
        self.bus.subscribe_all(Arc::new(LoggingHandler)).await;

        match self.position_monitor.reconcile_on_startup(now_ms).await {
            Ok(outcomes) => info!(count = outcomes.len(), "position recovery complete"),
            Err(err) => {
                error!(error = %err, "position recovery failed");
                return Err(OrchestratorError::Configuration(err.to_string()));
            }
        }

        let starting_balance = self.exchange.fetch_balance().await.unwrap_or_else(|err| {
            warn!(error = %err, "failed to fetch starting balance, assuming zero");
            rust_decimal::Decimal::ZERO
        });
        self.signal_engine.set_account_balance(starting_balance);
        self.daily_loss_monitor.start_session(starting_balance, chrono::Utc::now()).await;

        let monitor = self.position_monitor.clone();
        let interval = Duration::from_secs(self.config.position_sync_interval_secs);
        let running = self.bus.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !running.is_running() {
                    break;
                }
                if let Err(err) = monitor.sync_tick(0).await {
                    warn!(error = %err, "position sync tick failed");
                }
            }
        });
        *self.sync_task.lock().await = Some(handle);

        let exchange = self.exchange.clone();
        let daily_loss_monitor = self.daily_loss_monitor.clone();
        let signal_engine = self.signal_engine.clone();
        let balance_interval = Duration::from_secs(self.config.position_sync_interval_secs);
        let running = self.bus.clone();
        let balance_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(balance_interval);
            loop {
                ticker.tick().await;
                if !running.is_running() {
                    break;
                }
                match exchange.fetch_balance().await {
                    Ok(balance) => {
                        signal_engine.set_account_balance(balance);
                        daily_loss_monitor.update_balance(balance, chrono::Utc::now()).await;
                    }
                    Err(err) => warn!(error = %err, "balance sync failed"),
                }
            }
        });
        *self.balance_sync_task.lock().await = Some(balance_handle);

        info!("orchestrator started");
        Ok(())
    }

    /// Stops subsystems in reverse order with a deadline; components with
    /// pending work beyond the deadline are cancelled (spec §4.13).
    pub async fn stop(&self, deadline: Duration) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        info!("orchestrator stopping");

        if let Some(handle) = self.sync_task.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.balance_sync_task.lock().await.take() {
            handle.abort();
        }

        if tokio::time::timeout(deadline, self.bus.stop()).await.is_err() {
            warn!("event bus did not stop within deadline");
        }
        info!("orchestrator stopped");
    }

    /// AND of component health probes (spec §4.13).
    pub fn is_healthy(&self) -> bool {
        self.started.load(Ordering::Acquire) && self.bus.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Candle, Timeframe};
    use crate::domain::trading::{Order, Position};
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc::{self, Receiver};

    struct NoopExchange;
    #[async_trait]
    impl Exchange for NoopExchange {
        async fn fetch_ohlcv(&self, _: &str, _: Timeframe, _: i64, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _: &str, _: Timeframe) -> Result<Receiver<Candle>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, order: &Order) -> Result<Order> {
            Ok(order.clone())
        }
        async fn cancel_order(&self, _: &str, _: uuid::Uuid) -> Result<()> {
            Ok(())
        }
        async fn fetch_order(&self, _: &str, client_id: uuid::Uuid) -> Result<Order> {
            Err(anyhow::anyhow!("not found: {client_id}"))
        }
        async fn fetch_open_orders(&self, _: &str) -> Result<Vec<Order>> {
            Ok(vec![])
        }
        async fn fetch_positions(&self) -> Result<Vec<Position>> {
            Ok(vec![])
        }
        async fn fetch_balance(&self) -> Result<Decimal> {
            Ok(dec!(1000))
        }
        async fn server_time_ms(&self) -> Result<i64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn start_then_stop_is_healthy_then_unhealthy() {
        let config = Config::from_env().unwrap();
        let orchestrator = Orchestrator::build(config, Arc::new(NoopExchange));
        orchestrator.start(0).await.unwrap();
        assert!(orchestrator.is_healthy());
        orchestrator.stop(Duration::from_secs(1)).await;
        assert!(!orchestrator.is_healthy());
    }

    #[tokio::test]
    async fn starting_twice_is_a_no_op() {
        let config = Config::from_env().unwrap();
        let orchestrator = Orchestrator::build(config, Arc::new(NoopExchange));
        orchestrator.start(0).await.unwrap();
        orchestrator.start(0).await.unwrap();
        assert!(orchestrator.is_healthy());
        orchestrator.stop(Duration::from_secs(1)).await;
    }
}
