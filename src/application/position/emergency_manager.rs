use crate::application::event_bus::EventBus;
use crate::application::execution::order_executor::OrderExecutor;
use crate::application::position::position_manager::PositionManager;
use crate::domain::events::TradingEvent;
use crate::domain::trading::{Direction, OrderSide};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    Running,
    Liquidating,
    Paused,
}

/// Liquidates every open position on operator or risk-system command (spec
/// §4.12 Emergency Manager). Guarded against concurrent invocation.
pub struct EmergencyManager {
    bus: Arc<EventBus>,
    positions: Arc<PositionManager>,
    executor: Arc<OrderExecutor>,
    order_block: Arc<AtomicBool>,
    status: Mutex<SystemStatus>,
    enabled: bool,
}

impl EmergencyManager {
    pub fn new(bus: Arc<EventBus>, positions: Arc<PositionManager>, executor: Arc<OrderExecutor>) -> Self {
        Self::with_enabled(bus, positions, executor, true)
    }

    /// `enabled` mirrors `config.emergency_liquidation_enabled` (spec §6
    /// configuration, §7 state-conflict policy: refuse, log, continue). When
    /// disabled, `emergency_liquidate_all` refuses to touch any position.
    pub fn with_enabled(bus: Arc<EventBus>, positions: Arc<PositionManager>, executor: Arc<OrderExecutor>, enabled: bool) -> Self {
        let order_block = executor.liquidating_handle();
        Self { bus, positions, executor, order_block, status: Mutex::new(SystemStatus::Running), enabled }
    }

    pub async fn status(&self) -> SystemStatus {
        *self.status.lock().await
    }

    /// Closes every OPEN position with reduce-only MARKET orders. A call made
    /// while already liquidating is a no-op returning the current status.
    /// Refuses and logs if liquidation has been disabled via configuration.
    pub async fn emergency_liquidate_all(&self, reason: &str, now: i64) -> SystemStatus {
        if !self.enabled {
            warn!(reason, "emergency liquidation requested but disabled by configuration, refusing");
            return self.status().await;
        }
        let mut status = self.status.lock().await;
        if *status == SystemStatus::Liquidating {
            return *status;
        }
        *status = SystemStatus::Liquidating;
        self.order_block.store(true, Ordering::SeqCst);
        drop(status);

        warn!(reason, "emergency liquidation triggered");
        self.bus.publish(TradingEvent::SystemStop { reason: reason.to_string() }).await;

        for position in self.positions.open_positions().await {
            let side = match position.side {
                Direction::Long => OrderSide::Sell,
                Direction::Short => OrderSide::Buy,
            };

            match self
                .executor
                .execute_market(&position.symbol, side, position.size, position.side, true, Some(&position))
                .await
            {
                Ok(order) => {
                    let exit_price = order.avg_fill_price;
                    let exit_price = if exit_price.is_zero() { position.current_price } else { exit_price };
                    self.positions.close(position.id, exit_price, "EMERGENCY", order.fee, now).await;
                    info!(symbol = %position.symbol, "position liquidated");
                }
                Err(err) => {
                    error!(symbol = %position.symbol, error = %err, "emergency liquidation order failed");
                    self.bus
                        .publish(TradingEvent::EmergencyLiquidation {
                            symbol: position.symbol.clone(),
                            direction: position.side,
                            reason: err.to_string(),
                        })
                        .await;
                }
            }
        }

        let mut status = self.status.lock().await;
        *status = SystemStatus::Paused;
        *status
    }

    /// Clears the entry-blocked flag so new orders flow again; does not
    /// reopen any positions.
    pub async fn resume(&self) {
        let mut status = self.status.lock().await;
        self.order_block.store(false, Ordering::SeqCst);
        *status = SystemStatus::Running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::execution::order_tracker::OrderTracker;
    use crate::domain::market::{Candle, Timeframe};
    use crate::domain::ports::Exchange;
    use crate::domain::trading::{Order, OrderStatus, Position};
    use anyhow::Result;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc::{self, Receiver};

    struct FillingExchange;
    #[async_trait]
    impl Exchange for FillingExchange {
        async fn fetch_ohlcv(&self, _: &str, _: Timeframe, _: i64, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _: &str, _: Timeframe) -> Result<Receiver<Candle>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, order: &Order) -> Result<Order> {
            let mut acked = order.clone();
            acked.status = OrderStatus::Placed;
            acked.avg_fill_price = dec!(100);
            Ok(acked)
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

    fn bus() -> Arc<EventBus> {
        let bus = Arc::new(EventBus::new(100));
        bus.running.store(true, std::sync::atomic::Ordering::SeqCst);
        bus
    }

    #[tokio::test]
    async fn liquidates_all_open_positions_and_pauses() {
        let bus = bus();
        let positions = Arc::new(PositionManager::new(bus.clone()));
        positions
            .open("BTCUSDT", "A", Direction::Long, dec!(0.1), dec!(50000), 5, dec!(49000), dec!(52000), 0)
            .await
            .unwrap();
        positions
            .open("ETHUSDT", "A", Direction::Short, dec!(1), dec!(3000), 5, dec!(3100), dec!(2800), 0)
            .await
            .unwrap();

        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = Arc::new(OrderExecutor::new(Arc::new(FillingExchange), bus.clone(), tracker));
        let manager = EmergencyManager::new(bus, positions.clone(), executor);

        let status = manager.emergency_liquidate_all("test", 1).await;
        assert_eq!(status, SystemStatus::Paused);
        assert_eq!(positions.open_positions().await.len(), 0);
    }

    struct SlowExchange;
    #[async_trait]
    impl Exchange for SlowExchange {
        async fn fetch_ohlcv(&self, _: &str, _: Timeframe, _: i64, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _: &str, _: Timeframe) -> Result<Receiver<Candle>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, order: &Order) -> Result<Order> {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            let mut acked = order.clone();
            acked.status = OrderStatus::Placed;
            acked.avg_fill_price = dec!(100);
            Ok(acked)
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
    async fn concurrent_invocation_is_a_no_op() {
        let bus = bus();
        let positions = Arc::new(PositionManager::new(bus.clone()));
        positions
            .open("BTCUSDT", "A", Direction::Long, dec!(0.1), dec!(50000), 5, dec!(49000), dec!(52000), 0)
            .await
            .unwrap();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = Arc::new(OrderExecutor::new(Arc::new(SlowExchange), bus.clone(), tracker));
        let manager = Arc::new(EmergencyManager::new(bus, positions, executor));

        let manager_clone = manager.clone();
        let first = tokio::spawn(async move { manager_clone.emergency_liquidate_all("first", 1).await });
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = manager.emergency_liquidate_all("second", 2).await;

        assert_eq!(second, SystemStatus::Liquidating);
        let first_result = first.await.unwrap();
        assert_eq!(first_result, SystemStatus::Paused);
    }

    #[tokio::test]
    async fn disabled_manager_refuses_to_liquidate() {
        let bus = bus();
        let positions = Arc::new(PositionManager::new(bus.clone()));
        positions
            .open("BTCUSDT", "A", Direction::Long, dec!(0.1), dec!(50000), 5, dec!(49000), dec!(52000), 0)
            .await
            .unwrap();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = Arc::new(OrderExecutor::new(Arc::new(FillingExchange), bus.clone(), tracker));
        let manager = EmergencyManager::with_enabled(bus, positions.clone(), executor, false);

        let status = manager.emergency_liquidate_all("test", 1).await;
        assert_eq!(status, SystemStatus::Running);
        assert_eq!(positions.open_positions().await.len(), 1);
    }
}
