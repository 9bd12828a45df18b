use crate::application::event_bus::EventBus;
use crate::application::execution::order_tracker::OrderTracker;
use crate::application::execution::retry_manager::{classify, ErrorClass, RetryManager};
use crate::domain::errors::{ExchangeError, OrderError};
use crate::domain::events::TradingEvent;
use crate::domain::ports::Exchange;
use crate::domain::trading::{Direction, Order, OrderSide, OrderStatus, OrderType, Position, TimeInForce};
use anyhow::Error as AnyError;
use rust_decimal::Decimal;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Pre-send validation failures (spec §4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NonPositiveQuantity,
    MissingLimitPrice,
    MissingStopPrice,
    PostOnlyRequiresGtc,
    ReduceOnlyWithoutPosition,
    LiquidationInProgress,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ValidationError::NonPositiveQuantity => "quantity must be > 0",
            ValidationError::MissingLimitPrice => "limit orders require price > 0",
            ValidationError::MissingStopPrice => "stop/take-profit orders require stop_price > 0",
            ValidationError::PostOnlyRequiresGtc => "post-only orders require time_in_force=GTC",
            ValidationError::ReduceOnlyWithoutPosition => "reduce-only order has no matching open position",
            ValidationError::LiquidationInProgress => "new non-reduce-only orders are blocked during emergency liquidation",
        };
        write!(f, "{msg}")
    }
}

impl std::error::Error for ValidationError {}

fn validate(order: &Order, post_only: bool, open_position: Option<&Position>, liquidating: bool) -> Result<(), ValidationError> {
    if liquidating && !order.reduce_only {
        return Err(ValidationError::LiquidationInProgress);
    }
    if order.quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if order.order_type == OrderType::Limit && order.price.map(|p| p <= Decimal::ZERO).unwrap_or(true) {
        return Err(ValidationError::MissingLimitPrice);
    }
    if matches!(order.order_type, OrderType::Stop | OrderType::TakeProfit)
        && order.stop_price.map(|p| p <= Decimal::ZERO).unwrap_or(true)
    {
        return Err(ValidationError::MissingStopPrice);
    }
    if post_only && order.time_in_force != TimeInForce::Gtc {
        return Err(ValidationError::PostOnlyRequiresGtc);
    }
    if order.reduce_only {
        match open_position {
            Some(position) if position.side == order.position_side => {}
            _ => return Err(ValidationError::ReduceOnlyWithoutPosition),
        }
    }
    Ok(())
}

fn exchange_error_of(err: &AnyError) -> Option<&ExchangeError> {
    err.downcast_ref::<ExchangeError>()
}

/// Places, cancels, and fetches orders against the `Exchange` port, applying
/// pre-send validation and the retry policy, and publishing lifecycle events
/// (spec §4.10).
pub struct OrderExecutor {
    exchange: Arc<dyn Exchange>,
    bus: Arc<EventBus>,
    tracker: Arc<OrderTracker>,
    retry: RetryManager,
    liquidating: Arc<std::sync::atomic::AtomicBool>,
}

impl OrderExecutor {
    pub fn new(exchange: Arc<dyn Exchange>, bus: Arc<EventBus>, tracker: Arc<OrderTracker>) -> Self {
        Self {
            exchange,
            bus,
            tracker,
            retry: RetryManager::for_orders(),
            liquidating: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Entry-blocking flag shared with the emergency manager: while set, new
    /// non-reduce-only orders are refused at the boundary.
    pub fn liquidating_handle(&self) -> Arc<std::sync::atomic::AtomicBool> {
        self.liquidating.clone()
    }

    pub async fn execute_market(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        position_side: Direction,
        reduce_only: bool,
        open_position: Option<&Position>,
    ) -> Result<Order, OrderError> {
        let order = Order::new_market(symbol, side, quantity, position_side, reduce_only);
        self.send(order, false, open_position).await
    }

    pub async fn execute_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        position_side: Direction,
        reduce_only: bool,
        post_only: bool,
        open_position: Option<&Position>,
    ) -> Result<Order, OrderError> {
        let mut order = Order::new_market(symbol, side, quantity, position_side, reduce_only);
        order.order_type = OrderType::Limit;
        order.price = Some(price);
        if post_only {
            order.time_in_force = TimeInForce::Gtc;
        }
        self.send(order, post_only, open_position).await
    }

    pub async fn execute_stop(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        position_side: Direction,
        reduce_only: bool,
        open_position: Option<&Position>,
    ) -> Result<Order, OrderError> {
        let mut order = Order::new_market(symbol, side, quantity, position_side, reduce_only);
        order.order_type = OrderType::Stop;
        order.stop_price = Some(stop_price);
        self.send(order, false, open_position).await
    }

    pub async fn execute_take_profit(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        position_side: Direction,
        reduce_only: bool,
        open_position: Option<&Position>,
    ) -> Result<Order, OrderError> {
        let mut order = Order::new_market(symbol, side, quantity, position_side, reduce_only);
        order.order_type = OrderType::TakeProfit;
        order.stop_price = Some(stop_price);
        self.send(order, false, open_position).await
    }

    async fn send(
        &self,
        order: Order,
        post_only: bool,
        open_position: Option<&Position>,
    ) -> Result<Order, OrderError> {
        let liquidating = self.liquidating.load(AtomicOrdering::SeqCst);
        if let Err(violation) = validate(&order, post_only, open_position, liquidating) {
            warn!(%violation, symbol = %order.symbol, "order rejected at validation boundary");
            self.bus
                .publish(TradingEvent::OrderFailed {
                    client_id: order.client_id,
                    symbol: order.symbol.clone(),
                    reason: violation.to_string(),
                })
                .await;
            return Err(OrderError::Rejected { symbol: order.symbol.clone(), reason: violation.to_string() });
        }

        self.tracker.register(order.clone()).await;

        let mut attempt: u32 = 1;
        loop {
            match self.exchange.create_order(&order).await {
                Ok(acked) => {
                    info!(client_id = %order.client_id, symbol = %order.symbol, "order placed");
                    self.bus.publish(TradingEvent::OrderPlaced { order: acked.clone() }).await;
                    return Ok(acked);
                }
                Err(err) => {
                    let class = exchange_error_of(&err).map(classify).unwrap_or(ErrorClass::NonRetryable);
                    if class == ErrorClass::Special {
                        warn!(client_id = %order.client_id, "clock skew detected, resyncing before retry");
                        if let Err(resync_err) = self.exchange.server_time_ms().await {
                            error!(error = %resync_err, "server time resync failed");
                        }
                    }
                    if self.retry.should_retry(class, attempt) {
                        let delay = self.retry.delay_for(attempt);
                        warn!(client_id = %order.client_id, attempt, ?delay, "order send failed, retrying");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    error!(client_id = %order.client_id, error = %err, "order send failed permanently");
                    self.bus
                        .publish(TradingEvent::ExchangeError {
                            context: format!("execute_order:{}", order.symbol),
                            message: err.to_string(),
                        })
                        .await;
                    self.bus
                        .publish(TradingEvent::OrderFailed {
                            client_id: order.client_id,
                            symbol: order.symbol.clone(),
                            reason: err.to_string(),
                        })
                        .await;
                    return Err(OrderError::RetryBudgetExceeded { client_id: order.client_id, attempts: attempt });
                }
            }
        }
    }

    pub async fn cancel(&self, symbol: &str, client_id: uuid::Uuid) -> Result<(), OrderError> {
        match self.exchange.cancel_order(symbol, client_id).await {
            Ok(()) => {
                self.tracker
                    .apply_update(client_id, OrderStatus::Cancelled, Decimal::ZERO, None, None, now_ms())
                    .await;
                Ok(())
            }
            Err(err) => {
                error!(%client_id, error = %err, "cancel failed");
                Err(OrderError::NotFound { client_id })
            }
        }
    }

    pub async fn fetch(&self, symbol: &str, client_id: uuid::Uuid) -> Result<Order, OrderError> {
        self.exchange
            .fetch_order(symbol, client_id)
            .await
            .map_err(|_| OrderError::NotFound { client_id })
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Candle, Timeframe};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc::{self, Receiver};

    struct AlwaysOkExchange;
    #[async_trait]
    impl Exchange for AlwaysOkExchange {
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
            Ok(acked)
        }
        async fn cancel_order(&self, _: &str, _: uuid::Uuid) -> Result<()> {
            Ok(())
        }
        async fn fetch_order(&self, _: &str, _: uuid::Uuid) -> Result<Order> {
            Err(anyhow!("not found"))
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

    struct FlakyExchange {
        failures_before_success: AtomicU32,
    }
    #[async_trait]
    impl Exchange for FlakyExchange {
        async fn fetch_ohlcv(&self, _: &str, _: Timeframe, _: i64, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _: &str, _: Timeframe) -> Result<Receiver<Candle>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, order: &Order) -> Result<Order> {
            if self.failures_before_success.load(Ordering::SeqCst) > 0 {
                self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
                return Err(ExchangeError::ConnectionLost { reason: "reset".into() }.into());
            }
            let mut acked = order.clone();
            acked.status = OrderStatus::Placed;
            Ok(acked)
        }
        async fn cancel_order(&self, _: &str, _: uuid::Uuid) -> Result<()> {
            Ok(())
        }
        async fn fetch_order(&self, _: &str, _: uuid::Uuid) -> Result<Order> {
            Err(anyhow!("not found"))
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

    struct AlwaysFailExchange;
    #[async_trait]
    impl Exchange for AlwaysFailExchange {
        async fn fetch_ohlcv(&self, _: &str, _: Timeframe, _: i64, _: u32) -> Result<Vec<Candle>> {
            Ok(vec![])
        }
        async fn watch_ohlcv(&self, _: &str, _: Timeframe) -> Result<Receiver<Candle>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn create_order(&self, _: &Order) -> Result<Order> {
            Err(ExchangeError::RequestFailed { status: 400, body: "bad request".into() }.into())
        }
        async fn cancel_order(&self, _: &str, _: uuid::Uuid) -> Result<()> {
            Ok(())
        }
        async fn fetch_order(&self, _: &str, _: uuid::Uuid) -> Result<Order> {
            Err(anyhow!("not found"))
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
    async fn rejects_zero_quantity_without_calling_exchange() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Buy, Decimal::ZERO, Direction::Long, false, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn limit_order_without_price_is_rejected() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        let result = executor
            .execute_limit("BTCUSDT", OrderSide::Buy, dec!(1), Decimal::ZERO, Direction::Long, false, false, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn succeeds_on_valid_market_order() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false, None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn retries_on_retryable_error_then_succeeds() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let exchange = Arc::new(FlakyExchange { failures_before_success: AtomicU32::new(2) });
        let executor = OrderExecutor::new(exchange, bus, tracker);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false, None)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysFailExchange), bus, tracker);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reduce_only_without_position_is_rejected() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Sell, dec!(1), Direction::Long, true, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn new_orders_are_blocked_while_liquidating() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        executor.liquidating_handle().store(true, Ordering::SeqCst);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn reduce_only_orders_still_execute_while_liquidating() {
        let bus = bus();
        let tracker = Arc::new(OrderTracker::new(bus.clone()));
        let executor = OrderExecutor::new(Arc::new(AlwaysOkExchange), bus, tracker);
        executor.liquidating_handle().store(true, Ordering::SeqCst);
        let position = Position::open("BTCUSDT", "strategy_a", Direction::Long, dec!(1), dec!(100), 5, dec!(95), dec!(110), 0);
        let result = executor
            .execute_market("BTCUSDT", OrderSide::Sell, dec!(1), Direction::Long, true, Some(&position))
            .await;
        assert!(result.is_ok());
    }
}
