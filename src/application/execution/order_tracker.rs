use crate::application::event_bus::EventBus;
use crate::domain::events::TradingEvent;
use crate::domain::trading::{Order, OrderStatus};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bounded history size (spec §4.11).
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Maps an exchange status word to our internal `OrderStatus`. Unknown
/// statuses return `None` and are logged by the caller (spec §4.11).
pub fn map_exchange_status(word: &str) -> Option<OrderStatus> {
    match word {
        "NEW" => Some(OrderStatus::Placed),
        "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
        "FILLED" => Some(OrderStatus::Filled),
        "CANCELED" | "CANCELLED" => Some(OrderStatus::Cancelled),
        "REJECTED" => Some(OrderStatus::Failed),
        "EXPIRED" => Some(OrderStatus::Expired),
        _ => None,
    }
}

/// Active-order map plus bounded history with guarded status transitions
/// (spec §4.11).
pub struct OrderTracker {
    active: RwLock<HashMap<Uuid, Order>>,
    history: RwLock<VecDeque<Order>>,
    history_capacity: usize,
    bus: Arc<EventBus>,
}

impl OrderTracker {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY)),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            bus,
        }
    }

    pub async fn register(&self, order: Order) {
        self.active.write().await.insert(order.client_id, order);
    }

    pub async fn get(&self, client_id: Uuid) -> Option<Order> {
        self.active.read().await.get(&client_id).cloned()
    }

    /// Applies a status update (from REST poll or stream) with an already
    /// mapped `OrderStatus`. Returns `true` if the transition was allowed.
    pub async fn apply_update(
        &self,
        client_id: Uuid,
        next: OrderStatus,
        filled_qty: Decimal,
        fill_price: Option<Decimal>,
        error: Option<String>,
        now: i64,
    ) -> bool {
        let mut active = self.active.write().await;
        let Some(order) = active.get_mut(&client_id) else {
            warn!(%client_id, "status update for unknown order");
            return false;
        };
        let allowed = order.apply_transition(next, filled_qty, fill_price, error, now);
        let became_terminal = order.status.is_final();
        let order_snapshot = order.clone();
        if became_terminal {
            active.remove(&client_id);
        }
        drop(active);

        if became_terminal {
            self.push_history(order_snapshot.clone()).await;
            self.emit_terminal_event(&order_snapshot).await;
        }
        allowed
    }

    /// Applies an update arriving as a raw exchange status word; unknown
    /// words are logged and ignored.
    pub async fn apply_stream_update(
        &self,
        client_id: Uuid,
        exchange_status: &str,
        filled_qty: Decimal,
        fill_price: Option<Decimal>,
        now: i64,
    ) -> bool {
        match map_exchange_status(exchange_status) {
            Some(status) => self.apply_update(client_id, status, filled_qty, fill_price, None, now).await,
            None => {
                debug!(exchange_status, "ignoring unknown exchange status word");
                false
            }
        }
    }

    async fn push_history(&self, order: Order) {
        let mut history = self.history.write().await;
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(order);
    }

    async fn emit_terminal_event(&self, order: &Order) {
        let event = match order.status {
            OrderStatus::Filled => TradingEvent::OrderFilled { order: order.clone() },
            OrderStatus::Cancelled | OrderStatus::Expired => TradingEvent::OrderCancelled {
                client_id: order.client_id,
                reason: format!("{:?}", order.status),
            },
            OrderStatus::Failed => TradingEvent::OrderFailed {
                client_id: order.client_id,
                symbol: order.symbol.clone(),
                reason: "order failed".to_string(),
            },
            _ => return,
        };
        self.bus.publish(event).await;
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn active_len(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::{Direction, OrderSide};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn terminal_transition_migrates_to_history() {
        let bus = Arc::new(EventBus::new(10));
        bus.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let tracker = OrderTracker::new(bus);
        let order = Order::new_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false);
        let client_id = order.client_id;
        tracker.register(order).await;

        tracker.apply_update(client_id, OrderStatus::Placed, Decimal::ZERO, None, None, 1).await;
        tracker.apply_update(client_id, OrderStatus::Filled, dec!(1), Some(dec!(100)), None, 2).await;

        assert_eq!(tracker.active_len().await, 0);
        assert_eq!(tracker.history_len().await, 1);
    }

    #[test]
    fn maps_known_exchange_status_words() {
        assert_eq!(map_exchange_status("NEW"), Some(OrderStatus::Placed));
        assert_eq!(map_exchange_status("BOGUS"), None);
    }
}
