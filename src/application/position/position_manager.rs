use crate::application::event_bus::EventBus;
use crate::domain::errors::RiskViolation;
use crate::domain::events::TradingEvent;
use crate::domain::trading::{Direction, Position, PositionStatus};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Key distinguishing concurrently open exposures (spec §4.12: "symbol+side+strategy triple").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct OpenKey {
    symbol: String,
    side: Direction,
    strategy_id: String,
}

/// Tracks open/closed positions with PnL bookkeeping (spec §4.12). Re-opening
/// the same symbol+side+strategy while one is OPEN is an error; this manager
/// does not merge.
pub struct PositionManager {
    bus: Arc<EventBus>,
    positions: RwLock<HashMap<Uuid, Position>>,
    open_index: RwLock<HashMap<OpenKey, Uuid>>,
}

impl PositionManager {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            positions: RwLock::new(HashMap::new()),
            open_index: RwLock::new(HashMap::new()),
        }
    }

    pub async fn open(
        &self,
        symbol: impl Into<String>,
        strategy_id: impl Into<String>,
        side: Direction,
        size: Decimal,
        entry_price: Decimal,
        leverage: u32,
        stop_loss: Decimal,
        take_profit: Decimal,
        now: i64,
    ) -> Result<Position, RiskViolation> {
        let symbol = symbol.into();
        let strategy_id = strategy_id.into();
        let key = OpenKey { symbol: symbol.clone(), side, strategy_id: strategy_id.clone() };

        let mut open_index = self.open_index.write().await;
        if open_index.contains_key(&key) {
            return Err(RiskViolation::DuplicateExposure { symbol });
        }

        let position = Position::open(symbol, strategy_id, side, size, entry_price, leverage, stop_loss, take_profit, now);
        open_index.insert(key, position.id);
        drop(open_index);

        self.positions.write().await.insert(position.id, position.clone());
        info!(id = %position.id, symbol = %position.symbol, "position opened");
        self.bus.publish(TradingEvent::PositionOpened { position: position.clone() }).await;
        Ok(position)
    }

    pub async fn update(&self, id: Uuid, current_price: Decimal) -> Option<Position> {
        let mut positions = self.positions.write().await;
        let position = positions.get_mut(&id)?;
        position.mark(current_price);
        let snapshot = position.clone();
        drop(positions);
        self.bus.publish(TradingEvent::PositionUpdated { position: snapshot.clone() }).await;
        Some(snapshot)
    }

    pub async fn close(&self, id: Uuid, exit_price: Decimal, reason: impl Into<String>, fees: Decimal, now: i64) -> Option<Position> {
        let mut positions = self.positions.write().await;
        let position = positions.get_mut(&id)?;
        if position.status != PositionStatus::Open {
            warn!(id = %id, "close called on a position that is not open");
            return None;
        }
        position.close(exit_price, reason, fees, now);
        let snapshot = position.clone();
        let key = OpenKey { symbol: snapshot.symbol.clone(), side: snapshot.side, strategy_id: snapshot.strategy_id.clone() };
        drop(positions);

        self.open_index.write().await.remove(&key);
        info!(id = %id, symbol = %snapshot.symbol, realized_pnl = %snapshot.realized_pnl, "position closed");
        self.bus.publish(TradingEvent::PositionClosed { position: snapshot.clone() }).await;
        Some(snapshot)
    }

    pub async fn get(&self, id: Uuid) -> Option<Position> {
        self.positions.read().await.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<Position> {
        self.positions.read().await.values().cloned().collect()
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        self.positions
            .read()
            .await
            .values()
            .filter(|p| p.status == PositionStatus::Open)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bus() -> Arc<EventBus> {
        let bus = Arc::new(EventBus::new(100));
        bus.running.store(true, std::sync::atomic::Ordering::SeqCst);
        bus
    }

    #[tokio::test]
    async fn reopening_same_symbol_side_strategy_is_rejected() {
        let manager = PositionManager::new(bus());
        manager
            .open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 0)
            .await
            .unwrap();
        let second = manager
            .open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 1)
            .await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn closing_then_reopening_the_same_key_succeeds() {
        let manager = PositionManager::new(bus());
        let position = manager
            .open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 0)
            .await
            .unwrap();
        manager.close(position.id, dec!(110), "TAKE_PROFIT", dec!(0), 1).await;
        let reopened = manager
            .open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 2)
            .await;
        assert!(reopened.is_ok());
        assert_eq!(manager.open_positions().await.len(), 1);
    }

    #[tokio::test]
    async fn update_recomputes_unrealized_pnl() {
        let manager = PositionManager::new(bus());
        let position = manager
            .open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 0)
            .await
            .unwrap();
        let updated = manager.update(position.id, dec!(110)).await.unwrap();
        assert_eq!(updated.unrealized_pnl, dec!(50));
    }
}
