//! In-memory repository implementations.
//!
//! Suitable for tests and single-instance demo runs; data does not survive a
//! restart. Production deployments use `infrastructure::persistence` instead.

use crate::domain::repositories::{OrderRepository, PositionRepository, SessionLossRepository};
use crate::domain::trading::{Order, Position, SessionLoss};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save(&self, order: &Order) -> Result<()> {
        self.orders.write().await.insert(order.client_id, order.clone());
        Ok(())
    }

    async fn find_by_client_id(&self, client_id: Uuid) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&client_id).cloned())
    }

    async fn find_open(&self) -> Result<Vec<Order>> {
        Ok(self.orders.read().await.values().filter(|o| !o.status.is_final()).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryPositionRepository {
    positions: Arc<RwLock<HashMap<Uuid, Position>>>,
}

impl InMemoryPositionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PositionRepository for InMemoryPositionRepository {
    async fn save(&self, position: &Position) -> Result<()> {
        self.positions.write().await.insert(position.id, position.clone());
        Ok(())
    }

    async fn find_open(&self) -> Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .await
            .values()
            .filter(|p| p.status == crate::domain::trading::PositionStatus::Open)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>> {
        Ok(self.positions.read().await.get(&id).cloned())
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<Position>> {
        Ok(self.positions.read().await.values().filter(|p| p.symbol == symbol).cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemorySessionLossRepository {
    by_day: Arc<RwLock<HashMap<(i32, u32, u32), SessionLoss>>>,
}

impl InMemorySessionLossRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(day: DateTime<Utc>) -> (i32, u32, u32) {
        (day.year(), day.month(), day.day())
    }
}

#[async_trait]
impl SessionLossRepository for InMemorySessionLossRepository {
    async fn save(&self, session_loss: &SessionLoss) -> Result<()> {
        self.by_day.write().await.insert(Self::key(session_loss.day), session_loss.clone());
        Ok(())
    }

    async fn find_for_day(&self, day: DateTime<Utc>) -> Result<Option<SessionLoss>> {
        Ok(self.by_day.read().await.get(&Self::key(day)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::{Direction, OrderSide};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn order_repository_round_trips_by_client_id() {
        let repo = InMemoryOrderRepository::new();
        let order = Order::new_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false);
        repo.save(&order).await.unwrap();
        let found = repo.find_by_client_id(order.client_id).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn position_repository_filters_by_open_status() {
        let repo = InMemoryPositionRepository::new();
        let mut closed = Position::open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 1, dec!(90), dec!(110), 0);
        closed.close(dec!(105), "TP", dec!(0), 1);
        let open = Position::open("ETHUSDT", "A", Direction::Long, dec!(1), dec!(100), 1, dec!(90), dec!(110), 0);
        repo.save(&closed).await.unwrap();
        repo.save(&open).await.unwrap();
        let found = repo.find_open().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].symbol, "ETHUSDT");
    }
}
