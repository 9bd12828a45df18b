use crate::domain::trading::{Order, Position, SessionLoss};
use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence boundary for positions. Implementations live under
/// `infrastructure::persistence`.
#[async_trait]
pub trait PositionRepository: Send + Sync {
    async fn save(&self, position: &Position) -> Result<()>;
    async fn find_open(&self) -> Result<Vec<Position>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>>;
    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<Position>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save(&self, order: &Order) -> Result<()>;
    async fn find_by_client_id(&self, client_id: Uuid) -> Result<Option<Order>>;
    async fn find_open(&self) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait SessionLossRepository: Send + Sync {
    async fn save(&self, session_loss: &SessionLoss) -> Result<()>;
    async fn find_for_day(&self, day: chrono::DateTime<chrono::Utc>) -> Result<Option<SessionLoss>>;
}
