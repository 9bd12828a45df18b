use crate::domain::market::{Candle, Timeframe};
use crate::domain::trading::{Order, Position};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc::Receiver;

/// Boundary to a futures exchange. Implementations live under
/// `infrastructure::exchange`; the application layer depends only on this
/// trait so a mock can stand in during tests.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Fetches closed candles for backfill/gap recovery.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ms: i64,
        limit: u32,
    ) -> Result<Vec<Candle>>;

    /// Opens a streaming subscription; the returned channel yields candles
    /// (both provisional and closed) as they arrive.
    async fn watch_ohlcv(&self, symbol: &str, timeframe: Timeframe) -> Result<Receiver<Candle>>;

    async fn create_order(&self, order: &Order) -> Result<Order>;

    async fn cancel_order(&self, symbol: &str, client_id: uuid::Uuid) -> Result<()>;

    async fn fetch_order(&self, symbol: &str, client_id: uuid::Uuid) -> Result<Order>;

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>>;

    async fn fetch_positions(&self) -> Result<Vec<Position>>;

    async fn fetch_balance(&self) -> Result<Decimal>;

    /// Returns the exchange-reported server time in epoch milliseconds, used
    /// to detect clock skew before placing orders.
    async fn server_time_ms(&self) -> Result<i64>;
}
