use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::Exchange;
use crate::domain::trading::{Order, OrderStatus, Position};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::RwLock;
use tracing::info;

/// In-process exchange double for local demo runs and integration tests.
/// Generates a synthetic random walk per symbol rather than connecting to
/// any network, mirroring the teacher's simulated `MockMarketDataService`.
pub struct MockExchange {
    orders: RwLock<HashMap<uuid::Uuid, Order>>,
    positions: RwLock<Vec<Position>>,
    balance: RwLock<Decimal>,
    base_prices: HashMap<String, Decimal>,
}

impl MockExchange {
    pub fn new() -> Self {
        let mut base_prices = HashMap::new();
        base_prices.insert("BTCUSDT".to_string(), dec!(60000));
        base_prices.insert("ETHUSDT".to_string(), dec!(3000));

        Self {
            orders: RwLock::new(HashMap::new()),
            positions: RwLock::new(Vec::new()),
            balance: RwLock::new(dec!(10000)),
            base_prices,
        }
    }

    fn base_price(&self, symbol: &str) -> Decimal {
        self.base_prices.get(symbol).copied().unwrap_or(dec!(100))
    }

    pub async fn seed_position(&self, position: Position) {
        self.positions.write().await.push(position);
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Exchange for MockExchange {
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, start_ms: i64, limit: u32) -> Result<Vec<Candle>> {
        let base = self.base_price(symbol);
        let step = timeframe.duration_ms();
        let mut candles = Vec::with_capacity(limit as usize);
        let mut price = base;
        for i in 0..limit {
            let open_time = timeframe.period_start(start_ms + i as i64 * step);
            let drift = Decimal::from_f64(((i % 7) as f64 - 3.0) * 0.0005).unwrap_or(Decimal::ZERO);
            let close = price + price * drift;
            let (high, low) = if close >= price { (close, price) } else { (price, close) };
            candles.push(Candle {
                symbol: symbol.to_string(),
                timeframe,
                open_time,
                open: price,
                high,
                low,
                close,
                volume: dec!(1),
                closed: true,
            });
            price = close;
        }
        Ok(candles)
    }

    async fn watch_ohlcv(&self, symbol: &str, timeframe: Timeframe) -> Result<Receiver<Candle>> {
        let (tx, rx) = mpsc::channel(64);
        let symbol = symbol.to_string();
        let mut price = self.base_price(&symbol);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            let mut tick: i64 = 0;
            loop {
                interval.tick().await;
                let open_time = timeframe.period_start(tick * timeframe.duration_ms());
                let drift = Decimal::from_f64((((tick % 9) as f64) - 4.0) * 0.0004).unwrap_or(Decimal::ZERO);
                let close = price + price * drift;
                let (high, low) = if close >= price { (close, price) } else { (price, close) };
                let candle = Candle {
                    symbol: symbol.clone(),
                    timeframe,
                    open_time,
                    open: price,
                    high,
                    low,
                    close,
                    volume: dec!(1),
                    closed: true,
                };
                price = close;
                tick += 1;
                if tx.send(candle).await.is_err() {
                    break;
                }
            }
        });
        Ok(rx)
    }

    async fn create_order(&self, order: &Order) -> Result<Order> {
        let mut filled = order.clone();
        filled.apply_transition(OrderStatus::Placed, Decimal::ZERO, None, None, order.created_at);
        let fill_price = order.price.unwrap_or_else(|| self.base_price(&order.symbol));
        filled.apply_transition(OrderStatus::Filled, order.quantity, Some(fill_price), None, order.created_at + 1);
        self.orders.write().await.insert(filled.client_id, filled.clone());
        info!(client_id = %filled.client_id, symbol = %filled.symbol, "mock exchange filled order");
        Ok(filled)
    }

    async fn cancel_order(&self, _symbol: &str, client_id: uuid::Uuid) -> Result<()> {
        if let Some(order) = self.orders.write().await.get_mut(&client_id) {
            order.apply_transition(OrderStatus::Cancelled, order.filled_qty, None, None, order.updated_at + 1);
        }
        Ok(())
    }

    async fn fetch_order(&self, _symbol: &str, client_id: uuid::Uuid) -> Result<Order> {
        self.orders
            .read()
            .await
            .get(&client_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("order {client_id} not found"))
    }

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        Ok(self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.symbol == symbol && !o.status.is_final())
            .cloned()
            .collect())
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>> {
        Ok(self.positions.read().await.clone())
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        Ok(*self.balance.read().await)
    }

    async fn server_time_ms(&self) -> Result<i64> {
        Ok(chrono::Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trading::Direction;

    #[tokio::test]
    async fn fetch_ohlcv_returns_requested_count() {
        let exchange = MockExchange::new();
        let candles = exchange.fetch_ohlcv("BTCUSDT", Timeframe::M15, 0, 10).await.unwrap();
        assert_eq!(candles.len(), 10);
        assert!(candles.iter().all(Candle::is_well_formed));
    }

    #[tokio::test]
    async fn create_order_fills_immediately() {
        let exchange = MockExchange::new();
        let order = Order::new_market("BTCUSDT", crate::domain::trading::OrderSide::Buy, dec!(1), Direction::Long, false);
        let filled = exchange.create_order(&order).await.unwrap();
        assert_eq!(filled.status, OrderStatus::Filled);
        let fetched = exchange.fetch_order("BTCUSDT", filled.client_id).await.unwrap();
        assert_eq!(fetched.status, OrderStatus::Filled);
    }
}
