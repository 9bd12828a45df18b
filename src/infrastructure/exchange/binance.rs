//! Binance USDT-M Futures adapter implementing the `Exchange` port.
//!
//! REST for order management, account state and historical klines; a
//! websocket stream for live candles. Requests are HMAC-SHA256 signed per
//! Binance's futures API convention.

use crate::domain::market::{Candle, Timeframe};
use crate::domain::ports::Exchange;
use crate::domain::trading::{Direction, Order, OrderSide, OrderStatus, OrderType, Position, PositionStatus};
use crate::infrastructure::core::circuit_breaker::CircuitBreaker;
use crate::infrastructure::core::http_client_factory::HttpClientFactory;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use hmac::{Hmac, Mac};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

pub struct BinanceFuturesExchange {
    client: ClientWithMiddleware,
    api_key: String,
    secret_key: String,
    base_url: String,
    ws_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl BinanceFuturesExchange {
    pub fn new(api_key: String, secret_key: String, base_url: String, ws_url: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            api_key,
            secret_key,
            base_url,
            ws_url,
            circuit_breaker: Arc::new(CircuitBreaker::new("binance_futures", 5, 2, Duration::from_secs(30))),
        }
    }

    fn sign(&self, query: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes()).expect("hmac accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn signed_query(&self, params: &[(&str, String)]) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let mut query = params.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("timestamp={timestamp}&recvWindow=5000"));
        let signature = self.sign(&query);
        format!("{query}&signature={signature}")
    }

    async fn request_signed(&self, method: reqwest::Method, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let query = self.signed_query(params);
        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .circuit_breaker
            .call(async {
                self.client
                    .request(method.clone(), &url)
                    .header("X-MBX-APIKEY", &self.api_key)
                    .send()
                    .await
            })
            .await
            .map_err(|err| anyhow::anyhow!("circuit breaker: {err}"))?;

        let status = response.status();
        let body = response.text().await.context("failed to read response body")?;
        if !status.is_success() {
            anyhow::bail!("binance futures API returned {status}: {body}");
        }
        serde_json::from_str(&body).context("failed to parse binance futures response")
    }
}

#[derive(Deserialize)]
struct RawKline(Value, Value, Value, Value, Value, Value, Value, Value, Value, Value, Value, Value);

fn parse_decimal(value: &Value) -> Decimal {
    if let Some(s) = value.as_str() {
        return Decimal::from_str(s).unwrap_or(Decimal::ZERO);
    }
    if let Some(f) = value.as_f64() {
        return Decimal::from_f64(f).unwrap_or(Decimal::ZERO);
    }
    Decimal::ZERO
}

#[async_trait]
impl Exchange for BinanceFuturesExchange {
    async fn fetch_ohlcv(&self, symbol: &str, timeframe: Timeframe, start_ms: i64, limit: u32) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={}&interval={}&startTime={}&limit={}",
            self.base_url,
            symbol,
            timeframe.to_binance_string(),
            start_ms,
            limit,
        );
        let response = self.client.get(&url).send().await.context("klines request failed")?;
        let status = response.status();
        let body = response.text().await.context("failed to read klines body")?;
        if !status.is_success() {
            anyhow::bail!("binance klines returned {status}: {body}");
        }
        let raw: Vec<RawKline> = serde_json::from_str(&body).context("failed to parse klines response")?;

        Ok(raw
            .into_iter()
            .map(|k| Candle {
                symbol: symbol.to_string(),
                timeframe,
                open_time: k.0.as_i64().unwrap_or(0),
                open: parse_decimal(&k.1),
                high: parse_decimal(&k.2),
                low: parse_decimal(&k.3),
                close: parse_decimal(&k.4),
                volume: parse_decimal(&k.5),
                closed: true,
            })
            .collect())
    }

    async fn watch_ohlcv(&self, symbol: &str, timeframe: Timeframe) -> Result<Receiver<Candle>> {
        let (tx, rx) = mpsc::channel(256);
        let stream_url = format!("{}/ws/{}@kline_{}", self.ws_url, symbol.to_lowercase(), timeframe.to_binance_string());
        let symbol = symbol.to_string();

        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            const MAX_BACKOFF: Duration = Duration::from_secs(30);
            loop {
                match connect_async(&stream_url).await {
                    Ok((mut socket, _)) => {
                        info!(symbol = %symbol, "connected to binance kline stream");
                        backoff = Duration::from_secs(1);
                        while let Some(message) = socket.next().await {
                            match message {
                                Ok(Message::Text(text)) => {
                                    if let Some(candle) = parse_kline_event(&text, timeframe) {
                                        if tx.send(candle).await.is_err() {
                                            return;
                                        }
                                    }
                                }
                                Ok(Message::Close(_)) => break,
                                Err(err) => {
                                    warn!(symbol = %symbol, error = %err, "binance kline stream error");
                                    break;
                                }
                                _ => {}
                            }
                        }
                    }
                    Err(err) => {
                        warn!(symbol = %symbol, error = %err, "failed to connect to binance kline stream");
                    }
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        });

        Ok(rx)
    }

    async fn create_order(&self, order: &Order) -> Result<Order> {
        let side = match order.side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        let order_type = match order.order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP_MARKET",
            OrderType::TakeProfit => "TAKE_PROFIT_MARKET",
        };

        let mut params = vec![
            ("symbol", order.symbol.clone()),
            ("side", side.to_string()),
            ("type", order_type.to_string()),
            ("quantity", order.quantity.to_string()),
            ("newClientOrderId", order.client_id.to_string()),
        ];
        if order.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }
        if let Some(price) = order.price {
            params.push(("price", price.to_string()));
            params.push(("timeInForce", "GTC".to_string()));
        }
        if let Some(stop_price) = order.stop_price {
            params.push(("stopPrice", stop_price.to_string()));
        }

        let body = self.request_signed(reqwest::Method::POST, "/fapi/v1/order", &params).await?;

        let mut placed = order.clone();
        let exchange_order_id = body.get("orderId").and_then(|v| v.as_i64()).map(|id| id.to_string());
        placed.exchange_id = exchange_order_id;
        placed.apply_transition(OrderStatus::Placed, Decimal::ZERO, None, None, chrono::Utc::now().timestamp_millis());
        Ok(placed)
    }

    async fn cancel_order(&self, symbol: &str, client_id: uuid::Uuid) -> Result<()> {
        let params = vec![("symbol", symbol.to_string()), ("origClientOrderId", client_id.to_string())];
        self.request_signed(reqwest::Method::DELETE, "/fapi/v1/order", &params).await?;
        Ok(())
    }

    async fn fetch_order(&self, symbol: &str, client_id: uuid::Uuid) -> Result<Order> {
        let params = vec![("symbol", symbol.to_string()), ("origClientOrderId", client_id.to_string())];
        let body = self.request_signed(reqwest::Method::GET, "/fapi/v1/order", &params).await?;
        order_from_json(&body, client_id)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        let params = vec![("symbol", symbol.to_string())];
        let body = self.request_signed(reqwest::Method::GET, "/fapi/v1/openOrders", &params).await?;
        let entries = body.as_array().cloned().unwrap_or_default();
        entries
            .into_iter()
            .map(|entry| {
                let client_id = entry
                    .get("clientOrderId")
                    .and_then(|v| v.as_str())
                    .and_then(|s| uuid::Uuid::parse_str(s).ok())
                    .unwrap_or_else(uuid::Uuid::new_v4);
                order_from_json(&entry, client_id)
            })
            .collect()
    }

    async fn fetch_positions(&self) -> Result<Vec<Position>> {
        let body = self.request_signed(reqwest::Method::GET, "/fapi/v2/positionRisk", &[]).await?;
        let entries = body.as_array().cloned().unwrap_or_default();
        let now = chrono::Utc::now().timestamp_millis();
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let size = parse_decimal(entry.get("positionAmt")?);
                if size.is_zero() {
                    return None;
                }
                let symbol = entry.get("symbol")?.as_str()?.to_string();
                let entry_price = parse_decimal(entry.get("entryPrice")?);
                let mark_price = parse_decimal(entry.get("markPrice")?);
                let leverage = entry.get("leverage").and_then(|v| v.as_str()).and_then(|s| s.parse().ok()).unwrap_or(1);
                let side = if size > Decimal::ZERO { Direction::Long } else { Direction::Short };
                let mut position = Position::open(symbol, "RECOVERED", side, size.abs(), entry_price, leverage, Decimal::ZERO, Decimal::ZERO, now);
                position.mark(mark_price);
                position.status = PositionStatus::Open;
                Some(position)
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Decimal> {
        let body = self.request_signed(reqwest::Method::GET, "/fapi/v2/balance", &[]).await?;
        let entries = body.as_array().cloned().unwrap_or_default();
        Ok(entries
            .into_iter()
            .find(|entry| entry.get("asset").and_then(|v| v.as_str()) == Some("USDT"))
            .map(|entry| parse_decimal(entry.get("balance").unwrap_or(&Value::Null)))
            .unwrap_or(Decimal::ZERO))
    }

    async fn server_time_ms(&self) -> Result<i64> {
        let url = format!("{}/fapi/v1/time", self.base_url);
        let response = self.client.get(&url).send().await.context("server time request failed")?;
        let body: Value = response.json().await.context("failed to parse server time response")?;
        body.get("serverTime").and_then(|v| v.as_i64()).context("missing serverTime field")
    }
}

fn order_from_json(body: &Value, client_id: uuid::Uuid) -> Result<Order> {
    let symbol = body.get("symbol").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let side = match body.get("side").and_then(|v| v.as_str()) {
        Some("SELL") => OrderSide::Sell,
        _ => OrderSide::Buy,
    };
    let order_type = match body.get("type").and_then(|v| v.as_str()) {
        Some("LIMIT") => OrderType::Limit,
        Some("STOP_MARKET") | Some("STOP") => OrderType::Stop,
        Some("TAKE_PROFIT_MARKET") | Some("TAKE_PROFIT") => OrderType::TakeProfit,
        _ => OrderType::Market,
    };
    let status = match body.get("status").and_then(|v| v.as_str()) {
        Some("NEW") => OrderStatus::Placed,
        Some("PARTIALLY_FILLED") => OrderStatus::PartiallyFilled,
        Some("FILLED") => OrderStatus::Filled,
        Some("CANCELED") | Some("CANCELLED") => OrderStatus::Cancelled,
        Some("EXPIRED") => OrderStatus::Expired,
        Some("REJECTED") => OrderStatus::Failed,
        _ => OrderStatus::Pending,
    };
    let quantity = parse_decimal(body.get("origQty").unwrap_or(&Value::Null));
    let filled_qty = parse_decimal(body.get("executedQty").unwrap_or(&Value::Null));
    let price = body.get("price").map(parse_decimal).filter(|p| !p.is_zero());
    let now = chrono::Utc::now().timestamp_millis();

    Ok(Order {
        client_id,
        exchange_id: body.get("orderId").and_then(|v| v.as_i64()).map(|id| id.to_string()),
        symbol,
        side,
        order_type,
        quantity,
        price,
        stop_price: body.get("stopPrice").map(parse_decimal).filter(|p| !p.is_zero()),
        time_in_force: crate::domain::trading::TimeInForce::Gtc,
        reduce_only: body.get("reduceOnly").and_then(|v| v.as_bool()).unwrap_or(false),
        position_side: Direction::Long,
        status,
        filled_qty,
        avg_fill_price: body.get("avgPrice").map(parse_decimal).unwrap_or(Decimal::ZERO),
        fee: Decimal::ZERO,
        created_at: now,
        updated_at: now,
        status_history: Vec::new(),
    })
}

fn parse_kline_event(text: &str, timeframe: Timeframe) -> Option<Candle> {
    let value: Value = serde_json::from_str(text).ok()?;
    let kline = value.get("k")?;
    let symbol = kline.get("s")?.as_str()?.to_string();
    Some(Candle {
        symbol,
        timeframe,
        open_time: kline.get("t")?.as_i64()?,
        open: parse_decimal(kline.get("o")?),
        high: parse_decimal(kline.get("h")?),
        low: parse_decimal(kline.get("l")?),
        close: parse_decimal(kline.get("c")?),
        volume: parse_decimal(kline.get("v")?),
        closed: kline.get("x").and_then(|v| v.as_bool()).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_kline_event() {
        let text = r#"{"e":"kline","s":"BTCUSDT","k":{"t":1704067200000,"o":"100.0","h":"105.0","l":"98.0","c":"103.0","v":"12.5","x":true}}"#;
        let candle = parse_kline_event(text, Timeframe::M15).unwrap();
        assert_eq!(candle.symbol, "BTCUSDT");
        assert!(candle.closed);
        assert_eq!(candle.close, Decimal::from_str("103.0").unwrap());
    }

    #[test]
    fn parses_order_status_words() {
        let body = serde_json::json!({
            "symbol": "BTCUSDT", "side": "BUY", "type": "MARKET", "status": "FILLED",
            "origQty": "1", "executedQty": "1", "avgPrice": "100.5"
        });
        let order = order_from_json(&body, uuid::Uuid::new_v4()).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.avg_fill_price, Decimal::from_str("100.5").unwrap());
    }
}
