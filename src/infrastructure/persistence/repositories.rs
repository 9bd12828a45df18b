use crate::domain::repositories::{OrderRepository, PositionRepository, SessionLossRepository};
use crate::domain::trading::{
    Direction, Order, OrderSide, OrderStatus, OrderType, Position, PositionStatus, SessionLoss, TimeInForce,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

pub struct SqlxOrderRepository {
    pool: PgPool,
}

impl SqlxOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for SqlxOrderRepository {
    async fn save(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                client_id, exchange_id, symbol, side, order_type, quantity, price, stop_price,
                time_in_force, reduce_only, position_side, status, filled_qty, avg_fill_price,
                fee, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
            ON CONFLICT (client_id) DO UPDATE SET
                exchange_id = EXCLUDED.exchange_id,
                status = EXCLUDED.status,
                filled_qty = EXCLUDED.filled_qty,
                avg_fill_price = EXCLUDED.avg_fill_price,
                fee = EXCLUDED.fee,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(order.client_id)
        .bind(&order.exchange_id)
        .bind(&order.symbol)
        .bind(order.side.to_string())
        .bind(format!("{:?}", order.order_type))
        .bind(order.quantity)
        .bind(order.price)
        .bind(order.stop_price)
        .bind(format!("{:?}", order.time_in_force))
        .bind(order.reduce_only)
        .bind(format!("{:?}", order.position_side))
        .bind(format!("{:?}", order.status))
        .bind(order.filled_qty)
        .bind(order.avg_fill_price)
        .bind(order.fee)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to persist order")?;

        info!(client_id = %order.client_id, "persisted order");
        Ok(())
    }

    async fn find_by_client_id(&self, client_id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE client_id = $1").bind(client_id).fetch_optional(&self.pool).await?;
        row.map(|r| order_from_row(&r)).transpose()
    }

    async fn find_open(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE status IN ('Pending','Placed','PartiallyFilled')").fetch_all(&self.pool).await?;
        rows.iter().map(order_from_row).collect()
    }
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order> {
    let side: String = row.try_get("side")?;
    let order_type: String = row.try_get("order_type")?;
    let time_in_force: String = row.try_get("time_in_force")?;
    let position_side: String = row.try_get("position_side")?;
    let status: String = row.try_get("status")?;

    Ok(Order {
        client_id: row.try_get("client_id")?,
        exchange_id: row.try_get("exchange_id")?,
        symbol: row.try_get("symbol")?,
        side: if side == "SELL" { OrderSide::Sell } else { OrderSide::Buy },
        order_type: match order_type.as_str() {
            "Limit" => OrderType::Limit,
            "Stop" => OrderType::Stop,
            "TakeProfit" => OrderType::TakeProfit,
            _ => OrderType::Market,
        },
        quantity: row.try_get("quantity")?,
        price: row.try_get("price")?,
        stop_price: row.try_get("stop_price")?,
        time_in_force: match time_in_force.as_str() {
            "Ioc" => TimeInForce::Ioc,
            "Fok" => TimeInForce::Fok,
            _ => TimeInForce::Gtc,
        },
        reduce_only: row.try_get("reduce_only")?,
        position_side: if position_side == "Short" { Direction::Short } else { Direction::Long },
        status: match status.as_str() {
            "Placed" => OrderStatus::Placed,
            "PartiallyFilled" => OrderStatus::PartiallyFilled,
            "Filled" => OrderStatus::Filled,
            "Failed" => OrderStatus::Failed,
            "Cancelled" => OrderStatus::Cancelled,
            "Expired" => OrderStatus::Expired,
            _ => OrderStatus::Pending,
        },
        filled_qty: row.try_get("filled_qty")?,
        avg_fill_price: row.try_get("avg_fill_price")?,
        fee: row.try_get("fee")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        status_history: Vec::new(),
    })
}

pub struct SqlxPositionRepository {
    pool: PgPool,
}

impl SqlxPositionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionRepository for SqlxPositionRepository {
    async fn save(&self, position: &Position) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO positions (
                id, symbol, strategy_id, side, size, entry_price, current_price, leverage, status,
                unrealized_pnl, realized_pnl, roi, stop_loss, take_profit, opened_at, closed_at,
                exit_price, exit_reason, fees
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19)
            ON CONFLICT (id) DO UPDATE SET
                current_price = EXCLUDED.current_price,
                status = EXCLUDED.status,
                unrealized_pnl = EXCLUDED.unrealized_pnl,
                realized_pnl = EXCLUDED.realized_pnl,
                roi = EXCLUDED.roi,
                closed_at = EXCLUDED.closed_at,
                exit_price = EXCLUDED.exit_price,
                exit_reason = EXCLUDED.exit_reason,
                fees = EXCLUDED.fees
            "#,
        )
        .bind(position.id)
        .bind(&position.symbol)
        .bind(&position.strategy_id)
        .bind(format!("{:?}", position.side))
        .bind(position.size)
        .bind(position.entry_price)
        .bind(position.current_price)
        .bind(position.leverage as i32)
        .bind(format!("{:?}", position.status))
        .bind(position.unrealized_pnl)
        .bind(position.realized_pnl)
        .bind(position.roi)
        .bind(position.stop_loss)
        .bind(position.take_profit)
        .bind(position.opened_at)
        .bind(position.closed_at)
        .bind(position.exit_price)
        .bind(&position.exit_reason)
        .bind(position.fees)
        .execute(&self.pool)
        .await
        .context("failed to persist position")?;

        Ok(())
    }

    async fn find_open(&self) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE status = 'Open'").fetch_all(&self.pool).await?;
        rows.iter().map(position_from_row).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Position>> {
        let row = sqlx::query("SELECT * FROM positions WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(|r| position_from_row(&r)).transpose()
    }

    async fn find_by_symbol(&self, symbol: &str) -> Result<Vec<Position>> {
        let rows = sqlx::query("SELECT * FROM positions WHERE symbol = $1").bind(symbol).fetch_all(&self.pool).await?;
        rows.iter().map(position_from_row).collect()
    }
}

fn position_from_row(row: &sqlx::postgres::PgRow) -> Result<Position> {
    let side: String = row.try_get("side")?;
    let status: String = row.try_get("status")?;
    let leverage: i32 = row.try_get("leverage")?;

    Ok(Position {
        id: row.try_get("id")?,
        symbol: row.try_get("symbol")?,
        strategy_id: row.try_get("strategy_id")?,
        side: if side == "Short" { Direction::Short } else { Direction::Long },
        size: row.try_get("size")?,
        entry_price: row.try_get("entry_price")?,
        current_price: row.try_get("current_price")?,
        leverage: leverage as u32,
        status: match status.as_str() {
            "Closed" => PositionStatus::Closed,
            "Liquidated" => PositionStatus::Liquidated,
            _ => PositionStatus::Open,
        },
        unrealized_pnl: row.try_get("unrealized_pnl")?,
        realized_pnl: row.try_get("realized_pnl")?,
        roi: row.try_get("roi")?,
        stop_loss: row.try_get("stop_loss")?,
        take_profit: row.try_get("take_profit")?,
        opened_at: row.try_get("opened_at")?,
        closed_at: row.try_get("closed_at")?,
        exit_price: row.try_get("exit_price")?,
        exit_reason: row.try_get("exit_reason")?,
        fees: row.try_get("fees")?,
    })
}

pub struct SqlxSessionLossRepository {
    pool: PgPool,
}

impl SqlxSessionLossRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionLossRepository for SqlxSessionLossRepository {
    async fn save(&self, session_loss: &SessionLoss) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO session_loss (day, starting_balance, current_balance, realized_pnl, unrealized_pnl, loss_pct, limit_reached)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            ON CONFLICT (day) DO UPDATE SET
                current_balance = EXCLUDED.current_balance,
                realized_pnl = EXCLUDED.realized_pnl,
                unrealized_pnl = EXCLUDED.unrealized_pnl,
                loss_pct = EXCLUDED.loss_pct,
                limit_reached = EXCLUDED.limit_reached
            "#,
        )
        .bind(session_loss.day.date_naive())
        .bind(session_loss.starting_balance)
        .bind(session_loss.current_balance)
        .bind(session_loss.realized_pnl)
        .bind(session_loss.unrealized_pnl)
        .bind(session_loss.loss_pct)
        .bind(session_loss.limit_reached)
        .execute(&self.pool)
        .await
        .context("failed to persist session loss")?;

        Ok(())
    }

    async fn find_for_day(&self, day: DateTime<Utc>) -> Result<Option<SessionLoss>> {
        let row = sqlx::query("SELECT * FROM session_loss WHERE day = $1").bind(day.date_naive()).fetch_optional(&self.pool).await?;
        row.map(|r| session_loss_from_row(&r)).transpose()
    }
}

fn session_loss_from_row(row: &sqlx::postgres::PgRow) -> Result<SessionLoss> {
    let day: NaiveDate = row.try_get("day")?;
    Ok(SessionLoss {
        day: DateTime::from_naive_utc_and_offset(day.and_hms_opt(0, 0, 0).unwrap_or_default(), Utc),
        starting_balance: row.try_get("starting_balance")?,
        current_balance: row.try_get("current_balance")?,
        realized_pnl: row.try_get("realized_pnl")?,
        unrealized_pnl: row.try_get("unrealized_pnl")?,
        loss_pct: row.try_get("loss_pct")?,
        limit_reached: row.try_get("limit_reached")?,
    })
}
