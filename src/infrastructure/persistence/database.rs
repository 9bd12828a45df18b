use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Pooled connection to the Postgres instance backing order/position/session
/// persistence (spec §6 database contract: ACID transactions, ≥8 fractional
/// digits for decimal columns).
#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("failed to connect to postgres")?;

        info!("connected to database");
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                client_id UUID PRIMARY KEY,
                exchange_id TEXT,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                order_type TEXT NOT NULL,
                quantity NUMERIC(24, 8) NOT NULL,
                price NUMERIC(24, 8),
                stop_price NUMERIC(24, 8),
                time_in_force TEXT NOT NULL,
                reduce_only BOOLEAN NOT NULL,
                position_side TEXT NOT NULL,
                status TEXT NOT NULL,
                filled_qty NUMERIC(24, 8) NOT NULL,
                avg_fill_price NUMERIC(24, 8) NOT NULL,
                fee NUMERIC(24, 8) NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create orders table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id UUID PRIMARY KEY,
                symbol TEXT NOT NULL,
                strategy_id TEXT NOT NULL,
                side TEXT NOT NULL,
                size NUMERIC(24, 8) NOT NULL,
                entry_price NUMERIC(24, 8) NOT NULL,
                current_price NUMERIC(24, 8) NOT NULL,
                leverage INTEGER NOT NULL,
                status TEXT NOT NULL,
                unrealized_pnl NUMERIC(24, 8) NOT NULL,
                realized_pnl NUMERIC(24, 8) NOT NULL,
                roi NUMERIC(24, 8) NOT NULL,
                stop_loss NUMERIC(24, 8) NOT NULL,
                take_profit NUMERIC(24, 8) NOT NULL,
                opened_at BIGINT NOT NULL,
                closed_at BIGINT,
                exit_price NUMERIC(24, 8),
                exit_reason TEXT,
                fees NUMERIC(24, 8) NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_positions_status ON positions (status);
            CREATE INDEX IF NOT EXISTS idx_positions_symbol ON positions (symbol)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create positions indexes")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS session_loss (
                day DATE PRIMARY KEY,
                starting_balance NUMERIC(24, 8) NOT NULL,
                current_balance NUMERIC(24, 8) NOT NULL,
                realized_pnl NUMERIC(24, 8) NOT NULL,
                unrealized_pnl NUMERIC(24, 8) NOT NULL,
                loss_pct NUMERIC(24, 8) NOT NULL,
                limit_reached BOOLEAN NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create session_loss table")?;

        info!("database schema migrated");
        Ok(())
    }
}
