use crate::application::position::position_manager::PositionManager;
use crate::domain::events::TradingEvent;
use crate::domain::ports::Exchange;
use crate::domain::trading::{Position, PositionStatus};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Max allowed relative drift between the local and exchange-reported size
/// or entry price before a reconciliation is flagged CONFLICT (spec §4.12).
pub const CONFLICT_TOLERANCE_PCT: f64 = 0.01;

/// Default periodic sync interval (spec §4.12 Position Monitor).
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Recovered,
    Conflict,
    InSync,
}

/// Reconciles exchange-reported positions against local records on startup
/// and on a periodic tick (spec §4.12 Position Monitor).
pub struct PositionMonitor {
    exchange: Arc<dyn Exchange>,
    manager: Arc<PositionManager>,
}

fn relative_diff(a: Decimal, b: Decimal) -> f64 {
    if a.is_zero() {
        return if b.is_zero() { 0.0 } else { 1.0 };
    }
    ((a - b) / a).abs().to_f64().unwrap_or(1.0)
}

impl PositionMonitor {
    pub fn new(exchange: Arc<dyn Exchange>, manager: Arc<PositionManager>) -> Self {
        Self { exchange, manager }
    }

    /// Fetches exchange positions and reconciles each against local state,
    /// creating RECOVERED records for positions the local store doesn't know
    /// about and surfacing CONFLICT when size/entry diverge beyond tolerance.
    pub async fn reconcile_on_startup(&self, now: i64) -> anyhow::Result<Vec<ReconcileOutcome>> {
        let exchange_positions = self.exchange.fetch_positions().await?;
        let local = self.manager.open_positions().await;
        let mut outcomes = Vec::with_capacity(exchange_positions.len());

        for remote in &exchange_positions {
            let existing = local
                .iter()
                .find(|p| p.symbol == remote.symbol && p.side == remote.side && p.status == PositionStatus::Open);

            match existing {
                None => {
                    info!(symbol = %remote.symbol, "no local record for exchange position, recovering");
                    self.manager
                        .open(
                            remote.symbol.clone(),
                            "RECOVERED",
                            remote.side,
                            remote.size,
                            remote.entry_price,
                            remote.leverage,
                            remote.stop_loss,
                            remote.take_profit,
                            now,
                        )
                        .await
                        .ok();
                    outcomes.push(ReconcileOutcome::Recovered);
                }
                Some(local_position) => {
                    let size_diff = relative_diff(local_position.size, remote.size);
                    let price_diff = relative_diff(local_position.entry_price, remote.entry_price);
                    if size_diff > CONFLICT_TOLERANCE_PCT || price_diff > CONFLICT_TOLERANCE_PCT {
                        warn!(symbol = %remote.symbol, size_diff, price_diff, "position conflict detected");
                        self.manager
                            .update(local_position.id, remote.current_price)
                            .await;
                        outcomes.push(ReconcileOutcome::Conflict);
                    } else {
                        outcomes.push(ReconcileOutcome::InSync);
                    }
                }
            }
        }
        Ok(outcomes)
    }

    /// Re-runs reconciliation and re-marks every local open position against
    /// current prices, publishing POSITION_UPDATED (spec §4.12 periodic sync).
    pub async fn sync_tick(&self, now: i64) -> anyhow::Result<()> {
        self.reconcile_on_startup(now).await?;
        let exchange_positions = self.exchange.fetch_positions().await?;
        for local in self.manager.open_positions().await {
            if let Some(remote) = exchange_positions.iter().find(|p: &&Position| p.symbol == local.symbol && p.side == local.side) {
                self.manager.update(local.id, remote.current_price).await;
            }
        }
        Ok(())
    }
}
