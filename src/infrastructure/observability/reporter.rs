//! Push-based metrics reporter.
//!
//! Periodically logs a structured JSON snapshot of engine state. No HTTP
//! server is exposed; this process only emits, never accepts, requests.

use crate::application::position::PositionManager;
use crate::infrastructure::observability::metrics::Metrics;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub open_positions: usize,
    pub unrealized_pnl_usd: f64,
}

pub struct MetricsReporter {
    positions: Arc<PositionManager>,
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(positions: Arc<PositionManager>, metrics: Metrics, interval_seconds: u64) -> Self {
        Self { positions, metrics, start_time: Instant::now(), interval: Duration::from_secs(interval_seconds) }
    }

    /// Runs until the process is shut down; intended to be spawned as a
    /// background task alongside the orchestrator.
    pub async fn run(self) {
        info!(interval = ?self.interval, "metrics reporter starting");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            self.report_once().await;
        }
    }

    pub async fn report_once(&self) {
        let open_positions = self.positions.open_positions().await;
        let unrealized: rust_decimal::Decimal = open_positions.iter().map(|p| p.unrealized_pnl).sum();
        let unrealized_pnl_usd = unrealized.to_f64().unwrap_or(0.0);

        self.metrics.open_positions_count.set(open_positions.len() as f64);
        self.metrics.daily_pnl_usd.set(unrealized_pnl_usd);
        for position in &open_positions {
            let notional = (position.size * position.current_price).to_f64().unwrap_or(0.0);
            self.metrics.position_value_usd.with_label_values(&[&position.symbol]).set(notional);
        }

        let snapshot = MetricsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            open_positions: open_positions.len(),
            unrealized_pnl_usd,
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(target: "metrics", "{json}"),
            Err(err) => tracing::warn!(error = %err, "failed to serialize metrics snapshot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::event_bus::EventBus;

    #[tokio::test]
    async fn report_once_reflects_open_position_count() {
        let bus = Arc::new(EventBus::new(16));
        let manager = Arc::new(PositionManager::new(bus));
        manager
            .open("BTCUSDT", "A", crate::domain::trading::Direction::Long, rust_decimal_macros::dec!(1), rust_decimal_macros::dec!(100), 1, rust_decimal_macros::dec!(90), rust_decimal_macros::dec!(110), 0)
            .await
            .unwrap();
        let metrics = Metrics::new().unwrap();
        let reporter = MetricsReporter::new(manager, metrics.clone(), 60);
        reporter.report_once().await;
        assert_eq!(metrics.open_positions_count.get(), 1.0);
    }
}
