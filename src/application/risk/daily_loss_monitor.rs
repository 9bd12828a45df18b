use crate::application::event_bus::EventBus;
use crate::domain::events::TradingEvent;
use crate::domain::trading::SessionLoss;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default daily loss threshold, percent of starting balance (spec §4.9).
pub const DEFAULT_DAILY_LOSS_LIMIT_PCT: f64 = 6.0;

/// Tracks per-UTC-day realized+unrealized loss and flips the entry-blocked
/// flag when the limit is breached (spec §4.9 Daily-Loss Monitor).
pub struct DailyLossMonitor {
    bus: Arc<EventBus>,
    limit_pct: Decimal,
    session: Mutex<Option<SessionLoss>>,
    entry_blocked: Arc<AtomicBool>,
}

impl DailyLossMonitor {
    pub fn new(bus: Arc<EventBus>, limit_pct: f64) -> Self {
        Self {
            bus,
            limit_pct: Decimal::try_from(limit_pct).unwrap_or(Decimal::from(6)),
            session: Mutex::new(None),
            entry_blocked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_entry_blocked(&self) -> bool {
        self.entry_blocked.load(Ordering::Acquire)
    }

    /// Resets the block flag; does not start a new session by itself.
    pub fn reset(&self) {
        self.entry_blocked.store(false, Ordering::Release);
    }

    pub async fn start_session(&self, starting_balance: Decimal, now: DateTime<Utc>) {
        let mut session = self.session.lock().await;
        *session = Some(SessionLoss::new(now, starting_balance));
        self.entry_blocked.store(false, Ordering::Release);
    }

    /// Recomputes loss_pct against the current session, rolling over to a
    /// fresh session on UTC day change, then publishes
    /// `DAILY_LOSS_LIMIT_REACHED` if the limit is newly breached.
    pub async fn update_balance(&self, current_balance: Decimal, now: DateTime<Utc>) {
        let mut guard = self.session.lock().await;
        let needs_new_session = match guard.as_ref() {
            None => true,
            Some(session) => session.day.date_naive() != now.date_naive(),
        };
        if needs_new_session {
            *guard = Some(SessionLoss::new(now, current_balance));
            self.entry_blocked.store(false, Ordering::Release);
        }

        let session = guard.as_mut().expect("session just initialized");
        let was_reached = session.limit_reached;
        session.update_balance(current_balance, self.limit_pct);

        if session.limit_reached && !was_reached {
            self.entry_blocked.store(true, Ordering::Release);
            let loss_pct = session.loss_pct;
            drop(guard);
            self.bus.publish(TradingEvent::DailyLossLimitReached { loss_pct }).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn blocks_entry_once_limit_breached() {
        let bus = Arc::new(EventBus::new(10));
        bus.running.store(true, Ordering::SeqCst);
        let monitor = DailyLossMonitor::new(bus, 6.0);
        let now = Utc::now();
        monitor.start_session(dec!(1000), now).await;
        monitor.update_balance(dec!(930), now).await; // -7% loss
        assert!(monitor.is_entry_blocked());
    }

    #[tokio::test]
    async fn stays_unblocked_under_limit() {
        let bus = Arc::new(EventBus::new(10));
        bus.running.store(true, Ordering::SeqCst);
        let monitor = DailyLossMonitor::new(bus, 6.0);
        let now = Utc::now();
        monitor.start_session(dec!(1000), now).await;
        monitor.update_balance(dec!(980), now).await; // -2% loss
        assert!(!monitor.is_entry_blocked());
    }
}
