use crate::domain::market::Timeframe;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

/// A strategy's proposed trade. Immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: Uuid,
    pub strategy_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub entry: Decimal,
    pub stop: Decimal,
    pub take_profit: Decimal,
    pub size: Decimal,
    /// 0.0..=1.0
    pub confidence: f64,
    pub timestamp: i64,
    pub timeframe: Timeframe,
    pub rationale: String,
    pub risk_reward: f64,
}

impl Signal {
    /// RR = |take_profit - entry| / |entry - stop|.
    pub fn compute_risk_reward(entry: Decimal, stop: Decimal, take_profit: Decimal) -> f64 {
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            return 0.0;
        }
        let reward = (take_profit - entry).abs();
        (reward / risk).try_into().unwrap_or(0.0)
    }

    /// spec §3 Signal directionality rule: LONG needs stop < entry < take_profit;
    /// SHORT needs take_profit < entry < stop.
    pub fn is_directionally_valid(&self) -> bool {
        match self.direction {
            Direction::Long => self.stop < self.entry && self.take_profit > self.entry,
            Direction::Short => self.stop > self.entry && self.take_profit < self.entry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    TakeProfit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    Gtc,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Placed,
    PartiallyFilled,
    Filled,
    Failed,
    Cancelled,
    Expired,
}

impl OrderStatus {
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Failed | OrderStatus::Cancelled | OrderStatus::Expired
        )
    }

    /// Valid next states per the guarded state machine in spec §4.11.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Placed) => true,
            (Placed, PartiallyFilled | Filled | Cancelled | Expired | Failed) => true,
            (PartiallyFilled, PartiallyFilled | Filled | Cancelled | Expired | Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusHistoryEntry {
    pub from: Option<OrderStatus>,
    pub to: OrderStatus,
    pub timestamp: i64,
    pub filled_qty: Decimal,
    pub fill_price: Option<Decimal>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub client_id: Uuid,
    pub exchange_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub position_side: Direction,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub avg_fill_price: Decimal,
    pub fee: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
    pub status_history: Vec<OrderStatusHistoryEntry>,
}

impl Order {
    pub fn new_market(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        position_side: Direction,
        reduce_only: bool,
    ) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            client_id: Uuid::new_v4(),
            exchange_id: None,
            symbol: symbol.into(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::Gtc,
            reduce_only,
            position_side,
            status: OrderStatus::Pending,
            filled_qty: Decimal::ZERO,
            avg_fill_price: Decimal::ZERO,
            fee: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            status_history: Vec::new(),
        }
    }

    /// Applies a guarded status transition, recording history. Regressive or
    /// otherwise invalid transitions are recorded but do not change `status`
    /// (spec §4.11 state-conflict policy).
    pub fn apply_transition(
        &mut self,
        next: OrderStatus,
        filled_qty: Decimal,
        fill_price: Option<Decimal>,
        error: Option<String>,
        now: i64,
    ) -> bool {
        let allowed = self.status.can_transition_to(next);
        self.status_history.push(OrderStatusHistoryEntry {
            from: Some(self.status),
            to: next,
            timestamp: now,
            filled_qty,
            fill_price,
            error,
        });
        if allowed {
            self.status = next;
            self.filled_qty = filled_qty;
            if let Some(price) = fill_price {
                self.avg_fill_price = price;
            }
            self.updated_at = now;
        }
        allowed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Open,
    Closed,
    Liquidated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub strategy_id: String,
    pub side: Direction,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub leverage: u32,
    pub status: PositionStatus,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub roi: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    pub exit_price: Option<Decimal>,
    pub exit_reason: Option<String>,
    pub fees: Decimal,
}

impl Position {
    pub fn open(
        symbol: impl Into<String>,
        strategy_id: impl Into<String>,
        side: Direction,
        size: Decimal,
        entry_price: Decimal,
        leverage: u32,
        stop_loss: Decimal,
        take_profit: Decimal,
        opened_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.into(),
            strategy_id: strategy_id.into(),
            side,
            size,
            entry_price,
            current_price: entry_price,
            leverage,
            status: PositionStatus::Open,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            roi: Decimal::ZERO,
            stop_loss,
            take_profit,
            opened_at,
            closed_at: None,
            exit_price: None,
            exit_reason: None,
            fees: Decimal::ZERO,
        }
    }

    /// Recomputes unrealized PnL for a new mark price (spec §4.12 PnL formulas).
    pub fn mark(&mut self, current_price: Decimal) {
        self.current_price = current_price;
        self.unrealized_pnl = self.pnl_at(current_price);
    }

    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        let leverage = Decimal::from(self.leverage);
        match self.side {
            Direction::Long => (price - self.entry_price) * self.size * leverage,
            Direction::Short => (self.entry_price - price) * self.size * leverage,
        }
    }

    /// Closes the position, computing realized PnL = PnL-at-exit minus fees and
    /// ROI = realized / (entry * size) * 100.
    pub fn close(&mut self, exit_price: Decimal, reason: impl Into<String>, fees: Decimal, closed_at: i64) {
        let gross = self.pnl_at(exit_price);
        self.realized_pnl = gross - fees;
        self.fees += fees;
        self.exit_price = Some(exit_price);
        self.exit_reason = Some(reason.into());
        self.closed_at = Some(closed_at);
        self.status = PositionStatus::Closed;
        let denom = self.entry_price * self.size;
        self.roi = if denom.is_zero() {
            Decimal::ZERO
        } else {
            self.realized_pnl / denom * Decimal::from(100)
        };
    }

    pub fn closing_side(&self) -> OrderSide {
        match self.side {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }
}

/// Per-UTC-day tracking for the daily-loss guard (spec §4.9, §3 SessionLoss).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLoss {
    pub day: DateTime<Utc>,
    pub starting_balance: Decimal,
    pub current_balance: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub loss_pct: Decimal,
    pub limit_reached: bool,
}

impl SessionLoss {
    pub fn new(day: DateTime<Utc>, starting_balance: Decimal) -> Self {
        Self {
            day,
            starting_balance,
            current_balance: starting_balance,
            realized_pnl: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            loss_pct: Decimal::ZERO,
            limit_reached: false,
        }
    }

    /// Recomputes loss_pct and limit_reached from a fresh balance reading.
    pub fn update_balance(&mut self, current_balance: Decimal, limit_pct: Decimal) {
        self.current_balance = current_balance;
        self.loss_pct = if self.starting_balance.is_zero() {
            Decimal::ZERO
        } else {
            (self.starting_balance - current_balance) / self.starting_balance * Decimal::from(100)
        };
        if self.loss_pct >= limit_pct {
            self.limit_reached = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn long_pnl_scales_with_leverage() {
        let mut pos = Position::open("BTCUSDT", "A", Direction::Long, dec!(1), dec!(100), 5, dec!(90), dec!(120), 0);
        pos.mark(dec!(110));
        assert_eq!(pos.unrealized_pnl, dec!(50)); // (110-100)*1*5
    }

    #[test]
    fn short_close_computes_realized_pnl_minus_fees() {
        let mut pos = Position::open("BTCUSDT", "A", Direction::Short, dec!(2), dec!(100), 1, dec!(110), dec!(80), 0);
        pos.close(dec!(90), "TAKE_PROFIT", dec!(1), 1000);
        // gross = (100-90)*2*1 = 20; realized = 20 - 1 = 19
        assert_eq!(pos.realized_pnl, dec!(19));
        assert_eq!(pos.status, PositionStatus::Closed);
    }

    #[test]
    fn order_status_rejects_regressive_transition() {
        let mut order = Order::new_market("BTCUSDT", OrderSide::Buy, dec!(1), Direction::Long, false);
        order.apply_transition(OrderStatus::Placed, Decimal::ZERO, None, None, 1);
        order.apply_transition(OrderStatus::Filled, dec!(1), Some(dec!(100)), None, 2);
        let changed = order.apply_transition(OrderStatus::Placed, Decimal::ZERO, None, None, 3);
        assert!(!changed);
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.status_history.len(), 3);
    }

    #[test]
    fn signal_directionality_rejects_inverted_long_stop() {
        let signal = Signal {
            id: Uuid::nil(),
            strategy_id: "A".into(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            entry: dec!(50000),
            stop: dec!(50100),
            take_profit: dec!(51000),
            size: dec!(1),
            confidence: 0.9,
            timestamp: 0,
            timeframe: Timeframe::M15,
            rationale: String::new(),
            risk_reward: 0.0,
        };
        assert!(!signal.is_directionally_valid());
    }
}
