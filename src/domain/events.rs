use crate::domain::market::{
    BreakOfMarketStructure, FairValueGap, LiquiditySweep, MarketState, OrderBlock, Timeframe,
};
use crate::domain::trading::{Direction, Order, Position, Signal};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Every event the orchestrator's bus can carry (spec §4.1). Variants are
/// ordered roughly by pipeline stage, not by priority -- priority is assigned
/// separately by `TradingEvent::default_priority`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TradingEvent {
    CandleReceived {
        symbol: String,
        timeframe: Timeframe,
        timestamp: i64,
    },
    CandleClosed {
        symbol: String,
        timeframe: Timeframe,
        timestamp: i64,
    },
    IndicatorsUpdated {
        symbol: String,
        timeframe: Timeframe,
        order_blocks: usize,
        fair_value_gaps: usize,
    },
    OrderBlockDetected {
        symbol: String,
        timeframe: Timeframe,
        order_block: OrderBlock,
    },
    FairValueGapDetected {
        symbol: String,
        timeframe: Timeframe,
        fvg: FairValueGap,
    },
    LiquiditySweepDetected {
        symbol: String,
        timeframe: Timeframe,
        sweep: LiquiditySweep,
    },
    MarketStructureBreak {
        symbol: String,
        timeframe: Timeframe,
        bms: BreakOfMarketStructure,
    },
    MarketStateChanged {
        symbol: String,
        previous: Option<MarketState>,
        current: MarketState,
    },
    SignalGenerated {
        signal: Signal,
    },
    SignalRejected {
        strategy_id: String,
        symbol: String,
        reason: String,
    },
    RiskCheckPassed {
        signal_id: uuid::Uuid,
        symbol: String,
    },
    RiskCheckFailed {
        signal_id: uuid::Uuid,
        symbol: String,
        reason: String,
    },
    DailyLossLimitReached {
        loss_pct: Decimal,
    },
    OrderPlaced {
        order: Order,
    },
    OrderFilled {
        order: Order,
    },
    OrderCancelled {
        client_id: uuid::Uuid,
        reason: String,
    },
    OrderFailed {
        client_id: uuid::Uuid,
        symbol: String,
        reason: String,
    },
    PositionOpened {
        position: Position,
    },
    PositionUpdated {
        position: Position,
    },
    PositionClosed {
        position: Position,
    },
    EmergencyLiquidation {
        symbol: String,
        direction: Direction,
        reason: String,
    },
    ExchangeError {
        context: String,
        message: String,
    },
    SystemStart {
        timestamp: i64,
    },
    SystemStop {
        reason: String,
    },
}

impl TradingEvent {
    /// Lower value = more urgent. Mirrors spec §4.1's ordering: risk/safety
    /// events preempt execution events, which preempt market-data events.
    pub fn default_priority(&self) -> u8 {
        match self {
            TradingEvent::EmergencyLiquidation { .. } => 0,
            TradingEvent::DailyLossLimitReached { .. } => 0,
            TradingEvent::RiskCheckFailed { .. } => 1,
            TradingEvent::OrderFailed { .. } => 1,
            TradingEvent::ExchangeError { .. } => 1,
            TradingEvent::OrderPlaced { .. }
            | TradingEvent::OrderFilled { .. }
            | TradingEvent::OrderCancelled { .. } => 2,
            TradingEvent::PositionOpened { .. }
            | TradingEvent::PositionUpdated { .. }
            | TradingEvent::PositionClosed { .. } => 2,
            TradingEvent::SignalGenerated { .. } | TradingEvent::RiskCheckPassed { .. } => 3,
            TradingEvent::SignalRejected { .. } => 4,
            TradingEvent::MarketStructureBreak { .. } | TradingEvent::MarketStateChanged { .. } => 4,
            TradingEvent::LiquiditySweepDetected { .. } => 4,
            TradingEvent::OrderBlockDetected { .. } | TradingEvent::FairValueGapDetected { .. } => 5,
            TradingEvent::IndicatorsUpdated { .. } => 5,
            TradingEvent::CandleClosed { .. } => 6,
            TradingEvent::CandleReceived { .. } => 7,
            TradingEvent::SystemStart { .. } | TradingEvent::SystemStop { .. } => 0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TradingEvent::CandleReceived { .. } => "CANDLE_RECEIVED",
            TradingEvent::CandleClosed { .. } => "CANDLE_CLOSED",
            TradingEvent::IndicatorsUpdated { .. } => "INDICATORS_UPDATED",
            TradingEvent::OrderBlockDetected { .. } => "ORDER_BLOCK_DETECTED",
            TradingEvent::FairValueGapDetected { .. } => "FAIR_VALUE_GAP_DETECTED",
            TradingEvent::LiquiditySweepDetected { .. } => "LIQUIDITY_SWEEP_DETECTED",
            TradingEvent::MarketStructureBreak { .. } => "MARKET_STRUCTURE_BREAK",
            TradingEvent::MarketStateChanged { .. } => "MARKET_STATE_CHANGED",
            TradingEvent::SignalGenerated { .. } => "SIGNAL_GENERATED",
            TradingEvent::SignalRejected { .. } => "SIGNAL_REJECTED",
            TradingEvent::RiskCheckPassed { .. } => "RISK_CHECK_PASSED",
            TradingEvent::RiskCheckFailed { .. } => "RISK_CHECK_FAILED",
            TradingEvent::DailyLossLimitReached { .. } => "DAILY_LOSS_LIMIT_REACHED",
            TradingEvent::OrderPlaced { .. } => "ORDER_PLACED",
            TradingEvent::OrderFilled { .. } => "ORDER_FILLED",
            TradingEvent::OrderCancelled { .. } => "ORDER_CANCELLED",
            TradingEvent::OrderFailed { .. } => "ORDER_FAILED",
            TradingEvent::PositionOpened { .. } => "POSITION_OPENED",
            TradingEvent::PositionUpdated { .. } => "POSITION_UPDATED",
            TradingEvent::PositionClosed { .. } => "POSITION_CLOSED",
            TradingEvent::EmergencyLiquidation { .. } => "EMERGENCY_LIQUIDATION",
            TradingEvent::ExchangeError { .. } => "EXCHANGE_ERROR",
            TradingEvent::SystemStart { .. } => "SYSTEM_START",
            TradingEvent::SystemStop { .. } => "SYSTEM_STOP",
        }
    }
}

/// Async event handler. Object-safe so the bus can hold a heterogeneous set
/// of subscribers behind `Arc<dyn EventHandler>`.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &TradingEvent);

    /// Called by the bus worker when `handle` panics or a subscribed handler
    /// wants custom error reporting; default just logs.
    fn on_error(&self, event: &TradingEvent, error: &str) {
        tracing::error!(event = event.name(), %error, "event handler failed");
    }
}

/// No-op handler used in tests and as a fallback subscriber.
pub struct LoggingHandler;

#[async_trait]
impl EventHandler for LoggingHandler {
    async fn handle(&self, event: &TradingEvent) {
        tracing::debug!(event = event.name(), "event received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_liquidation_is_highest_priority() {
        let event = TradingEvent::EmergencyLiquidation {
            symbol: "BTCUSDT".into(),
            direction: Direction::Long,
            reason: "stop loss".into(),
        };
        assert_eq!(event.default_priority(), 0);
    }

    #[test]
    fn candle_received_is_lowest_priority() {
        let event = TradingEvent::CandleReceived {
            symbol: "BTCUSDT".into(),
            timeframe: Timeframe::M1,
            timestamp: 0,
        };
        assert_eq!(event.default_priority(), 7);
    }
}
