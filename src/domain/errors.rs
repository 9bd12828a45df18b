use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while ingesting or validating candle data.
#[derive(Debug, Error)]
pub enum CandleError {
    #[error("malformed candle for {symbol}: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("candle gap detected for {symbol} {timeframe}: expected open_time {expected}, got {actual}")]
    Gap {
        symbol: String,
        timeframe: String,
        expected: i64,
        actual: i64,
    },

    #[error("stale candle rejected for {symbol} {timeframe}: open_time {open_time} <= tail {tail}")]
    Stale {
        symbol: String,
        timeframe: String,
        open_time: i64,
        tail: i64,
    },
}

/// Errors surfaced by the risk validator (spec §4.9).
#[derive(Debug, Error)]
pub enum RiskViolation {
    #[error("position size {proposed_pct:.2}% exceeds per-symbol cap {max_pct:.2}%")]
    PositionSizeLimit { proposed_pct: f64, max_pct: f64 },

    #[error("daily loss limit breached: {loss_pct:.2}% >= {limit_pct:.2}%")]
    DailyLossLimit { loss_pct: f64, limit_pct: f64 },

    #[error("max concurrent positions reached: {count} >= {max}")]
    MaxConcurrentPositions { count: usize, max: usize },

    #[error("risk/reward {actual:.2} below minimum {min:.2}")]
    InsufficientRiskReward { actual: f64, min: f64 },

    #[error("signal stop is not on the correct side of entry for {symbol}")]
    InvalidDirectionality { symbol: String },

    #[error("insufficient available margin: need {need}, available {available}")]
    InsufficientMargin { need: Decimal, available: Decimal },

    #[error("symbol {symbol} already has an open position")]
    DuplicateExposure { symbol: String },
}

/// Errors raised while placing, tracking, or cancelling orders.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("exchange rejected order for {symbol}: {reason}")]
    Rejected { symbol: String, reason: String },

    #[error("order {client_id} timed out waiting for exchange acknowledgement")]
    AckTimeout { client_id: uuid::Uuid },

    #[error("order {client_id} exceeded retry budget ({attempts} attempts)")]
    RetryBudgetExceeded { client_id: uuid::Uuid, attempts: u32 },

    #[error("order {client_id} not found on exchange")]
    NotFound { client_id: uuid::Uuid },
}

/// Errors from the exchange adapter boundary.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("connection lost: {reason}")]
    ConnectionLost { reason: String },

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("exchange request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },

    #[error("exchange clock skew {skew_ms}ms exceeds tolerance")]
    ClockSkew { skew_ms: i64 },
}

/// Top-level orchestrator errors, wrapping subsystem errors for logging
/// and graceful-shutdown decisions.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Candle(#[from] CandleError),

    #[error(transparent)]
    Risk(#[from] RiskViolation),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("configuration error: {0}")]
    Configuration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_violation_formats_with_percentages() {
        let violation = RiskViolation::DailyLossLimit {
            loss_pct: 5.25,
            limit_pct: 5.0,
        };
        let msg = violation.to_string();
        assert!(msg.contains("5.25%"));
        assert!(msg.contains("5.00%"));
    }
}
