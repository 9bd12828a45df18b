use crate::domain::errors::ExchangeError;
use std::time::Duration;

/// How an error should be handled by the retry loop (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Retryable,
    NonRetryable,
    /// Timestamp/recvWindow drift: resync server time, then retry.
    Special,
}

/// Classifies an exchange error for the retry policy.
pub fn classify(error: &ExchangeError) -> ErrorClass {
    match error {
        ExchangeError::ConnectionLost { .. } | ExchangeError::RateLimitExceeded { .. } => ErrorClass::Retryable,
        ExchangeError::ClockSkew { .. } => ErrorClass::Special,
        ExchangeError::RequestFailed { status, .. } => {
            if *status >= 500 || *status == 429 {
                ErrorClass::Retryable
            } else {
                ErrorClass::NonRetryable
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum RetryStrategy {
    Fixed(Duration),
    Linear { base: Duration },
    Exponential { base: Duration, cap: Duration },
    Custom(Vec<Duration>),
}

impl RetryStrategy {
    /// spec §4.10 default for order operations: fixed backoff schedule.
    pub fn custom_order_default() -> Self {
        RetryStrategy::Custom(vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(5)])
    }

    /// spec §4.10 default for non-order operations.
    pub fn exponential_default() -> Self {
        RetryStrategy::Exponential { base: Duration::from_secs(1), cap: Duration::from_secs(30) }
    }

    /// `attempt` is 1-based.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::Fixed(d) => *d,
            RetryStrategy::Linear { base } => *base * attempt,
            RetryStrategy::Exponential { base, cap } => {
                let scaled = base.saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
                scaled.min(*cap)
            }
            RetryStrategy::Custom(schedule) => schedule
                .get((attempt.saturating_sub(1)) as usize)
                .copied()
                .or_else(|| schedule.last().copied())
                .unwrap_or(Duration::from_secs(1)),
        }
    }
}

/// One recorded retry attempt (spec §4.10: "attempt#, exception-type, delay, timestamp").
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    pub attempt: u32,
    pub exception_type: String,
    pub delay: Duration,
    pub timestamp: i64,
}

pub struct RetryManager {
    strategy: RetryStrategy,
    max_attempts: u32,
}

impl RetryManager {
    pub fn new(strategy: RetryStrategy, max_attempts: u32) -> Self {
        Self { strategy, max_attempts }
    }

    /// Max 3 attempts for order operations (spec §4.10).
    pub fn for_orders() -> Self {
        Self::new(RetryStrategy::custom_order_default(), 3)
    }

    /// Max 5 attempts for other exchange operations.
    pub fn for_other_operations() -> Self {
        Self::new(RetryStrategy::exponential_default(), 5)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn should_retry(&self, class: ErrorClass, attempt: u32) -> bool {
        matches!(class, ErrorClass::Retryable | ErrorClass::Special) && attempt < self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.strategy.delay_for(attempt)
    }
}
