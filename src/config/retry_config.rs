use anyhow::Context;
use std::env;
use std::time::Duration;

/// Pluggable retry policy selection (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategyKind {
    Fixed,
    Linear,
    Exponential,
    Custom,
}

impl std::str::FromStr for RetryStrategyKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" => Ok(RetryStrategyKind::Fixed),
            "linear" => Ok(RetryStrategyKind::Linear),
            "exponential" => Ok(RetryStrategyKind::Exponential),
            "custom" => Ok(RetryStrategyKind::Custom),
            _ => anyhow::bail!("invalid RETRY_STRATEGY: '{s}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryEnvConfig {
    pub strategy: RetryStrategyKind,
    pub max_retries_orders: u32,
    pub max_retries_other: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryEnvConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::str::FromStr;
        Ok(Self {
            strategy: RetryStrategyKind::from_str(&env::var("RETRY_STRATEGY").unwrap_or_else(|_| "custom".to_string()))?,
            max_retries_orders: parse_u32("MAX_RETRIES_ORDERS", 3)?,
            max_retries_other: parse_u32("MAX_RETRIES_OTHER", 5)?,
            base_delay: Duration::from_millis(parse_u64("RETRY_BASE_DELAY_MS", 1_000)?),
            max_delay: Duration::from_millis(parse_u64("RETRY_MAX_DELAY_MS", 30_000)?),
        })
    }
}

fn parse_u32(key: &str, default: u32) -> anyhow::Result<u32> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u32>().context(format!("failed to parse {key}"))
}

fn parse_u64(key: &str, default: u64) -> anyhow::Result<u64> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u64>().context(format!("failed to parse {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_custom_strategy_with_three_order_attempts() {
        let config = RetryEnvConfig::from_env().unwrap();
        assert_eq!(config.strategy, RetryStrategyKind::Custom);
        assert_eq!(config.max_retries_orders, 3);
        assert_eq!(config.max_retries_other, 5);
    }
}
