//! Configuration for the trading engine.
//!
//! Structured loading from environment variables, organized by concern:
//! exchange connectivity, event bus sizing, candle storage, risk policy,
//! retry policy, and per-strategy toggles.

mod bus_config;
mod exchange_config;
mod retry_config;
mod risk_config;
mod storage_config;
mod strategy_config;

pub use bus_config::BusConfig;
pub use exchange_config::ExchangeConfig;
pub use retry_config::{RetryEnvConfig, RetryStrategyKind};
pub use risk_config::RiskEnvConfig;
pub use storage_config::StorageConfig;
pub use strategy_config::{StrategyEnvConfig, StrategyToggle};

use anyhow::Context;
use std::env;

/// Aggregated process configuration, composed from the sub-config modules.
#[derive(Debug, Clone)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub bus: BusConfig,
    pub storage: StorageConfig,
    pub risk: RiskEnvConfig,
    pub retry: RetryEnvConfig,
    pub strategy: StrategyEnvConfig,
    pub emergency_liquidation_enabled: bool,
    pub position_sync_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables, composing each
    /// sub-config in turn.
    pub fn from_env() -> anyhow::Result<Self> {
        let exchange = ExchangeConfig::from_env();
        let bus = BusConfig::from_env().context("failed to load event bus config")?;
        let storage = StorageConfig::from_env().context("failed to load storage config")?;
        let risk = RiskEnvConfig::from_env().context("failed to load risk config")?;
        let retry = RetryEnvConfig::from_env().context("failed to load retry config")?;
        let strategy = StrategyEnvConfig::from_env().context("failed to load strategy config")?;

        let emergency_liquidation_enabled = env::var("EMERGENCY_LIQUIDATION_ENABLED")
            .map(|v| v.parse::<bool>().unwrap_or(true))
            .unwrap_or(true);
        let position_sync_interval_secs = env::var("POSITION_SYNC_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);

        Ok(Self {
            exchange,
            bus,
            storage,
            risk,
            retry,
            strategy,
            emergency_liquidation_enabled,
            position_sync_interval_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_all_sub_configs_with_defaults() {
        let config = Config::from_env().expect("should parse with defaults");
        assert_eq!(config.bus.worker_count, 3);
        assert_eq!(config.position_sync_interval_secs, 60);
        assert!(config.emergency_liquidation_enabled);
    }
}
