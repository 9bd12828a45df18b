use crate::application::risk::RiskConfig as ApplicationRiskConfig;
use anyhow::Context;
use rust_decimal::Decimal;
use std::env;

/// Risk policy environment inputs (spec §6 risk_per_trade_pct, leverage,
/// daily_loss_limit_pct, position_size_tolerance_pct, stop_distance_pct, risk_reward_ratio).
#[derive(Debug, Clone)]
pub struct RiskEnvConfig {
    pub risk_per_trade_pct: f64,
    pub leverage: u32,
    pub daily_loss_limit_pct: f64,
    pub position_size_tolerance_pct: f64,
    pub stop_distance_min_pct: f64,
    pub stop_distance_max_pct: f64,
    pub risk_reward_min: f64,
    pub risk_reward_max: f64,
}

impl RiskEnvConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            risk_per_trade_pct: parse_f64("RISK_PER_TRADE_PCT", 2.0)?,
            leverage: parse_u32("LEVERAGE", 5)?,
            daily_loss_limit_pct: parse_f64("DAILY_LOSS_LIMIT_PCT", 6.0)?,
            position_size_tolerance_pct: parse_f64("POSITION_SIZE_TOLERANCE_PCT", 5.0)?,
            stop_distance_min_pct: parse_f64("STOP_DISTANCE_MIN_PCT", 0.3)?,
            stop_distance_max_pct: parse_f64("STOP_DISTANCE_MAX_PCT", 3.0)?,
            risk_reward_min: parse_f64("RISK_REWARD_MIN", 1.5)?,
            risk_reward_max: parse_f64("RISK_REWARD_MAX", 5.0)?,
        })
    }

    pub fn to_application_config(&self) -> ApplicationRiskConfig {
        ApplicationRiskConfig {
            risk_per_trade_pct: self.risk_per_trade_pct,
            leverage: self.leverage,
            size_tolerance_pct: self.position_size_tolerance_pct / 100.0,
            min_size: Decimal::new(1, 3),
            max_size: Decimal::new(100, 0),
            stop_loss_min_pct: self.stop_distance_min_pct / 100.0,
            stop_loss_max_pct: self.stop_distance_max_pct / 100.0,
            rr_min: self.risk_reward_min,
            rr_max: self.risk_reward_max,
        }
    }
}

fn parse_f64(key: &str, default: f64) -> anyhow::Result<f64> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<f64>().context(format!("failed to parse {key}"))
}

fn parse_u32(key: &str, default: u32) -> anyhow::Result<u32> {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<u32>().context(format!("failed to parse {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = RiskEnvConfig::from_env().unwrap();
        assert_eq!(config.daily_loss_limit_pct, 6.0);
        assert_eq!(config.leverage, 5);
    }
}
