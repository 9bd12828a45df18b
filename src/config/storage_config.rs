use crate::domain::market::Timeframe;
use anyhow::Context;
use std::env;
use std::str::FromStr;

/// Candle ring sizing and the active per-symbol timeframe set (spec §6
/// max_candles_per_storage, timeframes).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub max_candles_per_storage: usize,
    pub timeframes: Vec<Timeframe>,
}

impl StorageConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let max_candles_per_storage = env::var("MAX_CANDLES_PER_STORAGE")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<usize>()
            .context("failed to parse MAX_CANDLES_PER_STORAGE")?;
        anyhow::ensure!(max_candles_per_storage > 0, "MAX_CANDLES_PER_STORAGE must be > 0");

        let timeframes_str = env::var("TIMEFRAMES").unwrap_or_else(|_| "m1,m15,h1".to_string());
        let timeframes = timeframes_str
            .split(',')
            .map(|s| Timeframe::from_str(s.trim()))
            .collect::<Result<Vec<_>, _>>()
            .context("failed to parse TIMEFRAMES")?;

        Ok(Self { max_candles_per_storage, timeframes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_m1_m15_h1() {
        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.timeframes, vec![Timeframe::M1, Timeframe::M15, Timeframe::H1]);
    }
}
