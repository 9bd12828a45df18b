use std::collections::HashMap;
use std::env;

/// Per-strategy enable/override toggles (spec §6 `strategy[<id>]: {enabled, min_confidence, max_positions, …}`).
#[derive(Debug, Clone)]
pub struct StrategyToggle {
    pub enabled: bool,
    pub min_confidence: Option<f64>,
    pub max_positions: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct StrategyEnvConfig {
    pub toggles: HashMap<String, StrategyToggle>,
}

const KNOWN_STRATEGIES: &[&str] = &["strategy_a_conservative", "strategy_b_aggressive", "strategy_c_hybrid"];

impl StrategyEnvConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mut toggles = HashMap::new();
        for id in KNOWN_STRATEGIES {
            let prefix = id.to_uppercase();
            let enabled = env::var(format!("STRATEGY_{prefix}_ENABLED"))
                .map(|v| v.parse::<bool>().unwrap_or(true))
                .unwrap_or(true);
            let min_confidence = env::var(format!("STRATEGY_{prefix}_MIN_CONFIDENCE")).ok().and_then(|v| v.parse::<f64>().ok());
            let max_positions = env::var(format!("STRATEGY_{prefix}_MAX_POSITIONS")).ok().and_then(|v| v.parse::<usize>().ok());
            toggles.insert(id.to_string(), StrategyToggle { enabled, min_confidence, max_positions });
        }
        Ok(Self { toggles })
    }

    pub fn is_enabled(&self, strategy_id: &str) -> bool {
        self.toggles.get(strategy_id).map(|t| t.enabled).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_strategies_enabled_by_default() {
        let config = StrategyEnvConfig::from_env().unwrap();
        assert!(config.is_enabled("strategy_a_conservative"));
        assert!(config.is_enabled("strategy_b_aggressive"));
    }
}
