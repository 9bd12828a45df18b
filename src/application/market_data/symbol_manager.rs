use crate::domain::market::Timeframe;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct SymbolConfig {
    pub symbol: String,
    pub timeframes: Vec<Timeframe>,
    pub enabled: bool,
    pub added_at: DateTime<Utc>,
}

/// Strategy for reconciling timeframes when a symbol is re-added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    Merge,
    Replace,
}

/// Owns per-symbol configuration (spec §4.2's multi-symbol manager). Symbol
/// keys are canonicalised to uppercase so lookups are case-insensitive.
pub struct SymbolManager {
    configs: RwLock<HashMap<String, SymbolConfig>>,
}

impl SymbolManager {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_symbol(&self, symbol: &str, timeframes: Vec<Timeframe>, mode: AddMode) {
        let key = symbol.to_uppercase();
        let mut configs = self.configs.write().await;
        match (configs.get_mut(&key), mode) {
            (Some(existing), AddMode::Merge) => {
                for tf in timeframes {
                    if !existing.timeframes.contains(&tf) {
                        existing.timeframes.push(tf);
                    }
                }
            }
            _ => {
                configs.insert(
                    key.clone(),
                    SymbolConfig {
                        symbol: key,
                        timeframes,
                        enabled: true,
                        added_at: Utc::now(),
                    },
                );
            }
        }
    }

    pub async fn remove_symbol(&self, symbol: &str) -> Option<SymbolConfig> {
        self.configs.write().await.remove(&symbol.to_uppercase())
    }

    pub async fn list(&self) -> Vec<SymbolConfig> {
        self.configs.read().await.values().cloned().collect()
    }

    pub async fn get_config(&self, symbol: &str) -> Option<SymbolConfig> {
        self.configs.read().await.get(&symbol.to_uppercase()).cloned()
    }
}

impl Default for SymbolManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_symbol_is_case_insensitive() {
        let manager = SymbolManager::new();
        manager.add_symbol("btcusdt", vec![Timeframe::M1], AddMode::Replace).await;
        assert!(manager.get_config("BTCUSDT").await.is_some());
    }

    #[tokio::test]
    async fn merge_mode_adds_new_timeframes_without_duplicating() {
        let manager = SymbolManager::new();
        manager.add_symbol("BTCUSDT", vec![Timeframe::M1], AddMode::Replace).await;
        manager
            .add_symbol("BTCUSDT", vec![Timeframe::M1, Timeframe::H1], AddMode::Merge)
            .await;
        let config = manager.get_config("BTCUSDT").await.unwrap();
        assert_eq!(config.timeframes.len(), 2);
    }
}
