use std::env;

/// Exchange connectivity configuration (spec §6 "testnet: bool — select exchange endpoints").
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub testnet: bool,
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub ws_url: String,
}

impl ExchangeConfig {
    pub fn from_env() -> Self {
        let testnet = parse_bool("EXCHANGE_TESTNET", true);
        let (base_url, ws_url) = if testnet {
            ("https://testnet.binancefuture.com".to_string(), "wss://stream.binancefuture.com".to_string())
        } else {
            ("https://fapi.binance.com".to_string(), "wss://fstream.binance.com".to_string())
        };
        Self {
            testnet,
            api_key: env::var("EXCHANGE_API_KEY").unwrap_or_default(),
            secret_key: env::var("EXCHANGE_SECRET_KEY").unwrap_or_default(),
            base_url: env::var("EXCHANGE_BASE_URL").unwrap_or(base_url),
            ws_url: env::var("EXCHANGE_WS_URL").unwrap_or(ws_url),
        }
    }
}

pub(crate) fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<bool>().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_testnet_endpoints() {
        let config = ExchangeConfig::from_env();
        assert!(config.base_url.contains("binance"));
    }
}
