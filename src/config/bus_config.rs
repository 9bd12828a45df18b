use std::env;

/// Event Bus sizing (spec §6 worker_count, max_queue_size; §5 default 3 workers).
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub worker_count: usize,
    pub max_queue_size: usize,
}

impl BusConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let worker_count = parse_usize("EVENT_BUS_WORKER_COUNT", 3)?.max(1);
        let max_queue_size = parse_usize("EVENT_BUS_MAX_QUEUE_SIZE", 10_000)?;
        anyhow::ensure!(max_queue_size > 0, "EVENT_BUS_MAX_QUEUE_SIZE must be > 0");
        Ok(Self { worker_count, max_queue_size })
    }
}

fn parse_usize(key: &str, default: usize) -> anyhow::Result<usize> {
    use anyhow::Context;
    env::var(key).unwrap_or_else(|_| default.to_string()).parse::<usize>().context(format!("failed to parse {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_three_workers() {
        let config = BusConfig::from_env().unwrap();
        assert_eq!(config.worker_count, 3);
        assert_eq!(config.max_queue_size, 10_000);
    }
}
