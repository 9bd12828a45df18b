//! ICT engine server - headless trading process.
//!
//! Metrics are pushed via structured JSON logs to stdout; no HTTP server,
//! no incoming connections.
//!
//! # Environment Variables
//! - `EXCHANGE_MODE` - "mock" or "binance" (default: mock)
//! - `OBSERVABILITY_INTERVAL` - Interval in seconds between metric outputs (default: 60)

use anyhow::Result;
use clap::Parser;
use ictengine::application::Orchestrator;
use ictengine::config::Config;
use ictengine::domain::ports::Exchange;
use ictengine::infrastructure::exchange::{BinanceFuturesExchange, MockExchange};
use ictengine::infrastructure::observability::{Metrics, MetricsReporter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "ictengine-server", about = "Headless ICT futures trading engine")]
struct Cli {
    /// Exchange adapter to use: "mock" or "binance".
    #[arg(long, default_value = "mock")]
    exchange: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();

    info!("ICT engine server {} starting", env!("CARGO_PKG_VERSION"));
    info!("Mode: HEADLESS (no UI, no HTTP server)");

    let config = Config::from_env()?;
    info!(workers = config.bus.worker_count, testnet = config.exchange.testnet, "configuration loaded");

    let exchange: Arc<dyn Exchange> = match cli.exchange.as_str() {
        "binance" => Arc::new(BinanceFuturesExchange::new(
            config.exchange.api_key.clone(),
            config.exchange.secret_key.clone(),
            config.exchange.base_url.clone(),
            config.exchange.ws_url.clone(),
        )),
        _ => Arc::new(MockExchange::new()),
    };

    let orchestrator = Arc::new(Orchestrator::build(config, exchange));
    orchestrator.start(chrono::Utc::now().timestamp_millis()).await?;
    info!("trading system running");

    let metrics = Metrics::new()?;
    let interval = std::env::var("OBSERVABILITY_INTERVAL").ok().and_then(|v| v.parse::<u64>().ok()).unwrap_or(60);
    let reporter = MetricsReporter::new(orchestrator.position_manager.clone(), metrics, interval);
    tokio::spawn(async move {
        reporter.run().await;
    });
    info!(interval, "metrics reporter started");

    info!("server running; press ctrl+c to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    orchestrator.stop(Duration::from_secs(30)).await;
    Ok(())
}
