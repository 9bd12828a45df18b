//! Prometheus metrics for the trading engine.
//!
//! All metrics use the `ictengine_` prefix and are read-only outside this
//! module; the reporter (below) is the only consumer that pushes/logs them.

use prometheus::{
    core::{AtomicF64, GenericGauge, GenericGaugeVec},
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub candles_ingested_total: CounterVec,
    pub signals_generated_total: CounterVec,
    pub signals_rejected_total: CounterVec,
    pub orders_total: CounterVec,
    pub open_positions_count: GenericGauge<AtomicF64>,
    pub daily_pnl_usd: GenericGauge<AtomicF64>,
    pub event_bus_queue_depth: GenericGauge<AtomicF64>,
    pub emergency_liquidations_total: CounterVec,
    pub order_latency_seconds: HistogramVec,
    pub position_value_usd: GenericGaugeVec<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let candles_ingested_total = CounterVec::new(
            Opts::new("ictengine_candles_ingested_total", "Closed candles ingested by symbol and timeframe"),
            &["symbol", "timeframe"],
        )?;
        registry.register(Box::new(candles_ingested_total.clone()))?;

        let signals_generated_total = CounterVec::new(
            Opts::new("ictengine_signals_generated_total", "Signals generated per strategy"),
            &["strategy_id"],
        )?;
        registry.register(Box::new(signals_generated_total.clone()))?;

        let signals_rejected_total = CounterVec::new(
            Opts::new("ictengine_signals_rejected_total", "Signals rejected by the risk validator, by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(signals_rejected_total.clone()))?;

        let orders_total = CounterVec::new(Opts::new("ictengine_orders_total", "Orders placed by side and terminal status"), &["side", "status"])?;
        registry.register(Box::new(orders_total.clone()))?;

        let open_positions_count = Gauge::with_opts(Opts::new("ictengine_open_positions_count", "Number of open positions"))?;
        registry.register(Box::new(open_positions_count.clone()))?;

        let daily_pnl_usd = Gauge::with_opts(Opts::new("ictengine_daily_pnl_usd", "Realized + unrealized PnL for the current UTC day"))?;
        registry.register(Box::new(daily_pnl_usd.clone()))?;

        let event_bus_queue_depth = Gauge::with_opts(Opts::new("ictengine_event_bus_queue_depth", "Pending events in the priority queue"))?;
        registry.register(Box::new(event_bus_queue_depth.clone()))?;

        let emergency_liquidations_total = CounterVec::new(
            Opts::new("ictengine_emergency_liquidations_total", "Emergency liquidation invocations by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(emergency_liquidations_total.clone()))?;

        let order_latency_seconds = HistogramVec::new(
            HistogramOpts::new("ictengine_order_latency_seconds", "Exchange order round-trip latency"),
            &["order_type"],
        )?;
        registry.register(Box::new(order_latency_seconds.clone()))?;

        let position_value_usd = GaugeVec::new(Opts::new("ictengine_position_value_usd", "Notional value per open position"), &["symbol"])?;
        registry.register(Box::new(position_value_usd.clone()))?;

        Ok(Self {
            registry,
            candles_ingested_total,
            signals_generated_total,
            signals_rejected_total,
            orders_total,
            open_positions_count,
            daily_pnl_usd,
            event_bus_queue_depth,
            emergency_liquidations_total,
            order_latency_seconds,
            position_value_usd,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
