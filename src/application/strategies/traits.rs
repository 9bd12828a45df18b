use crate::application::mtf_engine::IndicatorSnapshot;
use crate::domain::market::Candle;
use crate::domain::trading::Signal;
use rust_decimal::Decimal;

/// Indicator snapshot plus the backing candles for one timeframe, as seen by
/// a strategy generator.
#[derive(Debug, Clone, Default)]
pub struct TimeframeView {
    pub candles: Vec<Candle>,
    pub snapshot: IndicatorSnapshot,
}

/// Everything a strategy generator needs to evaluate one symbol (spec §4.7).
/// Populated by the orchestrator from the MTF engine's per-timeframe state.
pub struct AnalysisContext {
    pub symbol: String,
    pub m1: TimeframeView,
    pub m15: TimeframeView,
    pub h1: TimeframeView,
    pub current_price: Decimal,
    pub timestamp: i64,
}

/// A signal generator. Each invocation produces at most one candidate
/// (spec §4.7: "Three generators ... produce at most one Signal per
/// invocation").
pub trait TradingStrategy: Send + Sync {
    fn id(&self) -> &'static str;
    fn analyze(&self, ctx: &AnalysisContext) -> Option<Signal>;
}
