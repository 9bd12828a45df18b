pub mod breaker_block;
pub mod candle;
pub mod candle_ring;
pub mod fair_value_gap;
pub mod liquidity;
pub mod market_state;
pub mod market_structure;
pub mod order_block;
pub mod swing;
pub mod timeframe;
pub mod trend;

pub use breaker_block::BreakerBlock;
pub use candle::Candle;
pub use candle_ring::{CandleRing, RingWriteOutcome};
pub use fair_value_gap::FairValueGap;
pub use liquidity::{LiquidityLevel, LiquiditySide, LiquidityState, LiquiditySweep, SweepDirection, SweepPhase};
pub use market_state::{MarketState, MarketStateKind};
pub use market_structure::{BmsKind, BmsState, BreakOfMarketStructure};
pub use order_block::{OrderBlock, OrderBlockKind};
pub use swing::{SwingKind, SwingPoint};
pub use timeframe::Timeframe;
pub use trend::{TrendDirection, TrendPattern, TrendState, TrendStrengthLevel, TrendStructure};
