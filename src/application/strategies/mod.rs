pub mod strategy_a_conservative;
pub mod strategy_b_aggressive;
pub mod strategy_c_hybrid;
pub mod traits;

pub use strategy_a_conservative::ConservativeStrategy;
pub use strategy_b_aggressive::AggressiveStrategy;
pub use strategy_c_hybrid::HybridStrategy;
pub use traits::{AnalysisContext, TimeframeView, TradingStrategy};
