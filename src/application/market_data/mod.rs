pub mod candle_store;
pub mod historical_loader;
pub mod realtime_processor;
pub mod symbol_manager;

pub use candle_store::CandleStore;
pub use historical_loader::HistoricalLoader;
pub use realtime_processor::RealtimeProcessor;
pub use symbol_manager::{AddMode, SymbolConfig, SymbolManager};
