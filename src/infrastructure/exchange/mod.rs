pub mod binance;
pub mod mock;

pub use binance::BinanceFuturesExchange;
pub use mock::MockExchange;
