pub mod event_bus;
pub mod execution;
pub mod indicators;
pub mod market_data;
pub mod market_state_tracker;
pub mod mtf_engine;
pub mod orchestrator;
pub mod position;
pub mod risk;
pub mod signal_engine;
pub mod signal_pipeline;
pub mod strategies;

pub use event_bus::EventBus;
pub use mtf_engine::MtfEngine;
pub use orchestrator::Orchestrator;
pub use signal_engine::SignalEngine;
