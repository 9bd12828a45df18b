pub mod daily_loss_monitor;
pub mod risk_validator;

pub use daily_loss_monitor::DailyLossMonitor;
pub use risk_validator::{RiskConfig, RiskValidator};
