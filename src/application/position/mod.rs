pub mod emergency_manager;
pub mod position_manager;
pub mod position_monitor;

pub use emergency_manager::{EmergencyManager, SystemStatus};
pub use position_manager::PositionManager;
pub use position_monitor::{PositionMonitor, ReconcileOutcome};
