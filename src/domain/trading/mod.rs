pub mod types;

pub use types::{
    Direction, Order, OrderSide, OrderStatus, OrderStatusHistoryEntry, OrderType, Position,
    PositionStatus, SessionLoss, Signal, TimeInForce,
};
