pub mod bridge;
pub mod model;

pub use bridge::{status_bind_address, StatusBridge};
