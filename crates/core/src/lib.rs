pub mod command;
pub mod config;
pub mod controller;
pub mod frame;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod types;

pub use command::{Command, CommandSlot};
pub use config::{BackendKind, Config};
pub use controller::KeyController;
pub use frame::FrameExchange;
pub use monitor::HealthMonitor;
