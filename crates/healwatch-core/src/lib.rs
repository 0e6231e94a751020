pub mod config;
pub mod duration;
pub mod error;
pub mod service;

pub use config::{HealwatchConfig, MonitorSettings};
pub use duration::parse_duration;
pub use error::ConfigError;
pub use service::*;
