// src/config/mod.rs
pub mod monitor;

pub use monitor::{default_feed_url, MonitorConfig, ENV_CONFIG_PATH};
