//! # Core Runtime Module
//!
//! Shared configuration for the runtime subsystems.
//!
//! ## Organization
//!
//! - **Config**: Runtime configuration (event bus limits, loop timing, logging)

pub mod config;

pub use config::{EventBusConfig, LoopConfig, RuntimeConfig};
pub use crate::config::{Config, ConfigError};
