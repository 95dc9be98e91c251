//! Foundation module - Core utilities shared by every runtime subsystem
//!
//! - Logging bootstrap
//! - Time measurement for frame and hook profiling
//! - Fault containment for hooks and listeners

pub mod fault;
pub mod logging;
pub mod time;
