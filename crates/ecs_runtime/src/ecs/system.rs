//! System trait and lifecycle errors

use std::collections::BTreeMap;

use thiserror::Error;

use super::world::World;

/// Failure reported by a system hook
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The hook returned an error
    #[error("{0}")]
    Failed(String),

    /// The hook panicked; the payload message is kept
    #[error("panicked: {0}")]
    Panicked(String),
}

impl SystemError {
    /// Create a generic failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Unit of behavior driven by the scheduler
///
/// Every hook receives the world and may freely create or destroy entities,
/// change components and emit events. All hooks but `name` have defaults, so
/// a system implements only what it needs. Failures and panics are contained
/// by the scheduler and never stop sibling systems.
pub trait System: 'static {
    /// Unique registration name
    fn name(&self) -> &str;

    /// Execution priority; higher runs first
    fn priority(&self) -> i32 {
        0
    }

    /// Called once the world is initialised (or at registration afterwards)
    fn init(&mut self, _world: &mut World) -> Result<(), SystemError> {
        Ok(())
    }

    /// Advance simulation by `delta_time` seconds
    fn update(&mut self, _world: &mut World, _delta_time: f32) -> Result<(), SystemError> {
        Ok(())
    }

    /// Produce output for the current frame, `interpolation` in `[0, 1]`
    fn render(&mut self, _world: &mut World, _interpolation: f32) -> Result<(), SystemError> {
        Ok(())
    }

    /// Release resources; called on unregistration and world teardown
    fn destroy(&mut self, _world: &mut World) -> Result<(), SystemError> {
        Ok(())
    }

    /// System-specific counters merged into scheduler statistics
    fn stats(&self) -> BTreeMap<String, f64> {
        BTreeMap::new()
    }
}
