//! Entity-Component-System implementation
//!
//! Entities are plain ids, components are open-ended records keyed by a
//! string type, systems are priority-ordered units of per-frame behavior.
//! [`World`] composes everything and is the only type simulation code needs.

pub mod component;
pub mod components;
pub mod entity;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod system;
pub mod systems;
pub mod world;

#[cfg(test)]
mod tests;

pub use component::{canonical_query_key, Component, ComponentBundle, ComponentEntry, ComponentType};
pub use entity::{Entity, EntityId};
pub use registry::{EntityRegistry, RegistryStats};
pub use scheduler::{SchedulerError, SystemScheduler, SystemStats};
pub use storage::{ComponentStats, ComponentStore};
pub use system::{System, SystemError};
pub use world::{World, WorldState, WorldStats};
