//! # ECS Runtime
//!
//! A single-threaded simulation core built around an Entity-Component-System.
//!
//! ## Features
//!
//! - **Entities**: Monotonic ids, tags and deferred (end-of-frame) removal
//! - **Components**: Open-ended string-keyed types with checked downcasts
//! - **Queries**: Cached multi-type membership queries, order independent
//! - **Systems**: Priority-ordered lifecycle hooks with fault isolation
//! - **Events**: Bounded re-entrant publish/subscribe plus a deferred queue
//! - **Game Loop**: Fixed-timestep driver with interpolated rendering
//!
//! ## Quick Start
//!
//! ```rust
//! use ecs_runtime::prelude::*;
//!
//! struct Gravity;
//!
//! impl System for Gravity {
//!     fn name(&self) -> &str {
//!         "gravity"
//!     }
//!
//!     fn update(&mut self, world: &mut World, delta_time: f32) -> Result<(), SystemError> {
//!         for entity in world.query(&[Velocity::TYPE]) {
//!             if let Some(velocity) = world.component_mut::<Velocity>(entity) {
//!                 velocity.linear.y -= 9.81 * delta_time;
//!             }
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut world = World::new();
//! world.register_system(Box::new(Gravity)).unwrap();
//! world.init();
//!
//! let rock = world.create_entity(Some("rock"));
//! world.insert_component(rock, Velocity::new(0.0, 0.0));
//! world.update(0.5);
//!
//! let velocity = world.component::<Velocity>(rock).unwrap();
//! assert!((velocity.linear.y + 4.905).abs() < 1e-4);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core runtime modules
pub mod config;
pub mod core;
pub mod foundation;

pub mod ecs;
pub mod events;
pub mod game_loop;

pub use game_loop::{GameLoop, LoopHandler, LoopState, LoopStats};

/// Common imports for runtime users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::config::{EventBusConfig, LoopConfig, RuntimeConfig},
        ecs::{
            components::{Transform, Velocity},
            systems::{MovementSystem, Teleport, TELEPORT_EVENT},
            Component, ComponentBundle, ComponentType, EntityId, SchedulerError, System, SystemError,
            World, WorldState,
        },
        events::{CustomEvent, EventKind, ListenerId, WorldEvent},
        foundation::time::Stopwatch,
        GameLoop, LoopHandler, LoopState,
    };
}
