//! Movement system
//!
//! Integrates every entity holding both a [`Transform`] and a [`Velocity`]:
//! drag, speed limits, position and rotation, in that order. Also answers
//! `entity:teleport` custom events carrying a [`Teleport`] payload.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::f32::consts::TAU;
use std::rc::Rc;

use nalgebra::Vector2;

use crate::ecs::component::Component;
use crate::ecs::components::{Transform, Velocity};
use crate::ecs::system::{System, SystemError};
use crate::ecs::{EntityId, World};
use crate::events::{EventKind, ListenerId, WorldEvent};

/// Custom event name handled by [`MovementSystem`]
pub const TELEPORT_EVENT: &str = "entity:teleport";

/// Below this speed drag stops an entity completely
const MIN_SPEED: f32 = 0.01;

/// Below this angular speed angular drag stops rotation completely
const MIN_ANGULAR_SPEED: f32 = 0.001;

/// Payload of an `entity:teleport` event
#[derive(Debug, Clone, PartialEq)]
pub struct Teleport {
    /// Entity to move
    pub entity: EntityId,
    /// Destination
    pub position: Vector2<f32>,
    /// New rotation, if it should change
    pub rotation: Option<f32>,
}

/// Kinematic integration for `Transform` + `Velocity` entities
pub struct MovementSystem {
    listener: Option<ListenerId>,
    entities_processed: usize,
    teleports: Rc<Cell<u64>>,
}

impl MovementSystem {
    /// Registration name
    pub const NAME: &'static str = "MovementSystem";

    /// Default priority; runs after input and AI, before collision
    pub const PRIORITY: i32 = 80;

    /// Create a new movement system
    pub fn new() -> Self {
        Self {
            listener: None,
            entities_processed: 0,
            teleports: Rc::new(Cell::new(0)),
        }
    }

    fn integrate(transform: &mut Transform, velocity: &mut Velocity, delta_time: f32) {
        transform.prev_position = transform.position;
        transform.prev_rotation = transform.rotation;

        if velocity.drag > 0.0 {
            velocity.linear *= 1.0 - velocity.drag * delta_time;
            if velocity.speed() < MIN_SPEED {
                velocity.linear = Vector2::zeros();
            }
        }

        let speed = velocity.speed();
        if speed > velocity.max_speed {
            velocity.linear *= velocity.max_speed / speed;
        }

        transform.position += velocity.linear * delta_time;

        if velocity.angular_drag > 0.0 {
            velocity.angular *= 1.0 - velocity.angular_drag * delta_time;
            if velocity.angular.abs() < MIN_ANGULAR_SPEED {
                velocity.angular = 0.0;
            }
        }
        velocity.angular = velocity
            .angular
            .clamp(-velocity.max_angular_speed, velocity.max_angular_speed);

        transform.rotation = normalize_angle(transform.rotation + velocity.angular * delta_time);
    }

    fn handle_teleport(world: &mut World, event: &WorldEvent, teleports: &Cell<u64>) {
        let Some(teleport) = event.as_custom().and_then(|custom| custom.payload::<Teleport>()) else {
            log::warn!("'{}' event without a teleport payload", TELEPORT_EVENT);
            return;
        };

        let Some(transform) = world.component_mut::<Transform>(teleport.entity) else {
            return;
        };
        transform.teleport(teleport.position, teleport.rotation);
        teleports.set(teleports.get() + 1);

        log::debug!(
            "Teleported entity {} to ({}, {})",
            teleport.entity,
            teleport.position.x,
            teleport.position.y
        );
    }
}

impl Default for MovementSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for MovementSystem {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn init(&mut self, world: &mut World) -> Result<(), SystemError> {
        // Re-initialisation must not stack a second listener
        if let Some(listener) = self.listener.take() {
            world.off(listener);
        }

        let teleports = Rc::clone(&self.teleports);
        let listener = world.on(EventKind::custom(TELEPORT_EVENT), move |world, event| {
            Self::handle_teleport(world, event, &teleports);
        });
        self.listener = Some(listener);
        Ok(())
    }

    fn update(&mut self, world: &mut World, delta_time: f32) -> Result<(), SystemError> {
        let entities = world.query(&[Transform::TYPE, Velocity::TYPE]);
        self.entities_processed = 0;

        for entity in entities {
            let Some(mut velocity) = world.component::<Velocity>(entity).cloned() else {
                continue;
            };
            let Some(transform) = world.component_mut::<Transform>(entity) else {
                continue;
            };
            Self::integrate(transform, &mut velocity, delta_time);
            if let Some(stored) = world.component_mut::<Velocity>(entity) {
                *stored = velocity;
            }
            self.entities_processed += 1;
        }
        Ok(())
    }

    fn destroy(&mut self, world: &mut World) -> Result<(), SystemError> {
        if let Some(listener) = self.listener.take() {
            world.off(listener);
        }
        Ok(())
    }

    fn stats(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("entities_processed".to_string(), self.entities_processed as f64),
            ("teleports".to_string(), self.teleports.get() as f64),
        ])
    }
}

/// Wrap an angle into `[0, 2π)`
fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU {
        0.0
    } else {
        wrapped
    }
}
