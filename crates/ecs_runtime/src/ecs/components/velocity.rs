//! Velocity component

use std::f32::consts::TAU;

use nalgebra::Vector2;

use crate::ecs::component::{Component, ComponentType};

/// Linear and angular velocity with limits and drag
#[derive(Debug, Clone, PartialEq)]
pub struct Velocity {
    /// Units per second
    pub linear: Vector2<f32>,
    /// Radians per second
    pub angular: f32,
    /// Linear speed cap
    pub max_speed: f32,
    /// Angular speed cap
    pub max_angular_speed: f32,
    /// Fraction of linear velocity lost per second
    pub drag: f32,
    /// Fraction of angular velocity lost per second
    pub angular_drag: f32,
}

impl Component for Velocity {
    const TYPE: ComponentType = ComponentType::from_static("Velocity");
}

impl Default for Velocity {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl Velocity {
    /// Velocity with default limits and no drag
    pub fn new(vx: f32, vy: f32) -> Self {
        Self {
            linear: Vector2::new(vx, vy),
            angular: 0.0,
            max_speed: 1000.0,
            max_angular_speed: TAU,
            drag: 0.0,
            angular_drag: 0.0,
        }
    }

    /// Set angular velocity (builder pattern)
    pub fn with_angular(mut self, angular: f32) -> Self {
        self.angular = angular;
        self
    }

    /// Set linear and angular drag (builder pattern)
    pub fn with_drag(mut self, drag: f32, angular_drag: f32) -> Self {
        self.drag = drag;
        self.angular_drag = angular_drag;
        self
    }

    /// Set the linear speed cap (builder pattern)
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Current linear speed
    pub fn speed(&self) -> f32 {
        self.linear.norm()
    }
}
