//! Transform component
//!
//! Planar pose of an entity. The previous pose is kept alongside the current
//! one so render hooks can interpolate between the last two fixed updates.

use nalgebra::Vector2;

use crate::ecs::component::{Component, ComponentType};

/// 2D position, rotation and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// World space position
    pub position: Vector2<f32>,

    /// Rotation in radians, normalised to `[0, 2π)` by movement
    pub rotation: f32,

    /// Per-axis scale
    pub scale: Vector2<f32>,

    /// Position at the start of the last fixed update
    pub prev_position: Vector2<f32>,

    /// Rotation at the start of the last fixed update
    pub prev_rotation: f32,
}

impl Component for Transform {
    const TYPE: ComponentType = ComponentType::from_static("Transform");
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(0.0, 0.0)
    }
}

impl Transform {
    /// Transform at a position with no rotation and unit scale
    pub fn at(x: f32, y: f32) -> Self {
        let position = Vector2::new(x, y);
        Self {
            position,
            rotation: 0.0,
            scale: Vector2::new(1.0, 1.0),
            prev_position: position,
            prev_rotation: 0.0,
        }
    }

    /// Set the rotation (builder pattern)
    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self.prev_rotation = rotation;
        self
    }

    /// Move instantly, without leaving an interpolation trail
    pub fn teleport(&mut self, position: Vector2<f32>, rotation: Option<f32>) {
        self.position = position;
        self.prev_position = position;
        if let Some(rotation) = rotation {
            self.rotation = rotation;
            self.prev_rotation = rotation;
        }
    }

    /// Pose blended between the previous and current update
    pub fn interpolated(&self, alpha: f32) -> (Vector2<f32>, f32) {
        let position = self.prev_position.lerp(&self.position, alpha);
        let rotation = self.prev_rotation + (self.rotation - self.prev_rotation) * alpha;
        (position, rotation)
    }
}
