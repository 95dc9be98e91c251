//! Built-in components

pub mod transform;
pub mod velocity;

pub use transform::Transform;
pub use velocity::Velocity;
