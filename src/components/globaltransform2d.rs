//! Computed stage-space transform for entities in a hierarchy.
//!
//! When an entity has a [`ChildOf`](bevy_ecs::hierarchy::ChildOf) parent, its
//! [`Position`](super::position::Position), [`Rotation`](super::rotation::Rotation),
//! and [`Scale`](super::scale::Scale) are interpreted as local to the parent.
//! The [`propagate_transforms`](crate::systems::propagate_transforms::propagate_transforms)
//! system computes the resulting viewport-space values and stores them here.

use bevy_ecs::prelude::*;
use glam::Vec2;

/// Composed transform of an entity and all its ancestors.
///
/// For the stage root this mirrors its local values: the letterbox offset and
/// the layout scale. Everything below it lands in viewport pixels.
#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct GlobalTransform2D {
    pub position: Vec2,
    /// Rotation in degrees.
    pub rotation_degrees: f32,
    pub scale: Vec2,
}

impl GlobalTransform2D {
    /// Transform of a root node: its local values as-is.
    pub fn from_local(position: Vec2, rotation_degrees: f32, scale: Vec2) -> Self {
        Self {
            position,
            rotation_degrees,
            scale,
        }
    }

    /// Transform of a child with the given local values under `self`.
    ///
    /// The local offset is scaled by the parent, then turned by the parent's
    /// rotation. Rotations add and scales multiply.
    pub fn compose(&self, position: Vec2, rotation_degrees: f32, scale: Vec2) -> Self {
        let turn = Vec2::from_angle(self.rotation_degrees.to_radians());
        Self {
            position: self.position + turn.rotate(position * self.scale),
            rotation_degrees: self.rotation_degrees + rotation_degrees,
            scale: self.scale * scale,
        }
    }

    /// Map a point in this node's local space to stage space.
    pub fn transform_point(&self, local: Vec2) -> Vec2 {
        self.compose(local, 0.0, Vec2::ONE).position
    }
}

impl Default for GlobalTransform2D {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            rotation_degrees: 0.0,
            scale: Vec2::ONE,
        }
    }
}
