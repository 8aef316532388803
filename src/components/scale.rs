use bevy_ecs::prelude::Component;
use glam::Vec2;

use crate::tween::Tweenable;

#[derive(Component, Clone, Debug, Copy, PartialEq)]
pub struct Scale {
    pub scale: Vec2,
}
impl Scale {
    pub fn new(sx: f32, sy: f32) -> Self {
        Self {
            scale: Vec2::new(sx, sy),
        }
    }

    pub fn uniform(s: f32) -> Self {
        Self::new(s, s)
    }
}
impl Default for Scale {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl Tweenable for Scale {
    fn get_property(&self, name: &str) -> Option<f32> {
        match name {
            "x" | "scale_x" => Some(self.scale.x),
            "y" | "scale_y" => Some(self.scale.y),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f32) -> bool {
        match name {
            "x" | "scale_x" => self.scale.x = value,
            "y" | "scale_y" => self.scale.y = value,
            _ => return false,
        }
        true
    }
}
