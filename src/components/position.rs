use bevy_ecs::prelude::Component;
use glam::Vec2;

use crate::tween::Tweenable;

/// Local position, relative to the parent node when the entity has one.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    pub pos: Vec2,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
        }
    }
}

impl Tweenable for Position {
    fn get_property(&self, name: &str) -> Option<f32> {
        match name {
            "x" => Some(self.pos.x),
            "y" => Some(self.pos.y),
            _ => None,
        }
    }

    fn set_property(&mut self, name: &str, value: f32) -> bool {
        match name {
            "x" => self.pos.x = value,
            "y" => self.pos.y = value,
            _ => return false,
        }
        true
    }
}
