use bevy_ecs::prelude::Component;

use crate::tween::Tweenable;

#[derive(Component, Clone, Debug, Copy, Default, PartialEq)]
pub struct Rotation {
    pub degrees: f32,
}

impl Tweenable for Rotation {
    fn get_property(&self, name: &str) -> Option<f32> {
        (name == "degrees").then_some(self.degrees)
    }

    fn set_property(&mut self, name: &str, value: f32) -> bool {
        if name != "degrees" {
            return false;
        }
        self.degrees = value;
        true
    }
}
