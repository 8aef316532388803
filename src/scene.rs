//! Scenes: self-contained screens the stage swaps between.
//!
//! A scene is registered with the [`StageManager`](crate::stage::StageManager)
//! as a factory and constructed fresh on every change. Its lifecycle:
//!
//! 1. [`preload`](Scene::preload) – name the assets it needs;
//! 2. [`setup`](Scene::setup) – build its node tree once those are cached;
//! 3. [`start`](Scene::start) – called exactly once, when the curtain is open;
//! 4. [`update`](Scene::update) / [`pause`](Scene::pause) – every frame;
//! 5. [`cleanup`](Scene::cleanup) – release anything it registered elsewhere.
//!
//! Scenes own no render state directly; they hang entities beneath the node
//! handed to them in [`SceneContext::node`].

use crate::assets::{AssetCache, AssetDescriptor};
use crate::clock::FrameClock;
use crate::completion::Completion;
use crate::components::globaltransform2d::GlobalTransform2D;
use crate::components::position::Position;
use crate::resources::stagelayout::StageLayout;
use crate::sound::SoundLayer;
use bevy_ecs::hierarchy::ChildOf;
use bevy_ecs::prelude::*;

/// Everything a scene hook may touch.
pub struct SceneContext<'a> {
    pub world: &'a mut World,
    /// The scene's own node. Detached from the stage until after setup.
    pub node: Entity,
    pub assets: &'a AssetCache,
    pub sounds: &'a mut SoundLayer,
    pub clock: &'a FrameClock,
    pub layout: StageLayout,
}

impl SceneContext<'_> {
    /// Spawn `bundle` as a child of the scene node.
    ///
    /// A bundle without a [`Position`] sits at the scene origin.
    pub fn spawn_child(&mut self, bundle: impl Bundle) -> Entity {
        self.world
            .spawn(bundle)
            .insert(ChildOf(self.node))
            .insert_if_new((Position::default(), GlobalTransform2D::default()))
            .id()
    }

    /// Spawn a bare positioned child.
    pub fn spawn_at(&mut self, x: f32, y: f32) -> Entity {
        self.spawn_child(Position::new(x, y))
    }
}

pub trait Scene {
    /// Assets to load before [`setup`](Self::setup). Defaults to none.
    fn preload(&mut self, _ctx: &mut SceneContext) -> Completion<Vec<AssetDescriptor>> {
        Completion::resolved(Vec::new())
    }

    /// Build the scene. The stage waits for the completion before revealing.
    fn setup(&mut self, _ctx: &mut SceneContext) -> Completion<()> {
        Completion::resolved(())
    }

    fn start(&mut self, _ctx: &mut SceneContext) {}

    fn update(&mut self, _dt: f32, _ctx: &mut SceneContext) {}

    fn pause(&mut self, _paused: bool, _ctx: &mut SceneContext) {}

    /// Undo whatever the scene registered outside its own node. The node and
    /// its children are despawned by the stage afterwards.
    fn cleanup(&mut self, ctx: &mut SceneContext);
}

/// Builds a fresh scene instance for each change.
pub type SceneFactory = Box<dyn Fn() -> Box<dyn Scene>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::zindex::ZIndex;
    use crate::systems::propagate_transforms::propagate_transforms;
    use glam::Vec2;

    #[test]
    fn test_spawn_child_without_position_is_propagated() {
        let mut world = World::new();
        let node = world.spawn(Position::new(50.0, 20.0)).id();
        let cache = AssetCache::default();
        let mut sounds = SoundLayer::detached();
        let clock = FrameClock::new();
        let (bare, placed) = {
            let mut ctx = SceneContext {
                world: &mut world,
                node,
                assets: &cache,
                sounds: &mut sounds,
                clock: &clock,
                layout: StageLayout::default(),
            };
            let bare = ctx.spawn_child(ZIndex(3));
            let placed = ctx.spawn_child(Position::new(5.0, 5.0));
            (bare, placed)
        };
        world.flush();
        assert_eq!(world.get::<Position>(bare), Some(&Position::default()));
        assert_eq!(world.get::<Position>(placed), Some(&Position::new(5.0, 5.0)));

        let mut schedule = Schedule::default();
        schedule.add_systems(propagate_transforms);
        schedule.run(&mut world);

        let bare_gt = world.get::<GlobalTransform2D>(bare).copied();
        assert_eq!(bare_gt.map(|g| g.position), Some(Vec2::new(50.0, 20.0)));
        let placed_gt = world.get::<GlobalTransform2D>(placed).copied();
        assert_eq!(placed_gt.map(|g| g.position), Some(Vec2::new(55.0, 25.0)));
    }
}
