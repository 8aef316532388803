//! The stage manager: scene registry, transition pipeline, per-frame driver.
//!
//! A scene change is a sequence of steps, each waiting for the previous one
//! to settle:
//!
//! 1. cover the old scene with the curtain (instant when there is none);
//! 2. loop the curtain's loading animation, clean up and despawn the old
//!    scene, unload non-global assets;
//! 3. pause;
//! 4. construct the new scene on a fresh node and ask it for assets;
//! 5. load those assets;
//! 6. pause;
//! 7. run the scene's setup;
//! 8. pause, then attach the scene node under the stage root;
//! 9. pause, then reveal;
//! 10. detach the curtain and start the scene.
//!
//! Steps are polled from [`StageManager::update`]; consecutive steps that
//! settle at once run within the same call.

use crate::assets::{AssetDescriptor, AssetManager, FileSource, LoadSummary};
use crate::clock::FrameClock;
use crate::completion::{Completion, Rejection};
use crate::components::globaltransform2d::GlobalTransform2D;
use crate::components::position::Position;
use crate::components::scale::Scale;
use crate::components::stagenode::StageNode;
use crate::components::zindex::ZIndex;
use crate::curtain::Transition;
use crate::error::StageError;
use crate::resources::stageconfig::StageConfig;
use crate::resources::stagelayout::StageLayout;
use crate::resources::worldtime::WorldTime;
use crate::scene::{Scene, SceneContext, SceneFactory};
use crate::sound::SoundLayer;
use crate::systems::propagate_transforms::propagate_transforms;
use crate::systems::time::update_world_time;
use bevy_ecs::hierarchy::ChildOf;
use bevy_ecs::prelude::*;
use log::{debug, error, info, warn};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Coarse view of where a scene change is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Idle,
    Covering,
    Waiting,
    Preloading,
    Loading,
    SettingUp,
    Revealing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Preload,
    Setup,
    Insert,
    Reveal,
}

enum Pipeline {
    Idle,
    Covering(Completion<()>),
    Waiting { remaining: f32, then: Resume },
    Preloading(Completion<Vec<AssetDescriptor>>),
    Loading(Completion<LoadSummary>),
    SettingUp(Completion<()>),
    Revealing(Completion<()>),
}

impl Pipeline {
    fn phase(&self) -> TransitionPhase {
        match self {
            Pipeline::Idle => TransitionPhase::Idle,
            Pipeline::Covering(_) => TransitionPhase::Covering,
            Pipeline::Waiting { .. } => TransitionPhase::Waiting,
            Pipeline::Preloading(_) => TransitionPhase::Preloading,
            Pipeline::Loading(_) => TransitionPhase::Loading,
            Pipeline::SettingUp(_) => TransitionPhase::SettingUp,
            Pipeline::Revealing(_) => TransitionPhase::Revealing,
        }
    }
}

struct ActiveScene {
    id: String,
    node: Entity,
    scene: Box<dyn Scene>,
}

type CurtainReady = Box<dyn FnOnce(Result<(), StageError>)>;

struct PendingCurtain {
    curtain: Box<dyn Transition>,
    load: Completion<LoadSummary>,
    on_ready: CurtainReady,
}

fn scene_context<'a>(
    world: &'a mut World,
    assets: &'a mut AssetManager,
    clock: &'a FrameClock,
    node: Entity,
) -> SceneContext<'a> {
    let layout = world
        .get_resource::<StageLayout>()
        .copied()
        .unwrap_or_default();
    let (cache, sounds) = assets.split_mut();
    SceneContext {
        world,
        node,
        assets: cache,
        sounds,
        clock,
        layout,
    }
}

pub struct StageManager {
    world: World,
    root: Entity,
    config: StageConfig,
    assets: AssetManager,
    clock: FrameClock,
    scenes: FxHashMap<String, SceneFactory>,
    current: Option<ActiveScene>,
    incoming: Option<ActiveScene>,
    pending_id: Option<String>,
    pipeline: Pipeline,
    curtain: Option<Box<dyn Transition>>,
    pending_curtain: Option<PendingCurtain>,
    transitioning: bool,
    paused: bool,
    propagate: Schedule,
}

impl StageManager {
    /// Build a stage around `assets`. The config's load policy and volumes
    /// are applied to it.
    pub fn new(config: StageConfig, mut assets: AssetManager) -> Self {
        assets.set_policy(config.load_policy);
        config.apply_volumes(assets.sounds_mut());

        let mut world = World::new();
        world.insert_resource(WorldTime::default());
        world.insert_resource(config.clone());
        let root = world
            .spawn((
                StageNode::Root,
                Position::default(),
                Scale::default(),
                GlobalTransform2D::default(),
                ZIndex::default(),
            ))
            .id();

        let mut propagate = Schedule::default();
        propagate.add_systems(propagate_transforms);

        let mut stage = StageManager {
            world,
            root,
            config,
            assets,
            clock: FrameClock::new(),
            scenes: FxHashMap::default(),
            current: None,
            incoming: None,
            pending_id: None,
            pipeline: Pipeline::Idle,
            curtain: None,
            pending_curtain: None,
            transitioning: false,
            paused: false,
            propagate,
        };
        let max = stage.config.max_size;
        stage.resize(max.width, max.height);
        stage
    }

    /// Build a stage that reads assets from `config.asset_root` with no
    /// audio backend attached.
    pub fn from_config(config: StageConfig) -> Self {
        let source = Arc::new(FileSource::new(config.asset_root.clone()));
        let assets = AssetManager::new(source, config.fetch_workers, SoundLayer::detached());
        Self::new(config, assets)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The stage root entity every displayed node hangs from.
    pub fn root(&self) -> Entity {
        self.root
    }

    pub fn config(&self) -> &StageConfig {
        &self.config
    }

    pub fn assets(&self) -> &AssetManager {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetManager {
        &mut self.assets
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn layout(&self) -> StageLayout {
        self.world
            .get_resource::<StageLayout>()
            .copied()
            .unwrap_or_default()
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    pub fn phase(&self) -> TransitionPhase {
        self.pipeline.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_ref().map(|a| a.id.as_str())
    }

    /// Node of the current scene.
    pub fn current_node(&self) -> Option<Entity> {
        self.current.as_ref().map(|a| a.node)
    }

    pub fn has_scene(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn curtain(&self) -> Option<&dyn Transition> {
        self.curtain.as_deref()
    }

    pub fn add_scene(&mut self, id: impl Into<String>, factory: impl Fn() -> Box<dyn Scene> + 'static) {
        let id = id.into();
        if self.scenes.insert(id.clone(), Box::new(factory)).is_some() {
            warn!("scene '{}' registered twice, replacing", id);
        }
    }

    pub fn add_scenes(&mut self, scenes: impl IntoIterator<Item = (String, SceneFactory)>) {
        for (id, factory) in scenes {
            if self.scenes.insert(id.clone(), factory).is_some() {
                warn!("scene '{}' registered twice, replacing", id);
            }
        }
    }

    /// Start a transition to the scene registered as `id`.
    pub fn change_scene(&mut self, id: &str) -> Result<(), StageError> {
        if !self.scenes.contains_key(id) {
            error!("change_scene: no scene registered as '{}'", id);
            return Err(StageError::UnknownScene(id.to_string()));
        }
        if self.transitioning {
            warn!("change_scene('{}') refused: transition in progress", id);
            return Err(StageError::TransitionInProgress);
        }

        info!("changing scene to '{}'", id);
        self.transitioning = true;
        self.pending_id = Some(id.to_string());

        let has_current = self.current.is_some();
        let covered = match self.curtain.as_mut() {
            Some(curtain) => {
                curtain.add(&mut self.world, self.root);
                if has_current {
                    curtain.close()
                } else {
                    curtain.cover();
                    Completion::resolved(())
                }
            }
            None => Completion::resolved(()),
        };
        self.pipeline = Pipeline::Covering(covered);
        self.advance_pipeline(0.0);
        Ok(())
    }

    /// Load a curtain's assets as global, validate it, and install it for
    /// the following scene changes. `on_ready` runs from a later `update`.
    pub fn set_transition(
        &mut self,
        curtain: Box<dyn Transition>,
        on_ready: impl FnOnce(Result<(), StageError>) + 'static,
    ) {
        let descriptors = curtain
            .assets_to_load()
            .into_iter()
            .map(AssetDescriptor::global)
            .collect();
        match self.assets.load_tracked(descriptors) {
            Ok(load) => {
                if let Some(previous) = self.pending_curtain.take() {
                    warn!("set_transition: replacing a curtain that was still loading");
                    (previous.on_ready)(Err(StageError::CurtainLoad("superseded".to_string())));
                }
                self.pending_curtain = Some(PendingCurtain {
                    curtain,
                    load,
                    on_ready: Box::new(on_ready),
                });
            }
            Err(e) => {
                error!("set_transition: {}", e);
                on_ready(Err(StageError::Asset(e)));
            }
        }
    }

    /// Halt (`true`) or resume (`false`) updates, scene time, and audio.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        info!("stage {}", if paused { "paused" } else { "resumed" });
        if let Some(active) = self.current.as_mut() {
            let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, active.node);
            active.scene.pause(paused, &mut ctx);
        }
        self.assets.sounds_mut().set_paused(paused);
    }

    /// Fit the logical canvas to a `width`×`height` viewport.
    pub fn resize(&mut self, width: f32, height: f32) -> StageLayout {
        let layout = StageLayout::compute(self.config.min_size, self.config.max_size, width, height);
        self.world.insert_resource(layout);
        self.world.entity_mut(self.root).insert((
            Position {
                pos: layout.root_position(),
            },
            Scale::uniform(layout.scale),
        ));
        debug!(
            "resized to {}x{}: logical {}x{}, scale {}",
            width, height, layout.logical.x, layout.logical.y, layout.scale
        );
        layout
    }

    /// Advance one frame of `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        let dt = update_world_time(&mut self.world, dt);
        self.clock.tick(dt);
        self.assets.poll();
        self.install_pending_curtain();

        let was_transitioning = self.transitioning;
        if self.transitioning {
            if let Some(curtain) = self.curtain.as_mut() {
                curtain.update(dt);
            }
            self.advance_pipeline(dt);
        }
        if !was_transitioning && let Some(active) = self.current.as_mut() {
            let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, active.node);
            active.scene.update(dt, &mut ctx);
        }

        self.propagate.run(&mut self.world);
    }

    /// Clean up the current scene, drop every asset, and stop the clock.
    pub fn shutdown(&mut self) {
        for mut active in [self.current.take(), self.incoming.take()].into_iter().flatten() {
            self.cleanup_scene(&mut active);
        }
        self.pipeline = Pipeline::Idle;
        self.transitioning = false;
        self.clock.clear_timers();
        self.clock.destroy();
        self.assets.unload(true);
        self.assets.sounds_mut().shutdown();
        info!("stage shut down");
    }

    fn advance_pipeline(&mut self, dt: f32) {
        let mut dt = dt;
        loop {
            let step = std::mem::replace(&mut self.pipeline, Pipeline::Idle);
            let (next, settled) = match step {
                Pipeline::Idle => (Pipeline::Idle, false),
                Pipeline::Covering(c) if c.is_pending() => (Pipeline::Covering(c), false),
                Pipeline::Covering(c) => {
                    if let Some(Err(rejection)) = c.take() {
                        warn!("curtain cover {}", rejection);
                    }
                    (self.teardown_current(), true)
                }
                Pipeline::Waiting { remaining, then } => {
                    let remaining = remaining - dt;
                    dt = 0.0;
                    if remaining > 0.0 {
                        (Pipeline::Waiting { remaining, then }, false)
                    } else {
                        (self.resume(then), true)
                    }
                }
                Pipeline::Preloading(c) if c.is_pending() => (Pipeline::Preloading(c), false),
                Pipeline::Preloading(c) => (self.after_preload(c.take()), true),
                Pipeline::Loading(c) if c.is_pending() => (Pipeline::Loading(c), false),
                Pipeline::Loading(c) => {
                    match c.take() {
                        Some(Ok(summary)) => {
                            for (id, reason) in &summary.failed {
                                warn!("scene asset '{}' failed: {}", id, reason);
                            }
                            debug!(
                                "scene assets ready: {} loaded, {} skipped",
                                summary.loaded.len(),
                                summary.skipped.len()
                            );
                        }
                        Some(Err(rejection)) => error!("scene asset load {}", rejection),
                        None => {}
                    }
                    if let Some(curtain) = self.curtain.as_mut() {
                        curtain.progress(1.0);
                    }
                    (self.debounce(Resume::Setup), true)
                }
                Pipeline::SettingUp(c) if c.is_pending() => (Pipeline::SettingUp(c), false),
                Pipeline::SettingUp(c) => {
                    if let Some(Err(rejection)) = c.take() {
                        warn!("scene setup {}", rejection);
                    }
                    (self.debounce(Resume::Insert), true)
                }
                Pipeline::Revealing(c) if c.is_pending() => (Pipeline::Revealing(c), false),
                Pipeline::Revealing(c) => {
                    if let Some(Err(rejection)) = c.take() {
                        warn!("curtain reveal {}", rejection);
                    }
                    self.finish_transition();
                    (Pipeline::Idle, false)
                }
            };
            self.pipeline = next;
            if !settled {
                return;
            }
        }
    }

    fn debounce(&self, then: Resume) -> Pipeline {
        Pipeline::Waiting {
            remaining: self.config.debounce,
            then,
        }
    }

    fn resume(&mut self, then: Resume) -> Pipeline {
        match then {
            Resume::Preload => self.construct_incoming(),
            Resume::Setup => {
                let Some(active) = self.incoming.as_mut() else {
                    return self.abort_transition("no incoming scene to set up");
                };
                debug!("setting up scene '{}'", active.id);
                let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, active.node);
                Pipeline::SettingUp(active.scene.setup(&mut ctx))
            }
            Resume::Insert => {
                let Some(active) = self.incoming.as_ref() else {
                    return self.abort_transition("no incoming scene to attach");
                };
                self.world.entity_mut(active.node).insert(ChildOf(self.root));
                self.debounce(Resume::Reveal)
            }
            Resume::Reveal => match self.curtain.as_mut() {
                Some(curtain) => Pipeline::Revealing(curtain.open()),
                None => Pipeline::Revealing(Completion::resolved(())),
            },
        }
    }

    fn teardown_current(&mut self) -> Pipeline {
        if let Some(curtain) = self.curtain.as_mut() {
            curtain.progress(0.0);
            curtain.loading();
        }
        if let Some(mut active) = self.current.take() {
            self.cleanup_scene(&mut active);
        }
        self.assets.unload(false);
        self.debounce(Resume::Preload)
    }

    fn cleanup_scene(&mut self, active: &mut ActiveScene) {
        info!("cleaning up scene '{}'", active.id);
        if let Ok(mut node) = self.world.get_entity_mut(active.node) {
            node.remove::<ChildOf>();
        }
        {
            let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, active.node);
            active.scene.cleanup(&mut ctx);
        }
        if let Ok(node) = self.world.get_entity_mut(active.node) {
            node.despawn();
        }
    }

    fn construct_incoming(&mut self) -> Pipeline {
        let Some(id) = self.pending_id.clone() else {
            return self.abort_transition("no pending scene id");
        };
        let Some(factory) = self.scenes.get(&id) else {
            return self.abort_transition("pending scene vanished from the registry");
        };
        let mut scene = factory();
        let node = self
            .world
            .spawn((
                StageNode::Scene { id: id.clone() },
                Position::default(),
                Scale::default(),
                GlobalTransform2D::default(),
                ZIndex::SCENE,
            ))
            .id();
        debug!("preloading scene '{}'", id);
        let preload = {
            let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, node);
            scene.preload(&mut ctx)
        };
        self.incoming = Some(ActiveScene { id, node, scene });
        Pipeline::Preloading(preload)
    }

    fn after_preload(&mut self, outcome: Option<Result<Vec<AssetDescriptor>, Rejection>>) -> Pipeline {
        match outcome {
            Some(Ok(descriptors)) if !descriptors.is_empty() => {
                match self.assets.load_tracked(descriptors) {
                    Ok(load) => return Pipeline::Loading(load),
                    Err(e) => error!("scene assets rejected: {}", e),
                }
            }
            Some(Ok(_)) | None => {}
            Some(Err(rejection)) => warn!("scene preload {}", rejection),
        }
        self.debounce(Resume::Setup)
    }

    fn finish_transition(&mut self) {
        self.transitioning = false;
        self.pending_id = None;
        if let Some(curtain) = self.curtain.as_mut() {
            curtain.remove(&mut self.world);
        }
        if let Some(mut active) = self.incoming.take() {
            {
                let mut ctx = scene_context(&mut self.world, &mut self.assets, &self.clock, active.node);
                active.scene.start(&mut ctx);
            }
            info!("scene '{}' started", active.id);
            self.current = Some(active);
        }
    }

    fn abort_transition(&mut self, reason: &str) -> Pipeline {
        error!("scene change aborted: {}", reason);
        self.transitioning = false;
        self.pending_id = None;
        if let Some(mut active) = self.incoming.take() {
            self.cleanup_scene(&mut active);
        }
        if let Some(curtain) = self.curtain.as_mut() {
            curtain.remove(&mut self.world);
        }
        Pipeline::Idle
    }

    fn install_pending_curtain(&mut self) {
        let ready = self
            .pending_curtain
            .as_ref()
            .is_some_and(|p| !p.load.is_pending());
        if !ready || self.transitioning {
            return;
        }
        let Some(PendingCurtain {
            mut curtain,
            load,
            on_ready,
        }) = self.pending_curtain.take()
        else {
            return;
        };
        let result = match load.take() {
            Some(Ok(_)) => curtain.init(self.assets.cache()).map_err(StageError::from),
            Some(Err(rejection)) => Err(StageError::CurtainLoad(rejection.to_string())),
            None => Err(StageError::CurtainLoad("load outcome already taken".to_string())),
        };
        match result {
            Ok(()) => {
                curtain.cover();
                if let Some(mut previous) = self.curtain.replace(curtain) {
                    previous.remove(&mut self.world);
                }
                info!("transition curtain installed");
                on_ready(Ok(()));
            }
            Err(e) => {
                error!("transition curtain rejected: {}", e);
                on_ready(Err(e));
            }
        }
    }
}
