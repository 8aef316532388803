use super::{CURTAIN_MARKERS, CurtainStatus, Timeline, TimelinePlayer, Transition};
use crate::assets::{AssetCache, AssetDescriptor};
use crate::completion::{Completion, Rejection, Resolver};
use crate::components::position::Position;
use crate::components::stagenode::StageNode;
use crate::components::zindex::ZIndex;
use crate::error::CurtainError;
use bevy_ecs::hierarchy::ChildOf;
use bevy_ecs::prelude::*;
use std::sync::Arc;

/// Curtain backed by an `animate` asset with the six standard markers.
pub struct TimelineCurtain {
    asset_id: String,
    path: String,
    player: Option<TimelinePlayer>,
    status: CurtainStatus,
    pending: Option<Resolver<()>>,
    node: Option<Entity>,
    progress: f32,
}

impl TimelineCurtain {
    pub fn new(asset_id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            path: path.into(),
            player: None,
            status: CurtainStatus::Closed,
            pending: None,
            node: None,
            progress: 0.0,
        }
    }

    /// Frame the renderer should show, once initialised.
    pub fn current_frame(&self) -> Option<u32> {
        self.player.as_ref().map(TimelinePlayer::current_frame)
    }

    pub fn node(&self) -> Option<Entity> {
        self.node
    }

    pub fn loading_progress(&self) -> f32 {
        self.progress
    }

    /// Start a play-to segment, rejecting whatever segment was running.
    fn play_segment(&mut self, from: &str, to: &str, status: CurtainStatus) -> Completion<()> {
        self.interrupt();
        let Some(player) = self.player.as_mut() else {
            log::error!("curtain '{}' used before init", self.asset_id);
            return Completion::rejected(Rejection::Failed("curtain not initialised".into()));
        };
        player.play_to(from, to);
        self.status = status;
        let (resolver, completion) = Completion::pair();
        self.pending = Some(resolver);
        completion
    }

    fn interrupt(&mut self) {
        if let Some(resolver) = self.pending.take() {
            log::debug!("curtain segment interrupted");
            resolver.reject(Rejection::Cancelled);
        }
    }
}

impl Transition for TimelineCurtain {
    fn assets_to_load(&self) -> Vec<AssetDescriptor> {
        vec![AssetDescriptor::animate(self.asset_id.clone(), self.path.clone()).global()]
    }

    fn init(&mut self, cache: &AssetCache) -> Result<(), CurtainError> {
        let Some(timeline) = cache.timelines().get(&self.asset_id) else {
            log::error!("curtain timeline '{}' is not loaded", self.asset_id);
            return Err(CurtainError::MissingAsset(self.asset_id.clone()));
        };
        let missing = timeline.missing_labels(&CURTAIN_MARKERS);
        if !missing.is_empty() {
            log::error!(
                "curtain timeline '{}' lacks markers: {}",
                self.asset_id,
                missing.join(", ")
            );
            return Err(CurtainError::MissingMarkers(missing));
        }
        self.player = Some(TimelinePlayer::new(Arc::clone(timeline)));
        self.cover();
        Ok(())
    }

    fn status(&self) -> CurtainStatus {
        self.status
    }

    fn open(&mut self) -> Completion<()> {
        self.play_segment("reveal", "reveal_stop", CurtainStatus::Opening)
    }

    fn close(&mut self) -> Completion<()> {
        self.play_segment("cover", "cover_stop", CurtainStatus::Closing)
    }

    fn loading(&mut self) {
        self.interrupt();
        self.progress = 0.0;
        if let Some(player) = self.player.as_mut() {
            player.loop_between("load", "load_loop");
        }
        self.status = CurtainStatus::Loading;
    }

    fn cover(&mut self) {
        self.interrupt();
        if let Some(player) = self.player.as_mut() {
            player.goto_and_stop("cover_stop");
        }
        self.status = CurtainStatus::Closed;
    }

    fn hide(&mut self) {
        self.interrupt();
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        self.status = CurtainStatus::Hidden;
    }

    fn add(&mut self, world: &mut World, parent: Entity) {
        match self.node {
            Some(node) => {
                world.entity_mut(node).insert(ChildOf(parent));
            }
            None => {
                let node = world
                    .spawn((
                        StageNode::Curtain,
                        Position::default(),
                        ZIndex::CURTAIN,
                        ChildOf(parent),
                    ))
                    .id();
                self.node = Some(node);
            }
        }
    }

    fn remove(&mut self, world: &mut World) {
        if let Some(node) = self.node
            && let Ok(mut entity) = world.get_entity_mut(node)
        {
            entity.remove::<ChildOf>();
        }
    }

    fn progress(&mut self, fraction: f32) {
        self.progress = fraction.clamp(0.0, 1.0);
    }

    fn update(&mut self, dt: f32) {
        let Some(player) = self.player.as_mut() else {
            return;
        };
        if !player.advance(dt) {
            return;
        }
        self.status = match self.status {
            CurtainStatus::Closing => CurtainStatus::Closed,
            CurtainStatus::Opening => CurtainStatus::Open,
            other => other,
        };
        if let Some(resolver) = self.pending.take() {
            resolver.resolve(());
        }
    }
}

impl std::fmt::Debug for TimelineCurtain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineCurtain")
            .field("asset_id", &self.asset_id)
            .field("status", &self.status)
            .field("frame", &self.current_frame())
            .finish()
    }
}

/// Build a curtain timeline in memory. Handy for tests and demos.
pub fn timeline_with_markers(fps: f32, segment_frames: u32) -> Timeline {
    let mut labels = rustc_hash::FxHashMap::default();
    let mut frame = 0;
    for pair in CURTAIN_MARKERS.chunks(2) {
        labels.insert(pair[0].to_string(), frame);
        labels.insert(pair[1].to_string(), frame + segment_frames - 1);
        frame += segment_frames;
    }
    Timeline {
        fps,
        total_frames: frame,
        labels,
    }
}
