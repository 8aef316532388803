//! Transition curtains.
//!
//! A curtain covers the stage while scenes swap. The stage manager drives it
//! through a fixed sequence: `close` (cover the old scene), `loading` (loop
//! while assets load), `open` (reveal the new scene). Anything implementing
//! [`Transition`] can serve; [`TimelineCurtain`] is the stock one, driven by
//! a labelled [`Timeline`].

mod timeline;
mod timeline_curtain;

pub use timeline::{Timeline, TimelinePlayer};
pub use timeline_curtain::{TimelineCurtain, timeline_with_markers};

use crate::assets::{AssetCache, AssetDescriptor};
use crate::completion::Completion;
use crate::error::CurtainError;
use bevy_ecs::prelude::*;

/// Labels a curtain timeline must define.
pub const CURTAIN_MARKERS: [&str; 6] = [
    "cover",
    "cover_stop",
    "load",
    "load_loop",
    "reveal",
    "reveal_stop",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurtainStatus {
    /// Fully covering the stage, not animating.
    #[default]
    Closed,
    Opening,
    /// Fully revealed.
    Open,
    Closing,
    /// Covering the stage and looping the loading animation.
    Loading,
    Hidden,
}

pub trait Transition {
    /// Assets the curtain needs; loaded as global before [`init`](Self::init).
    fn assets_to_load(&self) -> Vec<AssetDescriptor>;

    /// Bind to loaded assets and validate them.
    fn init(&mut self, cache: &AssetCache) -> Result<(), CurtainError>;

    fn status(&self) -> CurtainStatus;

    /// Play the reveal; resolves at its stop marker.
    fn open(&mut self) -> Completion<()>;

    /// Play the cover; resolves at its stop marker.
    fn close(&mut self) -> Completion<()>;

    /// Loop the loading animation until told otherwise.
    fn loading(&mut self);

    /// Jump straight to fully covered.
    fn cover(&mut self);

    fn hide(&mut self);

    /// Attach the curtain node under `parent`, above scene nodes.
    fn add(&mut self, world: &mut World, parent: Entity);

    /// Detach the curtain node from the stage tree.
    fn remove(&mut self, world: &mut World);

    /// Loading progress in `0.0..=1.0`.
    fn progress(&mut self, _fraction: f32) {}

    fn update(&mut self, dt: f32);
}
