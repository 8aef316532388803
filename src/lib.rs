//! Stagehand library.
//!
//! A headless 2D scene stage built on `bevy_ecs`: scenes swap behind an
//! animated curtain while their assets load in the background, and a frame
//! clock drives timers and tweens.
//!
//! - [`assets`] – asset descriptors, manifests, background fetching, and the cache
//! - [`clock`], [`timer`], [`tween`] – frame-driven time
//! - [`completion`] – one-shot completion handles polled by the stage
//! - [`curtain`] – transition curtains and labelled timelines
//! - [`scene`] – the scene lifecycle trait
//! - [`sound`], [`mixer`] – sound contexts and a headless audio backend
//! - [`stage`] – the stage manager that ties it together
//! - [`components`], [`resources`], [`systems`], [`events`] – ECS pieces

pub mod assets;
pub mod clock;
pub mod completion;
pub mod components;
pub mod curtain;
pub mod error;
pub mod events;
pub mod mixer;
pub mod resources;
pub mod scene;
pub mod sound;
pub mod stage;
pub mod systems;
pub mod timer;
pub mod tween;

pub use completion::{Completion, CompletionState, Rejection, Resolver};
pub use error::{AssetError, CurtainError, StageError};
pub use scene::{Scene, SceneContext, SceneFactory};
pub use stage::{StageManager, TransitionPhase};
