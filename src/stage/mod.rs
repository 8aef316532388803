//! The stage: one ECS world, one root node, and the scene currently on it.
//!
//! [`StageManager`] owns the asset pipeline, the frame clock, and the active
//! curtain, and swaps scenes through a paced transition.

mod manager;

pub use manager::{StageManager, TransitionPhase};
