//! ECS resources stored in the stage world.
//!
//! - [`stageconfig`] – INI-backed stage settings
//! - [`stagelayout`] – logical canvas size and viewport fit
//! - [`worldtime`] – scaled time advanced once per stage update

pub mod stageconfig;
pub mod stagelayout;
pub mod worldtime;
