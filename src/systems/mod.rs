//! Systems run by the stage manager.
//!
//! - [`propagate_transforms`] – composes local transforms down the stage tree
//! - [`time`] – advances the shared `WorldTime` resource

pub mod propagate_transforms;
pub mod time;
