//! ECS components for stage entities.
//!
//! - [`globaltransform2d`] – composed transform written by transform propagation
//! - [`position`] – local position relative to the parent node
//! - [`rotation`] – rotation angle in degrees
//! - [`scale`] – 2D scale factor
//! - [`stagenode`] – marks the stage root, scene nodes, and the curtain node
//! - [`zindex`] – rendering order hint for 2D drawing

pub mod globaltransform2d;
pub mod position;
pub mod rotation;
pub mod scale;
pub mod stagenode;
pub mod zindex;
