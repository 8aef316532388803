//! Messages exchanged with collaborators outside the stage thread.
//!
//! - [`audio`] – commands to, and notifications from, the audio backend

pub mod audio;
