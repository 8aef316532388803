//! Z-index component for render ordering.
//!
//! Renderers sort siblings by [`ZIndex`]; higher values draw on top. The
//! curtain node sits above every scene node.

use bevy_ecs::prelude::Component;

/// Rendering order hint. Higher values are drawn later (on top).
#[derive(Component, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct ZIndex(pub i32);

impl ZIndex {
    pub const SCENE: ZIndex = ZIndex(0);
    pub const CURTAIN: ZIndex = ZIndex(1000);
}
