use bevy_ecs::prelude::Component;

/// Role of an entity in the stage tree.
///
/// The stage root is the single parent every displayed node hangs from. A
/// scene node is attached only once its scene has finished setup; the curtain
/// node is attached for the duration of a transition.
#[derive(Component, Clone, Debug, PartialEq, Eq)]
pub enum StageNode {
    Root,
    Scene { id: String },
    Curtain,
}
