//! Stage-tree transform propagation.
//!
//! Every node that sits in a hierarchy (a parentless node with [`Children`],
//! or anything carrying [`ChildOf`]) gets a [`GlobalTransform2D`] composed
//! from its own local components and those of its ancestors.
//!
//! Runs at the end of each stage update so readers see where scenes and
//! tweens left their nodes this frame. A scene node detached from the stage
//! root is walked as its own tree, which lets scenes build their content
//! before they are attached.

use bevy_ecs::hierarchy::{ChildOf, Children};
use bevy_ecs::prelude::*;
use glam::Vec2;

use crate::components::globaltransform2d::GlobalTransform2D;
use crate::components::position::Position;
use crate::components::rotation::Rotation;
use crate::components::scale::Scale;

type TreeRoots<'w, 's> = Query<
    'w,
    's,
    (
        Entity,
        &'static Position,
        Option<&'static Rotation>,
        Option<&'static Scale>,
        &'static Children,
    ),
    Without<ChildOf>,
>;

type TreeNodes<'w, 's> = Query<
    'w,
    's,
    (
        &'static Position,
        Option<&'static Rotation>,
        Option<&'static Scale>,
        Option<&'static Children>,
    ),
    With<ChildOf>,
>;

fn local_parts(rotation: Option<&Rotation>, scale: Option<&Scale>) -> (f32, Vec2) {
    (
        rotation.map_or(0.0, |r| r.degrees),
        scale.map_or(Vec2::ONE, |s| s.scale),
    )
}

/// Write `value` into the entity's transform, inserting one if it is absent.
///
/// Inserted components land when the command queue is applied, so a freshly
/// parented node reads correctly from the following frame.
fn store(
    entity: Entity,
    value: GlobalTransform2D,
    globals: &mut Query<&mut GlobalTransform2D>,
    commands: &mut Commands,
) {
    match globals.get_mut(entity) {
        Ok(mut slot) => *slot = value,
        Err(_) => {
            commands.entity(entity).insert(value);
        }
    }
}

/// Walk each tree from its root and compose transforms downward.
pub fn propagate_transforms(
    roots: TreeRoots,
    nodes: TreeNodes,
    mut globals: Query<&mut GlobalTransform2D>,
    mut commands: Commands,
) {
    let mut pending: Vec<(GlobalTransform2D, Entity)> = Vec::new();

    for (root, position, rotation, scale, children) in &roots {
        let (degrees, factor) = local_parts(rotation, scale);
        let base = GlobalTransform2D::from_local(position.pos, degrees, factor);
        store(root, base, &mut globals, &mut commands);

        pending.extend(children.iter().map(|child| (base, child)));
        while let Some((parent, entity)) = pending.pop() {
            let Ok((position, rotation, scale, below)) = nodes.get(entity) else {
                continue;
            };
            let (degrees, factor) = local_parts(rotation, scale);
            let composed = parent.compose(position.pos, degrees, factor);
            store(entity, composed, &mut globals, &mut commands);

            if let Some(below) = below {
                pending.extend(below.iter().map(|child| (composed, child)));
            }
        }
    }
}
