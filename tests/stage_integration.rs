//! Integration tests for the stage manager: scene lifecycle, transition
//! pacing, curtains, pause, and resize.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test stage_integration
//! ```

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use bevy_ecs::hierarchy::ChildOf;
use serde_json::json;

use stagehand::assets::{AssetDescriptor, AssetKind, AssetManager, MemorySource};
use stagehand::components::globaltransform2d::GlobalTransform2D;
use stagehand::components::position::Position;
use stagehand::components::stagenode::StageNode;
use stagehand::curtain::{CurtainStatus, TimelineCurtain, timeline_with_markers};
use stagehand::error::{CurtainError, StageError};
use stagehand::resources::stageconfig::StageConfig;
use stagehand::resources::worldtime::WorldTime;
use stagehand::scene::{Scene, SceneContext};
use stagehand::sound::SoundLayer;
use stagehand::{Completion, StageManager, TransitionPhase};

const EPSILON: f32 = 1e-4;

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

type Log = Rc<RefCell<Vec<String>>>;

/// Scene that writes every hook call to a shared log.
struct Recorder {
    name: &'static str,
    log: Log,
    assets: Vec<AssetDescriptor>,
}

impl Recorder {
    fn push(&self, what: &str) {
        self.log.borrow_mut().push(format!("{}:{}", self.name, what));
    }
}

impl Scene for Recorder {
    fn preload(&mut self, _ctx: &mut SceneContext) -> Completion<Vec<AssetDescriptor>> {
        self.push("preload");
        Completion::resolved(self.assets.clone())
    }

    fn setup(&mut self, ctx: &mut SceneContext) -> Completion<()> {
        let attached = ctx.world.get::<ChildOf>(ctx.node).is_some();
        self.push(if attached { "setup-attached" } else { "setup" });
        for descriptor in &self.assets {
            if ctx.assets.data().contains(descriptor.id()) {
                self.push(&format!("has-{}", descriptor.id()));
            }
        }
        ctx.spawn_at(10.0, 20.0);
        Completion::resolved(())
    }

    fn start(&mut self, ctx: &mut SceneContext) {
        let attached = ctx.world.get::<ChildOf>(ctx.node).is_some();
        self.push(if attached { "start" } else { "start-detached" });
    }

    fn update(&mut self, _dt: f32, _ctx: &mut SceneContext) {
        self.push("update");
    }

    fn pause(&mut self, paused: bool, _ctx: &mut SceneContext) {
        self.push(if paused { "pause" } else { "resume" });
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext) {
        self.push("cleanup");
    }
}

fn source() -> MemorySource {
    let timeline = serde_json::to_vec(&timeline_with_markers(10.0, 5)).unwrap();
    let broken = json!({ "fps": 10, "totalFrames": 5, "labels": { "cover": 0 } });
    MemorySource::new()
        .with("curtain.json", timeline)
        .with("broken_curtain.json", broken.to_string())
        .with("data/level.json", json!({ "enemies": 3 }).to_string())
        .with("data/shared.json", json!({ "lives": 3 }).to_string())
}

fn stage_with(debounce: f32) -> (StageManager, Log) {
    let mut config = StageConfig::new();
    config.debounce = debounce;
    config.fetch_workers = 0;
    let assets = AssetManager::new(Arc::new(source()), 0, SoundLayer::detached());
    let mut stage = StageManager::new(config, assets);

    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let menu_log = Rc::clone(&log);
    stage.add_scene("menu", move || {
        Box::new(Recorder {
            name: "menu",
            log: Rc::clone(&menu_log),
            assets: Vec::new(),
        })
    });
    let level_log = Rc::clone(&log);
    stage.add_scene("level", move || {
        Box::new(Recorder {
            name: "level",
            log: Rc::clone(&level_log),
            assets: vec![
                AssetDescriptor::data("level", "data/level.json"),
                AssetDescriptor::data("shared", "data/shared.json").global(),
            ],
        })
    });
    (stage, log)
}

fn entries(log: &Log, prefix: &str) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|e| e.starts_with(prefix))
        .cloned()
        .collect()
}

fn run_until_idle(stage: &mut StageManager, dt: f32, max_frames: u32) -> u32 {
    for frame in 1..=max_frames {
        stage.update(dt);
        if !stage.is_transitioning() {
            return frame;
        }
    }
    panic!("transition did not finish within {} frames", max_frames);
}

// =============================================================================
// Registry
// =============================================================================

#[test]
fn unknown_scene_is_an_error() {
    let (mut stage, log) = stage_with(0.0);
    assert!(matches!(
        stage.change_scene("credits"),
        Err(StageError::UnknownScene(id)) if id == "credits"
    ));
    assert!(!stage.is_transitioning());
    assert!(log.borrow().is_empty());
}

#[test]
fn unknown_scene_leaves_current_scene_alone() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("menu").unwrap();
    let node = stage.current_node();
    assert!(node.is_some());
    let logged = log.borrow().len();

    assert!(matches!(
        stage.change_scene("credits"),
        Err(StageError::UnknownScene(_))
    ));
    assert!(!stage.is_transitioning());
    assert_eq!(stage.phase(), TransitionPhase::Idle);
    assert_eq!(stage.current_scene(), Some("menu"));
    assert_eq!(stage.current_node(), node);
    assert_eq!(log.borrow().len(), logged);

    stage.update(0.016);
    assert_eq!(entries(&log, "menu:update").len(), 1);
    assert!(entries(&log, "menu:cleanup").is_empty());
}

#[test]
fn re_registering_replaces_the_factory() {
    let (mut stage, log) = stage_with(0.0);
    let other = Rc::clone(&log);
    stage.add_scene("menu", move || {
        Box::new(Recorder {
            name: "menu2",
            log: Rc::clone(&other),
            assets: Vec::new(),
        })
    });
    stage.change_scene("menu").unwrap();
    assert!(entries(&log, "menu:").is_empty());
    assert!(!entries(&log, "menu2:").is_empty());
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn first_scene_runs_hooks_in_order() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("menu").unwrap();
    // Nothing to wait for: the whole pipeline settles inside the call.
    assert!(!stage.is_transitioning());
    assert_eq!(stage.current_scene(), Some("menu"));
    assert_eq!(
        *log.borrow(),
        vec!["menu:preload", "menu:setup", "menu:start"]
    );

    stage.update(0.016);
    stage.update(0.016);
    assert_eq!(entries(&log, "menu:update").len(), 2);
}

#[test]
fn scene_assets_are_cached_before_setup() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("level").unwrap();
    assert_eq!(stage.phase(), TransitionPhase::Loading);
    run_until_idle(&mut stage, 0.016, 10);

    let level = entries(&log, "level:");
    assert_eq!(
        level,
        vec!["level:preload", "level:setup", "level:has-level", "level:has-shared", "level:start"]
    );
    let cache = stage.assets().cache();
    assert!(cache.is_global(AssetKind::Data, "shared"));
    assert!(!cache.is_global(AssetKind::Data, "level"));
}

#[test]
fn changing_scene_cleans_up_and_unloads_locals() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("level").unwrap();
    run_until_idle(&mut stage, 0.016, 10);
    let level_node = stage.current_node().unwrap();

    stage.change_scene("menu").unwrap();
    run_until_idle(&mut stage, 0.016, 10);

    assert_eq!(stage.current_scene(), Some("menu"));
    assert_eq!(entries(&log, "level:cleanup").len(), 1);
    assert_eq!(entries(&log, "level:start").len(), 1);
    assert_eq!(entries(&log, "menu:start").len(), 1);
    assert!(stage.world().get_entity(level_node).is_err());

    let cache = stage.assets().cache();
    assert!(!cache.contains(AssetKind::Data, "level"));
    assert!(cache.contains(AssetKind::Data, "shared"));
}

#[test]
fn scene_node_is_attached_only_after_setup() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("menu").unwrap();
    assert!(entries(&log, "menu:setup-attached").is_empty());
    assert!(entries(&log, "menu:start-detached").is_empty());

    let node = stage.current_node().unwrap();
    let parent = stage.world().get::<ChildOf>(node).map(|c| c.parent());
    assert_eq!(parent, Some(stage.root()));
    assert!(matches!(
        stage.world().get::<StageNode>(node),
        Some(StageNode::Scene { id }) if id == "menu"
    ));
}

#[test]
fn scene_children_get_global_transforms() {
    let (mut stage, _log) = stage_with(0.0);
    stage.resize(640.0, 960.0);
    stage.change_scene("menu").unwrap();
    stage.update(0.016);

    let world = stage.world_mut();
    let mut query = world.query::<(&Position, &GlobalTransform2D, &ChildOf)>();
    let child = query
        .iter(world)
        .find(|(pos, _, _)| approx_eq(pos.pos.x, 10.0) && approx_eq(pos.pos.y, 20.0))
        .map(|(_, gt, _)| *gt)
        .expect("scene child missing");
    // Root sits at -(224, 272) * 2 with scale 2.
    assert!(approx_eq(child.position.x, -448.0 + 20.0));
    assert!(approx_eq(child.position.y, -544.0 + 40.0));
    assert!(approx_eq(child.scale.x, 2.0));
}

// =============================================================================
// Pacing and re-entrancy
// =============================================================================

#[test]
fn change_during_transition_is_refused() {
    let (mut stage, log) = stage_with(0.1);
    stage.change_scene("menu").unwrap();
    assert!(stage.is_transitioning());
    assert!(matches!(
        stage.change_scene("level"),
        Err(StageError::TransitionInProgress)
    ));

    run_until_idle(&mut stage, 0.04, 50);
    assert_eq!(stage.current_scene(), Some("menu"));
    assert!(entries(&log, "level:").is_empty());
}

#[test]
fn debounce_is_counted_in_frame_time() {
    let (mut stage, _log) = stage_with(0.1);
    stage.change_scene("menu").unwrap();
    assert_eq!(stage.phase(), TransitionPhase::Waiting);
    // Four pauses of 0.1s at 0.04s per frame: three frames each.
    let frames = run_until_idle(&mut stage, 0.04, 50);
    assert_eq!(frames, 12);
}

#[test]
fn scene_does_not_update_while_transitioning() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("menu").unwrap();
    stage.update(0.016);
    assert_eq!(entries(&log, "menu:update").len(), 1);

    stage.change_scene("level").unwrap();
    assert!(stage.is_transitioning());
    // The level load settles during this update; the old scene is gone and
    // the new one only starts, so nobody updates this frame.
    stage.update(0.016);
    assert!(!stage.is_transitioning());
    assert_eq!(entries(&log, "menu:update").len(), 1);
    assert!(entries(&log, "level:update").is_empty());

    stage.update(0.016);
    assert_eq!(entries(&log, "level:update").len(), 1);
}

// =============================================================================
// Curtains
// =============================================================================

type Ready = Rc<RefCell<Option<Result<(), StageError>>>>;

fn install(stage: &mut StageManager, path: &str) -> Ready {
    let ready: Ready = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&ready);
    stage.set_transition(Box::new(TimelineCurtain::new("curtain", path)), move |r| {
        *slot.borrow_mut() = Some(r)
    });
    stage.update(0.0);
    ready
}

#[test]
fn curtain_installs_after_its_assets_load() {
    let (mut stage, _log) = stage_with(0.0);
    let ready = install(&mut stage, "curtain.json");
    assert!(matches!(*ready.borrow(), Some(Ok(()))));
    let curtain = stage.curtain().expect("curtain not installed");
    assert_eq!(curtain.status(), CurtainStatus::Closed);
    assert!(
        stage
            .assets()
            .cache()
            .is_global(AssetKind::Animate, "curtain")
    );
}

#[test]
fn curtain_with_missing_markers_is_rejected() {
    let (mut stage, _log) = stage_with(0.0);
    let ready = install(&mut stage, "broken_curtain.json");
    match ready.borrow_mut().take() {
        Some(Err(StageError::Curtain(CurtainError::MissingMarkers(missing)))) => {
            assert_eq!(missing.len(), 5);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(stage.curtain().is_none());
}

#[test]
fn curtain_missing_file_reports_load_failure() {
    let (mut stage, _log) = stage_with(0.0);
    let ready = install(&mut stage, "nowhere.json");
    assert!(matches!(
        *ready.borrow(),
        Some(Err(StageError::CurtainLoad(_)))
    ));
}

#[test]
fn curtain_covers_then_reveals() {
    let (mut stage, log) = stage_with(0.0);
    install(&mut stage, "curtain.json");

    stage.change_scene("menu").unwrap();
    // First scene: covered instantly, reveal is playing.
    assert_eq!(stage.phase(), TransitionPhase::Revealing);
    assert_eq!(stage.curtain().map(|c| c.status()), Some(CurtainStatus::Opening));
    assert!(entries(&log, "menu:start").is_empty());

    run_until_idle(&mut stage, 0.1, 20);
    assert_eq!(stage.curtain().map(|c| c.status()), Some(CurtainStatus::Open));
    assert_eq!(entries(&log, "menu:start").len(), 1);

    stage.change_scene("level").unwrap();
    assert_eq!(stage.phase(), TransitionPhase::Covering);
    assert_eq!(stage.curtain().map(|c| c.status()), Some(CurtainStatus::Closing));
    assert!(entries(&log, "menu:cleanup").is_empty());

    run_until_idle(&mut stage, 0.1, 40);
    assert_eq!(stage.current_scene(), Some("level"));
    assert_eq!(entries(&log, "menu:cleanup").len(), 1);
}

#[test]
fn curtain_node_is_detached_between_transitions() {
    let (mut stage, _log) = stage_with(0.0);
    install(&mut stage, "curtain.json");
    stage.change_scene("menu").unwrap();
    assert!(
        stage
            .world_mut()
            .query::<(&StageNode, &ChildOf)>()
            .iter(stage.world())
            .any(|(node, _)| *node == StageNode::Curtain)
    );

    run_until_idle(&mut stage, 0.1, 20);
    let world = stage.world_mut();
    let attached = world
        .query::<(&StageNode, &ChildOf)>()
        .iter(world)
        .any(|(node, _)| *node == StageNode::Curtain);
    assert!(!attached);
}

// =============================================================================
// Pause and resize
// =============================================================================

#[test]
fn pause_halts_updates_and_notifies_scene() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("menu").unwrap();
    stage.update(0.016);

    stage.set_paused(true);
    stage.set_paused(true);
    assert!(stage.is_paused());
    assert!(stage.assets().sounds().is_paused());
    let frames = stage.world().resource::<WorldTime>().frame_count;
    stage.update(0.016);
    stage.update(0.016);
    assert_eq!(stage.world().resource::<WorldTime>().frame_count, frames);
    assert_eq!(entries(&log, "menu:update").len(), 1);

    stage.set_paused(false);
    stage.update(0.016);
    assert_eq!(entries(&log, "menu:update").len(), 2);
    assert_eq!(entries(&log, "menu:pause").len(), 1);
    assert_eq!(entries(&log, "menu:resume").len(), 1);
}

#[test]
fn resize_moves_and_scales_the_root() {
    let (mut stage, _log) = stage_with(0.0);
    let layout = stage.resize(2000.0, 1024.0);
    assert!(approx_eq(layout.offset.x, 616.0));
    assert!(approx_eq(layout.offset.y, 0.0));
    assert_eq!(stage.layout(), layout);

    let root = stage.root();
    let pos = stage.world().get::<Position>(root).unwrap();
    assert!(approx_eq(pos.pos.x, layout.root_position().x));
    assert!(approx_eq(pos.pos.y, layout.root_position().y));
}

#[test]
fn shutdown_cleans_up_and_empties_cache() {
    let (mut stage, log) = stage_with(0.0);
    stage.change_scene("level").unwrap();
    run_until_idle(&mut stage, 0.016, 10);
    stage.shutdown();
    assert_eq!(entries(&log, "level:cleanup").len(), 1);
    assert!(stage.assets().cache().is_empty());
    assert_eq!(stage.current_scene(), None);
}

#[test]
fn first_change_to_level_starts_once_after_reveal() {
    let (mut stage, log) = stage_with(0.05);
    install(&mut stage, "curtain.json");

    stage.change_scene("level").unwrap();
    // No prior scene: no cover animation, straight to the loading loop.
    assert_eq!(stage.curtain().map(|c| c.status()), Some(CurtainStatus::Loading));

    let mut revealed_before_start = false;
    for _ in 0..100 {
        stage.update(0.05);
        let started = !entries(&log, "level:start").is_empty();
        let open = stage.curtain().map(|c| c.status()) == Some(CurtainStatus::Open);
        if open && !started {
            revealed_before_start = true;
        }
        if !stage.is_transitioning() {
            break;
        }
    }
    assert!(!stage.is_transitioning());
    assert!(!revealed_before_start, "curtain opened before start ran");
    assert_eq!(stage.current_scene(), Some("level"));
    assert_eq!(
        entries(&log, "level:"),
        vec!["level:preload", "level:setup", "level:has-level", "level:has-shared", "level:start"]
    );
    assert_eq!(stage.curtain().map(|c| c.status()), Some(CurtainStatus::Open));
}
