//! Integration tests for the asset pipeline: manifests, lifetimes, policies,
//! and background fetching.
//!
//! # Usage
//!
//! ```sh
//! cargo test --test assets_integration
//! ```

use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use image::{ImageFormat, RgbaImage};
use serde_json::json;

use stagehand::assets::{
    AssetDescriptor, AssetKind, AssetManager, LoadPolicy, LoadSummary, MemorySource,
};
use stagehand::error::AssetError;
use stagehand::sound::{SoundContextKind, SoundLayer};

type Outcome = Rc<RefCell<Option<Result<LoadSummary, AssetError>>>>;

fn png(w: u32, h: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::new(w, h)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

fn manager(source: MemorySource) -> AssetManager {
    AssetManager::new(Arc::new(source), 0, SoundLayer::detached())
}

fn load(assets: &mut AssetManager, descriptors: Vec<AssetDescriptor>) -> Outcome {
    let outcome: Outcome = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&outcome);
    assets
        .load(descriptors, move |r| *slot.borrow_mut() = Some(r))
        .unwrap();
    outcome
}

fn settle(assets: &mut AssetManager, outcome: &Outcome) -> Result<LoadSummary, AssetError> {
    assert!(assets.wait_idle(Duration::from_secs(5)), "loads never settled");
    outcome.borrow_mut().take().expect("callback did not run")
}

fn sorted_ids(assets: &AssetManager) -> Vec<String> {
    let cache = assets.cache();
    let mut ids: Vec<String> = cache
        .textures()
        .ids()
        .chain(cache.data().ids())
        .chain(cache.sounds().ids())
        .map(str::to_string)
        .collect();
    ids.sort();
    ids
}

fn game_source() -> MemorySource {
    MemorySource::new()
        .with("img/hero.png", png(8, 4))
        .with("data/level.json", json!({ "name": "one" }).to_string())
        .with("sfx/jump.raw", vec![1u8; 32])
        .with(
            "manifests/level.json",
            json!([
                { "type": "image", "id": "hero", "path": "img/hero.png" },
                { "type": "manifest", "id": "audio", "path": "manifests/audio.json" },
                { "type": "data", "id": "level", "path": "data/level.json" }
            ])
            .to_string(),
        )
        .with(
            "manifests/audio.json",
            json!([
                { "type": "sound", "id": "jump", "path": "sfx/jump.raw", "context": "sfx", "volume": 0.5 }
            ])
            .to_string(),
        )
}

// =============================================================================
// Manifests
// =============================================================================

#[test]
fn manifest_load_matches_flat_list() {
    let mut via_manifest = manager(game_source());
    let outcome = load(
        &mut via_manifest,
        vec![AssetDescriptor::manifest("level", "manifests/level.json")],
    );
    let summary = settle(&mut via_manifest, &outcome).unwrap();
    assert_eq!(summary.loaded.len(), 3);

    let mut flat = manager(game_source());
    let outcome = load(
        &mut flat,
        vec![
            AssetDescriptor::image("hero", "img/hero.png"),
            AssetDescriptor::sound("jump", "sfx/jump.raw", SoundContextKind::Sfx, 0.5),
            AssetDescriptor::data("level", "data/level.json"),
        ],
    );
    settle(&mut flat, &outcome).unwrap();

    assert_eq!(sorted_ids(&via_manifest), sorted_ids(&flat));
    assert_eq!(sorted_ids(&flat), vec!["hero", "jump", "level"]);
}

#[test]
fn global_manifest_makes_children_global() {
    let mut assets = manager(game_source());
    let outcome = load(
        &mut assets,
        vec![AssetDescriptor::manifest("level", "manifests/level.json").global()],
    );
    settle(&mut assets, &outcome).unwrap();

    let cache = assets.cache();
    assert!(cache.is_global(AssetKind::Image, "hero"));
    assert!(cache.is_global(AssetKind::Sound, "jump"));
    assert!(cache.is_global(AssetKind::Data, "level"));
}

#[test]
fn manifest_cycle_is_reported() {
    let source = MemorySource::new()
        .with(
            "a.json",
            json!([{ "type": "manifest", "id": "b", "path": "b.json" }]).to_string(),
        )
        .with(
            "b.json",
            json!([{ "type": "manifest", "id": "a", "path": "a.json" }]).to_string(),
        );
    let mut assets = manager(source);
    let outcome = load(&mut assets, vec![AssetDescriptor::manifest("a", "a.json")]);
    match settle(&mut assets, &outcome) {
        Err(AssetError::ManifestCycle { path }) => assert_eq!(path, "a.json"),
        other => panic!("expected a cycle error, got {:?}", other),
    }
    assert!(assets.cache().is_empty());
}

// =============================================================================
// Lifetimes
// =============================================================================

#[test]
fn globals_survive_scene_unload() {
    let mut assets = manager(game_source());
    let outcome = load(
        &mut assets,
        vec![
            AssetDescriptor::image("hero", "img/hero.png").global(),
            AssetDescriptor::data("level", "data/level.json"),
        ],
    );
    settle(&mut assets, &outcome).unwrap();
    assert_eq!(assets.cache().len(), 2);

    assert_eq!(assets.unload(false), 1);
    assert!(assets.cache().contains(AssetKind::Image, "hero"));
    assert!(!assets.cache().contains(AssetKind::Data, "level"));

    assert_eq!(assets.unload(true), 1);
    assert!(assets.cache().is_empty());
}

#[test]
fn cached_id_is_skipped_and_promoted_to_global() {
    let mut assets = manager(game_source());
    let first = load(&mut assets, vec![AssetDescriptor::data("level", "data/level.json")]);
    settle(&mut assets, &first).unwrap();
    assert!(!assets.cache().is_global(AssetKind::Data, "level"));

    let second = load(
        &mut assets,
        vec![AssetDescriptor::data("level", "data/level.json").global()],
    );
    let summary = settle(&mut assets, &second).unwrap();
    assert!(summary.loaded.is_empty());
    assert_eq!(summary.skipped, vec![(AssetKind::Data, "level".to_string())]);
    assert!(assets.cache().is_global(AssetKind::Data, "level"));

    assets.unload(false);
    assert!(assets.cache().contains(AssetKind::Data, "level"));
}

#[test]
fn sounds_follow_the_cache() {
    let mut assets = manager(game_source());
    let outcome = load(
        &mut assets,
        vec![AssetDescriptor::manifest("audio", "manifests/audio.json")],
    );
    settle(&mut assets, &outcome).unwrap();
    assert_eq!(assets.sounds().context_of("jump"), Some(SoundContextKind::Sfx));
    assert_eq!(assets.sounds().effective_volume("jump"), Some(0.5));

    assets.unload(false);
    assert!(!assets.sounds().contains("jump"));
}

#[test]
fn global_load_refused_while_scene_assets_load() {
    let mut assets = manager(game_source());
    let scene = load(&mut assets, vec![AssetDescriptor::data("level", "data/level.json")]);
    let global = load(
        &mut assets,
        vec![AssetDescriptor::image("hero", "img/hero.png").global()],
    );

    assert!(assets.wait_idle(Duration::from_secs(5)));
    assert!(scene.borrow_mut().take().unwrap().is_ok());
    assert!(matches!(
        global.borrow_mut().take().unwrap(),
        Err(AssetError::GlobalLoadDuringScene)
    ));
    assert!(!assets.cache().contains(AssetKind::Image, "hero"));
}

// =============================================================================
// Failure policies
// =============================================================================

fn half_broken() -> Vec<AssetDescriptor> {
    vec![
        AssetDescriptor::data("level", "data/level.json"),
        AssetDescriptor::image("ghost", "img/missing.png"),
    ]
}

#[test]
fn fail_fast_rejects_the_batch() {
    let mut assets = manager(game_source());
    let outcome = load(&mut assets, half_broken());
    match settle(&mut assets, &outcome) {
        Err(AssetError::Fetch { path, .. }) => assert_eq!(path, "img/missing.png"),
        other => panic!("expected a fetch error, got {:?}", other),
    }
}

#[test]
fn tolerant_policy_reports_and_continues() {
    let mut assets = manager(game_source()).with_policy(LoadPolicy::Tolerant);
    let outcome = load(&mut assets, half_broken());
    let summary = settle(&mut assets, &outcome).unwrap();
    assert_eq!(summary.loaded, vec![(AssetKind::Data, "level".to_string())]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "ghost");
    assert!(assets.cache().contains(AssetKind::Data, "level"));
}

#[test]
fn invalid_descriptor_is_refused_up_front() {
    let mut assets = manager(game_source());
    let called = Rc::new(RefCell::new(false));
    let c = Rc::clone(&called);
    let result = assets.load(
        vec![AssetDescriptor::sound("loud", "sfx/jump.raw", SoundContextKind::Sfx, 2.0)],
        move |_| *c.borrow_mut() = true,
    );
    assert!(matches!(result, Err(AssetError::InvalidDescriptor { .. })));
    assets.poll();
    assert!(!*called.borrow());
}

// =============================================================================
// Worker threads
// =============================================================================

#[test]
fn worker_pool_decodes_in_background() {
    let source = game_source()
        .with("sheets/hero.png", png(16, 16))
        .with(
            "sheets/hero.json",
            json!({
                "frames": { "idle": { "frame": { "x": 0, "y": 0, "w": 8, "h": 8 } } },
                "meta": { "image": "hero.png" }
            })
            .to_string(),
        );
    let mut assets = AssetManager::new(Arc::new(source), 2, SoundLayer::detached());
    let outcome = load(
        &mut assets,
        vec![
            AssetDescriptor::manifest("level", "manifests/level.json"),
            AssetDescriptor::spritesheet("hero_sheet", "sheets/hero.json"),
        ],
    );
    let summary = settle(&mut assets, &outcome).unwrap();
    assert_eq!(summary.loaded.len(), 4);

    let hero = assets.cache().textures().get("hero").unwrap();
    assert_eq!((hero.width(), hero.height()), (8, 4));
    let sheet = assets.cache().spritesheets().get("hero_sheet").unwrap();
    assert_eq!(sheet.texture.width(), 16);
    assert_eq!(sheet.frame("idle").map(|f| f.w), Some(8));
    assert!(!assets.is_loading());
}
