//! Stagehand demo entry point.
//!
//! Runs a headless stage for a fixed number of frames:
//! - an in-memory asset source with a manifest, a curtain timeline, a PNG,
//!   a sound, and some JSON data;
//! - two scenes, `menu` and `level1`, where the menu asks for `level1` once
//!   its logo tween finishes;
//! - a timeline curtain covering every change;
//! - the headless mixer standing in for an audio device.
//!
//! Everything interesting is logged; raise the filter to see each step:
//!
//! ```sh
//! RUST_LOG=debug cargo run -- --frames 240 --fps 60
//! ```

use clap::Parser;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use stagehand::assets::{AssetDescriptor, AssetManager, MemorySource};
use stagehand::clock::FrameClock;
use stagehand::components::position::Position;
use stagehand::curtain::{TimelineCurtain, timeline_with_markers};
use stagehand::mixer::spawn_headless_mixer;
use stagehand::resources::stageconfig::StageConfig;
use stagehand::scene::{Scene, SceneContext};
use stagehand::sound::SoundLayer;
use stagehand::timer::PauseableTimer;
use stagehand::tween::Tween;
use stagehand::{Completion, StageManager};
use std::cell::RefCell;
use std::io::Cursor;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

/// Headless scene stage demo
#[derive(Parser)]
#[command(version, about = "Runs a headless stagehand demo and logs the scene lifecycle.")]
struct Cli {
    /// INI file with stage settings. Missing keys keep their defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, default_value_t = 300)]
    frames: u32,

    /// Simulated frame rate.
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Scene to open first.
    #[arg(long, default_value = "menu")]
    scene: String,
}

/// Scene id a scene wants the stage to switch to.
type SceneRequest = Rc<RefCell<Option<String>>>;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
    let mut out = Cursor::new(Vec::new());
    if let Err(e) = image.write_to(&mut out, ImageFormat::Png) {
        log::error!("could not encode demo image: {}", e);
    }
    out.into_inner()
}

fn demo_source() -> MemorySource {
    let timeline = serde_json::to_vec(&timeline_with_markers(30.0, 12)).unwrap_or_default();
    let menu_manifest = json!([
        { "type": "image", "id": "logo", "path": "images/logo.png" },
        { "type": "sound", "id": "click", "path": "sounds/click.raw", "context": "sfx", "volume": 0.8 },
        { "type": "data", "id": "menu_items", "data": ["Play", "Options", "Quit"] }
    ]);
    let level_manifest = json!([
        { "type": "manifest", "id": "shared", "path": "manifests/shared.json" },
        { "type": "data", "id": "level", "path": "data/level1.json" }
    ]);
    let shared_manifest = json!([
        { "type": "sound", "id": "theme", "path": "sounds/theme.raw", "context": "music", "loop": true, "isGlobal": true }
    ]);
    let level = json!({ "name": "Level 1", "spawns": [[40, 80], [160, 240], [280, 400]] });

    MemorySource::new()
        .with("curtain/curtain.json", timeline)
        .with("manifests/menu.json", menu_manifest.to_string())
        .with("manifests/level1.json", level_manifest.to_string())
        .with("manifests/shared.json", shared_manifest.to_string())
        .with("images/logo.png", png_bytes(64, 32))
        .with("sounds/click.raw", vec![0u8; 4410])
        .with("sounds/theme.raw", vec![0u8; 88200])
        .with("data/level1.json", level.to_string())
}

struct MenuScene {
    next: SceneRequest,
    logo: Rc<RefCell<Position>>,
    logo_node: Option<bevy_ecs::entity::Entity>,
    intro: Option<Tween<Position>>,
}

impl MenuScene {
    fn new(next: SceneRequest) -> Self {
        Self {
            next,
            logo: Rc::new(RefCell::new(Position::new(160.0, -40.0))),
            logo_node: None,
            intro: None,
        }
    }
}

impl Scene for MenuScene {
    fn preload(&mut self, _ctx: &mut SceneContext) -> Completion<Vec<AssetDescriptor>> {
        Completion::resolved(vec![AssetDescriptor::manifest("menu", "manifests/menu.json")])
    }

    fn setup(&mut self, ctx: &mut SceneContext) -> Completion<()> {
        if let Some(logo) = ctx.assets.textures().get("logo") {
            log::info!("menu: logo is {}x{}", logo.width(), logo.height());
        }
        let start = *self.logo.borrow();
        self.logo_node = Some(ctx.spawn_child(start));

        let items = ctx
            .assets
            .data()
            .get("menu_items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for (i, item) in items.iter().enumerate() {
            ctx.spawn_at(160.0, 240.0 + i as f32 * 40.0);
            log::info!("menu: item {} = {}", i, item);
        }
        Completion::resolved(())
    }

    fn start(&mut self, ctx: &mut SceneContext) {
        let tween = Tween::new(ctx.clock, Rc::clone(&self.logo), &[("y", 120.0)], 1.0, "cubic_out");
        self.intro = Some(tween);
    }

    fn update(&mut self, _dt: f32, ctx: &mut SceneContext) {
        if let Some(node) = self.logo_node
            && let Some(mut pos) = ctx.world.get_mut::<Position>(node)
        {
            *pos = *self.logo.borrow();
        }
        let done = self.intro.as_ref().is_some_and(|t| t.is_finished());
        if done && self.intro.take().is_some() {
            ctx.sounds.play("click");
            log::info!("menu: intro finished, requesting level1");
            *self.next.borrow_mut() = Some("level1".to_string());
        }
    }

    fn cleanup(&mut self, _ctx: &mut SceneContext) {
        if let Some(tween) = self.intro.take() {
            tween.cancel();
        }
    }
}

struct LevelScene {
    ticker: Option<PauseableTimer>,
    ticks: Rc<RefCell<u32>>,
}

impl LevelScene {
    fn new() -> Self {
        Self {
            ticker: None,
            ticks: Rc::new(RefCell::new(0)),
        }
    }

    fn start_ticker(&mut self, clock: &FrameClock) {
        let ticks = Rc::clone(&self.ticks);
        self.ticker = Some(PauseableTimer::repeating(clock, 0.5, move || {
            *ticks.borrow_mut() += 1;
            log::info!("level1: tick {}", ticks.borrow());
        }));
    }
}

impl Scene for LevelScene {
    fn preload(&mut self, _ctx: &mut SceneContext) -> Completion<Vec<AssetDescriptor>> {
        Completion::resolved(vec![AssetDescriptor::manifest("level1", "manifests/level1.json")])
    }

    fn setup(&mut self, ctx: &mut SceneContext) -> Completion<()> {
        let spawns = ctx
            .assets
            .data()
            .get("level")
            .and_then(|v| v.get("spawns"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for spawn in &spawns {
            let x = spawn.get(0).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            let y = spawn.get(1).and_then(|v| v.as_f64()).unwrap_or(0.0) as f32;
            ctx.spawn_at(x, y);
        }
        log::info!("level1: {} spawn points", spawns.len());
        Completion::resolved(())
    }

    fn start(&mut self, ctx: &mut SceneContext) {
        ctx.sounds.play("theme");
        self.start_ticker(ctx.clock);
    }

    fn pause(&mut self, paused: bool, _ctx: &mut SceneContext) {
        if let Some(ticker) = &self.ticker {
            ticker.pause(paused);
        }
    }

    fn cleanup(&mut self, ctx: &mut SceneContext) {
        ctx.sounds.stop("theme");
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => StageConfig::with_path(path),
        None => StageConfig::new(),
    };
    if cli.config.is_some()
        && let Err(e) = config.load_from_file()
    {
        log::warn!("{}; using defaults", e);
    }

    let (sounds, endpoint) = SoundLayer::connected();
    let mixer = match spawn_headless_mixer(endpoint) {
        Ok(mixer) => Some(mixer),
        Err(e) => {
            log::error!("could not start mixer thread: {}", e);
            None
        }
    };
    let assets = AssetManager::new(Arc::new(demo_source()), config.fetch_workers, sounds);
    let mut stage = StageManager::new(config, assets);

    let next: SceneRequest = Rc::new(RefCell::new(None));
    let menu_next = Rc::clone(&next);
    stage.add_scene("menu", move || Box::new(MenuScene::new(Rc::clone(&menu_next))));
    stage.add_scene("level1", || Box::new(LevelScene::new()));

    stage.set_transition(
        Box::new(TimelineCurtain::new("curtain", "curtain/curtain.json")),
        |result| match result {
            Ok(()) => log::info!("curtain ready"),
            Err(e) => log::error!("curtain unavailable: {}", e),
        },
    );

    let dt = 1.0 / cli.fps.max(1.0);
    // Let the curtain install before the first change.
    if !stage.assets_mut().wait_idle(std::time::Duration::from_secs(2)) {
        log::warn!("curtain assets still loading, first change runs uncovered");
    }
    stage.update(0.0);
    if let Err(e) = stage.change_scene(&cli.scene) {
        log::error!("{}", e);
        std::process::exit(1);
    }

    for frame in 0..cli.frames {
        if let Some(id) = next.borrow_mut().take()
            && let Err(e) = stage.change_scene(&id)
        {
            log::warn!("frame {}: {}", frame, e);
        }
        stage.update(dt);
        // Background fetches need real time to land.
        if stage.assets().is_loading() {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    log::info!(
        "ran {} frames, ending on scene {:?} with {} cached asset(s)",
        cli.frames,
        stage.current_scene(),
        stage.assets().cache().len()
    );
    stage.shutdown();
    if let Some(mixer) = mixer {
        mixer.join();
    }
}
