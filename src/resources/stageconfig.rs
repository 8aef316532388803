//! Stage configuration resource.
//!
//! Settings loaded from an INI configuration file. Provides defaults for safe
//! startup and methods to load/save configuration.
//!
//! # Configuration File Format
//!
//! ```ini
//! [stage]
//! min_width = 320
//! min_height = 480
//! max_width = 768
//! max_height = 1024
//! debounce = 0.1
//!
//! [assets]
//! root = ./assets
//! fetch_workers = 2
//! load_policy = fail_fast
//!
//! [audio]
//! global_volume = 1.0
//! sfx_volume = 1.0
//! vo_volume = 1.0
//! music_volume = 1.0
//! ```

use crate::assets::LoadPolicy;
use crate::resources::stagelayout::LogicalSize;
use crate::sound::{SoundContextKind, SoundLayer};
use bevy_ecs::prelude::*;
use configparser::ini::Ini;
use log::{info, warn};
use std::path::PathBuf;

/// Default safe values for startup
const DEFAULT_MIN_SIZE: LogicalSize = LogicalSize::new(320.0, 480.0);
const DEFAULT_MAX_SIZE: LogicalSize = LogicalSize::new(768.0, 1024.0);
const DEFAULT_DEBOUNCE: f32 = 0.1;
const DEFAULT_ASSET_ROOT: &str = "./assets";
const DEFAULT_FETCH_WORKERS: usize = 2;
const DEFAULT_CONFIG_PATH: &str = "./stage.ini";

/// Stage configuration resource.
#[derive(Resource, Debug, Clone)]
pub struct StageConfig {
    /// Logical size at the narrow end of the supported aspect range.
    pub min_size: LogicalSize,
    /// Logical size at the wide end of the supported aspect range.
    pub max_size: LogicalSize,
    /// Pause between transition steps, in seconds of frame time.
    pub debounce: f32,
    /// Directory the file asset source reads from.
    pub asset_root: PathBuf,
    /// Background fetch threads; 0 fetches inline.
    pub fetch_workers: usize,
    pub load_policy: LoadPolicy,
    pub global_volume: f32,
    pub sfx_volume: f32,
    pub vo_volume: f32,
    pub music_volume: f32,
    /// Path to the configuration file.
    pub config_path: PathBuf,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_policy(value: &str) -> Option<LoadPolicy> {
    match value.parse() {
        Ok(policy) => Some(policy),
        Err(()) => {
            warn!("Unknown load_policy '{}', keeping current", value);
            None
        }
    }
}

impl StageConfig {
    /// Create a new configuration with safe default values.
    pub fn new() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            max_size: DEFAULT_MAX_SIZE,
            debounce: DEFAULT_DEBOUNCE,
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            fetch_workers: DEFAULT_FETCH_WORKERS,
            load_policy: LoadPolicy::default(),
            global_volume: 1.0,
            sfx_volume: 1.0,
            vo_volume: 1.0,
            music_volume: 1.0,
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    /// Create a new configuration with a custom config file path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
            ..Self::new()
        }
    }

    /// Load configuration from the INI file.
    ///
    /// Missing values retain their current (default) values.
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(&mut self) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .load(&self.config_path)
            .map_err(|e| format!("Failed to load config file: {}", e))?;
        self.apply(&config);
        Ok(())
    }

    /// Load configuration from INI text.
    pub fn load_from_str(&mut self, text: &str) -> Result<(), String> {
        let mut config = Ini::new();
        config
            .read(text.to_string())
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        self.apply(&config);
        Ok(())
    }

    fn apply(&mut self, config: &Ini) {
        let float = |section: &str, key: &str| {
            config
                .getfloat(section, key)
                .ok()
                .flatten()
                .map(|v| v as f32)
        };

        // [stage] section
        if let Some(w) = float("stage", "min_width") {
            self.min_size.width = w;
        }
        if let Some(h) = float("stage", "min_height") {
            self.min_size.height = h;
        }
        if let Some(w) = float("stage", "max_width") {
            self.max_size.width = w;
        }
        if let Some(h) = float("stage", "max_height") {
            self.max_size.height = h;
        }
        if let Some(d) = float("stage", "debounce") {
            self.debounce = d.max(0.0);
        }

        // [assets] section
        if let Some(root) = config.get("assets", "root") {
            self.asset_root = PathBuf::from(root);
        }
        if let Some(workers) = config.getuint("assets", "fetch_workers").ok().flatten() {
            self.fetch_workers = workers as usize;
        }
        if let Some(policy) = config.get("assets", "load_policy").as_deref().and_then(parse_policy)
        {
            self.load_policy = policy;
        }

        // [audio] section
        if let Some(v) = float("audio", "global_volume") {
            self.global_volume = v.clamp(0.0, 1.0);
        }
        if let Some(v) = float("audio", "sfx_volume") {
            self.sfx_volume = v.clamp(0.0, 1.0);
        }
        if let Some(v) = float("audio", "vo_volume") {
            self.vo_volume = v.clamp(0.0, 1.0);
        }
        if let Some(v) = float("audio", "music_volume") {
            self.music_volume = v.clamp(0.0, 1.0);
        }

        if self.min_size.width <= 0.0
            || self.min_size.height <= 0.0
            || self.max_size.width <= 0.0
            || self.max_size.height <= 0.0
        {
            warn!("Non-positive stage size in config, using defaults");
            self.min_size = DEFAULT_MIN_SIZE;
            self.max_size = DEFAULT_MAX_SIZE;
        }

        info!(
            "Loaded config: stage {}x{}..{}x{}, debounce={}s, assets={:?} ({} workers, {:?})",
            self.min_size.width,
            self.min_size.height,
            self.max_size.width,
            self.max_size.height,
            self.debounce,
            self.asset_root,
            self.fetch_workers,
            self.load_policy
        );
    }

    /// Save configuration to the INI file.
    ///
    /// Creates the file if it doesn't exist.
    pub fn save_to_file(&self) -> Result<(), String> {
        let mut config = Ini::new();

        // [stage] section
        config.set("stage", "min_width", Some(self.min_size.width.to_string()));
        config.set("stage", "min_height", Some(self.min_size.height.to_string()));
        config.set("stage", "max_width", Some(self.max_size.width.to_string()));
        config.set("stage", "max_height", Some(self.max_size.height.to_string()));
        config.set("stage", "debounce", Some(self.debounce.to_string()));

        // [assets] section
        config.set(
            "assets",
            "root",
            Some(self.asset_root.to_string_lossy().into_owned()),
        );
        config.set("assets", "fetch_workers", Some(self.fetch_workers.to_string()));
        let policy = match self.load_policy {
            LoadPolicy::FailFast => "fail_fast",
            LoadPolicy::Tolerant => "tolerant",
        };
        config.set("assets", "load_policy", Some(policy.to_string()));

        // [audio] section
        config.set("audio", "global_volume", Some(self.global_volume.to_string()));
        config.set("audio", "sfx_volume", Some(self.sfx_volume.to_string()));
        config.set("audio", "vo_volume", Some(self.vo_volume.to_string()));
        config.set("audio", "music_volume", Some(self.music_volume.to_string()));

        config
            .write(&self.config_path)
            .map_err(|e| format!("Failed to save config file: {}", e))?;

        info!("Saved config to {:?}", self.config_path);

        Ok(())
    }

    /// Push the configured volumes into a sound layer.
    pub fn apply_volumes(&self, sounds: &mut SoundLayer) {
        sounds.set_global_volume(self.global_volume);
        sounds.set_context_volume(SoundContextKind::Sfx, self.sfx_volume);
        sounds.set_context_volume(SoundContextKind::Vo, self.vo_volume);
        sounds.set_context_volume(SoundContextKind::Music, self.music_volume);
    }
}
