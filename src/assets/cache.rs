//! In-memory asset storage.
//!
//! One [`AssetStore`] per resource kind. Each store keeps its entries plus the
//! set of ids that survive a normal unload (the global set). Every global id
//! is also present in the entries; removing an entry drops its global mark.

use super::descriptor::AssetKind;
use crate::curtain::Timeline;
use image::RgbaImage;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use std::sync::Arc;

/// Decoded RGBA image.
#[derive(Debug, Clone)]
pub struct Texture {
    image: Arc<RgbaImage>,
}

impl Texture {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major RGBA8 pixels.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

/// Undecoded audio bytes, handed to the audio backend as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundClip {
    bytes: Arc<[u8]>,
}

impl SoundClip {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Pixel rectangle of one spritesheet frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// A texture atlas with named frames.
#[derive(Debug, Clone)]
pub struct Spritesheet {
    pub texture: Texture,
    pub frames: FxHashMap<String, FrameRect>,
}

impl Spritesheet {
    pub fn frame(&self, name: &str) -> Option<FrameRect> {
        self.frames.get(name).copied()
    }
}

/// A decoded asset on its way into the cache.
#[derive(Debug)]
pub enum LoadedAsset {
    Texture {
        id: String,
        texture: Texture,
    },
    Sound {
        id: String,
        clip: SoundClip,
        context: crate::sound::SoundContextKind,
        volume: f32,
        looped: bool,
    },
    Data {
        id: String,
        value: serde_json::Value,
    },
    Spritesheet {
        id: String,
        sheet: Spritesheet,
    },
    Timeline {
        id: String,
        timeline: Arc<Timeline>,
    },
}

impl LoadedAsset {
    pub fn id(&self) -> &str {
        match self {
            LoadedAsset::Texture { id, .. }
            | LoadedAsset::Sound { id, .. }
            | LoadedAsset::Data { id, .. }
            | LoadedAsset::Spritesheet { id, .. }
            | LoadedAsset::Timeline { id, .. } => id,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            LoadedAsset::Texture { .. } => AssetKind::Image,
            LoadedAsset::Sound { .. } => AssetKind::Sound,
            LoadedAsset::Data { .. } => AssetKind::Data,
            LoadedAsset::Spritesheet { .. } => AssetKind::Spritesheet,
            LoadedAsset::Timeline { .. } => AssetKind::Animate,
        }
    }
}

/// Entries of one kind plus the ids marked global.
#[derive(Debug)]
pub struct AssetStore<T> {
    entries: FxHashMap<String, T>,
    global: FxHashSet<String>,
}

impl<T> Default for AssetStore<T> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            global: FxHashSet::default(),
        }
    }
}

impl<T> AssetStore<T> {
    pub fn get(&self, id: &str) -> Option<&T> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn is_global(&self, id: &str) -> bool {
        self.global.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn global_ids(&self) -> impl Iterator<Item = &str> {
        self.global.iter().map(String::as_str)
    }

    pub(crate) fn insert(&mut self, id: String, value: T) -> Option<T> {
        self.entries.insert(id, value)
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<T> {
        self.global.remove(id);
        self.entries.remove(id)
    }

    /// Mark a cached id global. Returns `false` if the id is not cached.
    pub(crate) fn mark_global(&mut self, id: &str) -> bool {
        if !self.entries.contains_key(id) {
            return false;
        }
        self.global.insert(id.to_string());
        true
    }

    pub(crate) fn clear_globals(&mut self) {
        self.global.clear();
    }

    /// Remove every entry not marked global; returns the removed ids.
    pub(crate) fn evict_local(&mut self) -> Vec<String> {
        let local: Vec<String> = self
            .entries
            .keys()
            .filter(|id| !self.global.contains(*id))
            .cloned()
            .collect();
        for id in &local {
            self.entries.remove(id);
        }
        local
    }
}

/// Everything the asset manager has loaded, by kind.
#[derive(Debug, Default)]
pub struct AssetCache {
    textures: AssetStore<Texture>,
    sounds: AssetStore<SoundClip>,
    data: AssetStore<serde_json::Value>,
    spritesheets: AssetStore<Spritesheet>,
    timelines: AssetStore<Arc<Timeline>>,
}

impl AssetCache {
    pub fn textures(&self) -> &AssetStore<Texture> {
        &self.textures
    }

    pub fn sounds(&self) -> &AssetStore<SoundClip> {
        &self.sounds
    }

    pub fn data(&self) -> &AssetStore<serde_json::Value> {
        &self.data
    }

    pub fn spritesheets(&self) -> &AssetStore<Spritesheet> {
        &self.spritesheets
    }

    pub fn timelines(&self) -> &AssetStore<Arc<Timeline>> {
        &self.timelines
    }

    pub fn contains(&self, kind: AssetKind, id: &str) -> bool {
        match kind {
            AssetKind::Image => self.textures.contains(id),
            AssetKind::Sound => self.sounds.contains(id),
            AssetKind::Data => self.data.contains(id),
            AssetKind::Spritesheet => self.spritesheets.contains(id),
            AssetKind::Animate => self.timelines.contains(id),
        }
    }

    pub fn is_global(&self, kind: AssetKind, id: &str) -> bool {
        match kind {
            AssetKind::Image => self.textures.is_global(id),
            AssetKind::Sound => self.sounds.is_global(id),
            AssetKind::Data => self.data.is_global(id),
            AssetKind::Spritesheet => self.spritesheets.is_global(id),
            AssetKind::Animate => self.timelines.is_global(id),
        }
    }

    /// Total entries across all kinds.
    pub fn len(&self) -> usize {
        self.textures.len()
            + self.sounds.len()
            + self.data.len()
            + self.spritesheets.len()
            + self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn insert(&mut self, asset: LoadedAsset) {
        match asset {
            LoadedAsset::Texture { id, texture } => {
                self.textures.insert(id, texture);
            }
            LoadedAsset::Sound { id, clip, .. } => {
                self.sounds.insert(id, clip);
            }
            LoadedAsset::Data { id, value } => {
                self.data.insert(id, value);
            }
            LoadedAsset::Spritesheet { id, sheet } => {
                self.spritesheets.insert(id, sheet);
            }
            LoadedAsset::Timeline { id, timeline } => {
                self.timelines.insert(id, timeline);
            }
        }
    }

    pub(crate) fn mark_global(&mut self, kind: AssetKind, id: &str) -> bool {
        match kind {
            AssetKind::Image => self.textures.mark_global(id),
            AssetKind::Sound => self.sounds.mark_global(id),
            AssetKind::Data => self.data.mark_global(id),
            AssetKind::Spritesheet => self.spritesheets.mark_global(id),
            AssetKind::Animate => self.timelines.mark_global(id),
        }
    }

    /// Evict non-global entries of every kind. With `include_global` the
    /// global sets are cleared first, so everything goes.
    pub(crate) fn evict(&mut self, include_global: bool) -> Vec<(AssetKind, String)> {
        if include_global {
            self.textures.clear_globals();
            self.sounds.clear_globals();
            self.data.clear_globals();
            self.spritesheets.clear_globals();
            self.timelines.clear_globals();
        }
        let mut evicted = Vec::new();
        let mut push = |kind: AssetKind, ids: Vec<String>| {
            evicted.extend(ids.into_iter().map(|id| (kind, id)));
        };
        push(AssetKind::Image, self.textures.evict_local());
        push(AssetKind::Sound, self.sounds.evict_local());
        push(AssetKind::Data, self.data.evict_local());
        push(AssetKind::Spritesheet, self.spritesheets.evict_local());
        push(AssetKind::Animate, self.timelines.evict_local());
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(id: &str) -> LoadedAsset {
        LoadedAsset::Data {
            id: id.to_string(),
            value: json!({ "id": id }),
        }
    }

    #[test]
    fn test_mark_global_requires_entry() {
        let mut store: AssetStore<u32> = AssetStore::default();
        assert!(!store.mark_global("missing"));
        store.insert("a".into(), 1);
        assert!(store.mark_global("a"));
        assert!(store.is_global("a"));
    }

    #[test]
    fn test_remove_drops_global_mark() {
        let mut store: AssetStore<u32> = AssetStore::default();
        store.insert("a".into(), 1);
        store.mark_global("a");
        assert_eq!(store.remove("a"), Some(1));
        assert!(!store.is_global("a"));
        assert_eq!(store.global_ids().count(), 0);
    }

    #[test]
    fn test_evict_keeps_globals() {
        let mut cache = AssetCache::default();
        cache.insert(data("keep"));
        cache.insert(data("drop"));
        assert!(cache.mark_global(AssetKind::Data, "keep"));

        let evicted = cache.evict(false);
        assert_eq!(evicted, vec![(AssetKind::Data, "drop".to_string())]);
        assert!(cache.contains(AssetKind::Data, "keep"));
        assert!(!cache.contains(AssetKind::Data, "drop"));
    }

    #[test]
    fn test_evict_including_globals_empties_cache() {
        let mut cache = AssetCache::default();
        cache.insert(data("keep"));
        cache.mark_global(AssetKind::Data, "keep");
        cache.insert(LoadedAsset::Texture {
            id: "tex".into(),
            texture: Texture::new(RgbaImage::new(1, 1)),
        });

        let evicted = cache.evict(true);
        assert_eq!(evicted.len(), 2);
        assert!(cache.is_empty());
        assert!(!cache.is_global(AssetKind::Data, "keep"));
    }

    #[test]
    fn test_kinds_are_separate_namespaces() {
        let mut cache = AssetCache::default();
        cache.insert(data("hero"));
        cache.insert(LoadedAsset::Texture {
            id: "hero".into(),
            texture: Texture::new(RgbaImage::new(2, 3)),
        });
        assert_eq!(cache.len(), 2);
        let tex = cache.textures().get("hero").unwrap();
        assert_eq!((tex.width(), tex.height()), (2, 3));
        assert_eq!(tex.pixels().len(), 2 * 3 * 4);
    }
}
