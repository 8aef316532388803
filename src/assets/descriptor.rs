//! Asset descriptors: what to load and how to classify it.
//!
//! Descriptors are a closed sum type tagged on `type` so manifest files can
//! be read straight from JSON:
//!
//! ```json
//! [
//!   { "type": "image", "id": "logo", "path": "images/logo.png", "isGlobal": true },
//!   { "type": "sound", "id": "click", "path": "sfx/click.ogg", "context": "sfx", "volume": 0.5 },
//!   { "type": "data", "id": "levels", "path": "data/levels.json" },
//!   { "type": "manifest", "id": "level1", "path": "manifests/level1.json" }
//! ]
//! ```

use crate::error::AssetError;
use crate::sound::SoundContextKind;
use serde::{Deserialize, Serialize};

/// Resource kinds held by the [`AssetCache`](super::AssetCache).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Image,
    Sound,
    Data,
    Spritesheet,
    Animate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAsset {
    pub id: String,
    pub path: String,
    /// Children of a global manifest are loaded as global.
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAsset {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub is_global: bool,
}

fn default_volume() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoundAsset {
    pub id: String,
    pub path: String,
    #[serde(default)]
    pub is_global: bool,
    /// Volume group the sound joins once loaded.
    #[serde(default)]
    pub context: SoundContextKind,
    /// Base volume before context and global multipliers.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// Default playback mode for [`SoundLayer::play`](crate::sound::SoundLayer::play).
    #[serde(rename = "loop", default)]
    pub looped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAsset {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Inline payload, used instead of `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpritesheetAsset {
    pub id: String,
    /// Path of the sheet JSON (frame rectangles).
    pub path: String,
    /// Overrides `meta.image` from the sheet JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default)]
    pub is_global: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimateAsset {
    pub id: String,
    /// Path of the timeline JSON.
    pub path: String,
    #[serde(default)]
    pub is_global: bool,
}

/// One load instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AssetDescriptor {
    Manifest(ManifestAsset),
    Image(ImageAsset),
    Sound(SoundAsset),
    Data(DataAsset),
    Spritesheet(SpritesheetAsset),
    Animate(AnimateAsset),
}

impl AssetDescriptor {
    pub fn manifest(id: impl Into<String>, path: impl Into<String>) -> Self {
        AssetDescriptor::Manifest(ManifestAsset {
            id: id.into(),
            path: path.into(),
            is_global: false,
        })
    }

    pub fn image(id: impl Into<String>, path: impl Into<String>) -> Self {
        AssetDescriptor::Image(ImageAsset {
            id: id.into(),
            path: path.into(),
            is_global: false,
        })
    }

    pub fn sound(
        id: impl Into<String>,
        path: impl Into<String>,
        context: SoundContextKind,
        volume: f32,
    ) -> Self {
        AssetDescriptor::Sound(SoundAsset {
            id: id.into(),
            path: path.into(),
            is_global: false,
            context,
            volume,
            looped: false,
        })
    }

    pub fn data(id: impl Into<String>, path: impl Into<String>) -> Self {
        AssetDescriptor::Data(DataAsset {
            id: id.into(),
            path: Some(path.into()),
            data: None,
            is_global: false,
        })
    }

    pub fn inline_data(id: impl Into<String>, data: serde_json::Value) -> Self {
        AssetDescriptor::Data(DataAsset {
            id: id.into(),
            path: None,
            data: Some(data),
            is_global: false,
        })
    }

    pub fn spritesheet(id: impl Into<String>, path: impl Into<String>) -> Self {
        AssetDescriptor::Spritesheet(SpritesheetAsset {
            id: id.into(),
            path: path.into(),
            image: None,
            is_global: false,
        })
    }

    pub fn animate(id: impl Into<String>, path: impl Into<String>) -> Self {
        AssetDescriptor::Animate(AnimateAsset {
            id: id.into(),
            path: path.into(),
            is_global: false,
        })
    }

    /// Builder: mark as global (survives normal unloads).
    pub fn global(self) -> Self {
        self.with_global(true)
    }

    pub fn with_global(mut self, global: bool) -> Self {
        match &mut self {
            AssetDescriptor::Manifest(a) => a.is_global = global,
            AssetDescriptor::Image(a) => a.is_global = global,
            AssetDescriptor::Sound(a) => a.is_global = global,
            AssetDescriptor::Data(a) => a.is_global = global,
            AssetDescriptor::Spritesheet(a) => a.is_global = global,
            AssetDescriptor::Animate(a) => a.is_global = global,
        }
        self
    }

    pub fn id(&self) -> &str {
        match self {
            AssetDescriptor::Manifest(a) => &a.id,
            AssetDescriptor::Image(a) => &a.id,
            AssetDescriptor::Sound(a) => &a.id,
            AssetDescriptor::Data(a) => &a.id,
            AssetDescriptor::Spritesheet(a) => &a.id,
            AssetDescriptor::Animate(a) => &a.id,
        }
    }

    pub fn is_global(&self) -> bool {
        match self {
            AssetDescriptor::Manifest(a) => a.is_global,
            AssetDescriptor::Image(a) => a.is_global,
            AssetDescriptor::Sound(a) => a.is_global,
            AssetDescriptor::Data(a) => a.is_global,
            AssetDescriptor::Spritesheet(a) => a.is_global,
            AssetDescriptor::Animate(a) => a.is_global,
        }
    }

    /// Source path, if the descriptor has one.
    pub fn path(&self) -> Option<&str> {
        match self {
            AssetDescriptor::Manifest(a) => Some(&a.path),
            AssetDescriptor::Image(a) => Some(&a.path),
            AssetDescriptor::Sound(a) => Some(&a.path),
            AssetDescriptor::Data(a) => a.path.as_deref(),
            AssetDescriptor::Spritesheet(a) => Some(&a.path),
            AssetDescriptor::Animate(a) => Some(&a.path),
        }
    }

    /// Cache kind this descriptor produces; `None` for manifests.
    pub fn kind(&self) -> Option<AssetKind> {
        match self {
            AssetDescriptor::Manifest(_) => None,
            AssetDescriptor::Image(_) => Some(AssetKind::Image),
            AssetDescriptor::Sound(_) => Some(AssetKind::Sound),
            AssetDescriptor::Data(_) => Some(AssetKind::Data),
            AssetDescriptor::Spritesheet(_) => Some(AssetKind::Spritesheet),
            AssetDescriptor::Animate(_) => Some(AssetKind::Animate),
        }
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: &str| AssetError::InvalidDescriptor {
            id: self.id().to_string(),
            reason: reason.to_string(),
        };
        if self.id().is_empty() {
            return Err(invalid("empty id"));
        }
        match self {
            AssetDescriptor::Data(a) => match (&a.path, &a.data) {
                (Some(_), Some(_)) => Err(invalid("both path and inline data given")),
                (None, None) => Err(invalid("neither path nor inline data given")),
                (Some(path), None) if path.is_empty() => Err(invalid("empty path")),
                _ => Ok(()),
            },
            AssetDescriptor::Sound(a) if !(0.0..=1.0).contains(&a.volume) => {
                Err(invalid("volume must be within 0.0..=1.0"))
            }
            _ => match self.path() {
                Some("") => Err(invalid("empty path")),
                _ => Ok(()),
            },
        }
    }
}

/// Parse a manifest file body into descriptors.
pub fn parse_manifest(path: &str, bytes: &[u8]) -> Result<Vec<AssetDescriptor>, AssetError> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}
