//! Error types shared across the crate.
//!
//! - [`AssetError`] – fetch, parse, and lifecycle failures from the asset manager
//! - [`CurtainError`] – transition curtain initialisation failures
//! - [`StageError`] – scene registry and pipeline misuse

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to fetch '{path}'")]
    Fetch {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse '{path}': {reason}")]
    Parse { path: String, reason: String },
    #[error("failed to decode asset '{id}': {reason}")]
    Decode { id: String, reason: String },
    #[error("invalid descriptor '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },
    #[error("manifest cycle detected at '{path}'")]
    ManifestCycle { path: String },
    #[error("global assets cannot be loaded while a scene load is in flight")]
    GlobalLoadDuringScene,
    #[error("asset loader is shut down")]
    Disconnected,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CurtainError {
    #[error("curtain asset '{0}' is not in the cache")]
    MissingAsset(String),
    #[error("curtain timeline is missing markers: {}", .0.join(", "))]
    MissingMarkers(Vec<String>),
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("no scene registered under '{0}'")]
    UnknownScene(String),
    #[error("a scene transition is already in progress")]
    TransitionInProgress,
    #[error(transparent)]
    Curtain(#[from] CurtainError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("curtain assets failed to load: {0}")]
    CurtainLoad(String),
}
