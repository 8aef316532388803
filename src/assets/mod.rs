//! Asset loading and caching.
//!
//! - [`descriptor`] – what to load ([`AssetDescriptor`])
//! - [`source`] – where bytes come from ([`AssetSource`])
//! - [`cache`] – loaded resources by kind ([`AssetCache`])
//! - [`manager`] – batches, manifests, and global/local lifetimes ([`AssetManager`])

pub mod cache;
pub mod descriptor;
mod fetch;
pub mod manager;
pub mod source;

pub use cache::{AssetCache, AssetStore, FrameRect, LoadedAsset, SoundClip, Spritesheet, Texture};
pub use descriptor::{AssetDescriptor, AssetKind};
pub use manager::{AssetManager, BatchId, LoadPolicy, LoadSummary};
pub use source::{AssetSource, FileSource, MemorySource};
