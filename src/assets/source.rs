//! Where asset bytes come from.

use rustc_hash::FxHashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Byte provider shared with the fetch workers.
pub trait AssetSource: Send + Sync + 'static {
    fn fetch(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Reads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, path: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(path))
    }
}

/// Serves assets from memory. Used by tests and the headless demo.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: FxHashMap<String, Arc<[u8]>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let bytes: Vec<u8> = bytes.into();
        self.files.insert(path.into(), bytes.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, path: &str) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no asset at '{path}'")))
    }
}

/// Resolve `relative` against the directory containing `base`.
///
/// `resolve_relative("sheets/hero.json", "hero.png") == "sheets/hero.png"`.
pub fn resolve_relative(base: &str, relative: &str) -> String {
    if let Some(stripped) = relative.strip_prefix('/') {
        return stripped.to_string();
    }
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], relative),
        None => relative.to_string(),
    }
}
