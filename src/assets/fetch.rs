//! Background fetch and decode.
//!
//! [`FetchPool`] owns a small set of worker threads fed through a crossbeam
//! MPMC channel. Each job reads bytes from the shared [`AssetSource`] and
//! decodes them; results flow back on a second channel that the asset manager
//! drains from `poll`. With zero workers the pool runs jobs inline on
//! `submit`, which keeps tests deterministic.

use super::cache::{FrameRect, LoadedAsset, SoundClip, Spritesheet, Texture};
use super::descriptor::{AssetDescriptor, parse_manifest};
use super::source::{AssetSource, resolve_relative};
use crate::curtain::Timeline;
use crate::error::AssetError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub(crate) type Ticket = u64;

#[derive(Debug)]
pub(crate) enum FetchRequest {
    Manifest { path: String },
    Asset(AssetDescriptor),
}

#[derive(Debug)]
pub(crate) enum Fetched {
    Manifest(Vec<AssetDescriptor>),
    Asset(LoadedAsset),
}

struct FetchJob {
    ticket: Ticket,
    request: FetchRequest,
}

pub(crate) struct FetchDone {
    pub ticket: Ticket,
    pub result: Result<Fetched, AssetError>,
}

pub(crate) struct FetchPool {
    tx_job: Option<Sender<FetchJob>>,
    tx_done: Sender<FetchDone>,
    rx_done: Receiver<FetchDone>,
    workers: Vec<JoinHandle<()>>,
    source: Arc<dyn AssetSource>,
}

impl FetchPool {
    pub(crate) fn new(source: Arc<dyn AssetSource>, worker_count: usize) -> Self {
        let (tx_done, rx_done) = unbounded::<FetchDone>();
        let (tx_job, rx_job) = unbounded::<FetchJob>();

        let workers = (0..worker_count)
            .map(|n| {
                let rx_job = rx_job.clone();
                let tx_done = tx_done.clone();
                let source = Arc::clone(&source);
                std::thread::Builder::new()
                    .name(format!("asset-fetch-{n}"))
                    .spawn(move || worker_loop(source, rx_job, tx_done))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("failed to spawn asset worker: {}", e);
                    None
                }
            })
            .collect::<Vec<_>>();

        if worker_count > 0 && workers.is_empty() {
            log::warn!("no asset workers running, fetching inline");
        }
        log::debug!("asset fetch pool started with {} worker(s)", workers.len());

        FetchPool {
            tx_job: (!workers.is_empty()).then_some(tx_job),
            tx_done,
            rx_done,
            workers,
            source,
        }
    }

    pub(crate) fn submit(&self, ticket: Ticket, request: FetchRequest) {
        match &self.tx_job {
            Some(tx_job) => {
                if let Err(e) = tx_job.send(FetchJob { ticket, request }) {
                    log::error!("asset workers gone, ticket {} dropped", ticket);
                    let _ = self.tx_done.send(FetchDone {
                        ticket: e.0.ticket,
                        result: Err(AssetError::Disconnected),
                    });
                }
            }
            None => {
                let result = run_request(self.source.as_ref(), request);
                let _ = self.tx_done.send(FetchDone { ticket, result });
            }
        }
    }

    pub(crate) fn try_recv(&self) -> Option<FetchDone> {
        self.rx_done.try_recv().ok()
    }

    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<FetchDone> {
        match self.rx_done.recv_timeout(timeout) {
            Ok(done) => Some(done),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for FetchPool {
    fn drop(&mut self) {
        // Closing the job channel ends every worker loop.
        self.tx_job.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(source: Arc<dyn AssetSource>, rx_job: Receiver<FetchJob>, tx_done: Sender<FetchDone>) {
    while let Ok(job) = rx_job.recv() {
        let result = run_request(source.as_ref(), job.request);
        if tx_done
            .send(FetchDone {
                ticket: job.ticket,
                result,
            })
            .is_err()
        {
            break;
        }
    }
}

fn fetch(source: &dyn AssetSource, path: &str) -> Result<Vec<u8>, AssetError> {
    source.fetch(path).map_err(|e| AssetError::Fetch {
        path: path.to_string(),
        source: e,
    })
}

fn parse_json<T: for<'de> Deserialize<'de>>(path: &str, bytes: &[u8]) -> Result<T, AssetError> {
    serde_json::from_slice(bytes).map_err(|e| AssetError::Parse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

fn decode_texture(id: &str, bytes: &[u8]) -> Result<Texture, AssetError> {
    let image = image::load_from_memory(bytes).map_err(|e| AssetError::Decode {
        id: id.to_string(),
        reason: e.to_string(),
    })?;
    Ok(Texture::new(image.to_rgba8()))
}

#[derive(Deserialize)]
struct SheetFrame {
    frame: FrameRect,
}

#[derive(Deserialize, Default)]
struct SheetMeta {
    image: Option<String>,
}

/// Spritesheet JSON in the common `{ frames: { name: { frame: {x,y,w,h} } }, meta: { image } }` layout.
#[derive(Deserialize)]
struct SheetFile {
    frames: FxHashMap<String, SheetFrame>,
    #[serde(default)]
    meta: SheetMeta,
}

pub(crate) fn run_request(source: &dyn AssetSource, request: FetchRequest) -> Result<Fetched, AssetError> {
    match request {
        FetchRequest::Manifest { path } => {
            let bytes = fetch(source, &path)?;
            parse_manifest(&path, &bytes).map(Fetched::Manifest)
        }
        FetchRequest::Asset(descriptor) => load_asset(source, descriptor).map(Fetched::Asset),
    }
}

fn load_asset(source: &dyn AssetSource, descriptor: AssetDescriptor) -> Result<LoadedAsset, AssetError> {
    match descriptor {
        AssetDescriptor::Manifest(m) => Err(AssetError::InvalidDescriptor {
            id: m.id,
            reason: "manifests are expanded, not loaded".to_string(),
        }),
        AssetDescriptor::Image(a) => {
            let bytes = fetch(source, &a.path)?;
            let texture = decode_texture(&a.id, &bytes)?;
            Ok(LoadedAsset::Texture { id: a.id, texture })
        }
        AssetDescriptor::Sound(a) => {
            let bytes = fetch(source, &a.path)?;
            if bytes.is_empty() {
                return Err(AssetError::Decode {
                    id: a.id,
                    reason: "empty sound file".to_string(),
                });
            }
            Ok(LoadedAsset::Sound {
                id: a.id,
                clip: SoundClip::new(bytes),
                context: a.context,
                volume: a.volume,
                looped: a.looped,
            })
        }
        AssetDescriptor::Data(a) => {
            let value = match (a.data, a.path) {
                (Some(value), _) => value,
                (None, Some(path)) => {
                    let bytes = fetch(source, &path)?;
                    parse_json(&path, &bytes)?
                }
                (None, None) => {
                    return Err(AssetError::InvalidDescriptor {
                        id: a.id,
                        reason: "neither path nor inline data given".to_string(),
                    });
                }
            };
            Ok(LoadedAsset::Data { id: a.id, value })
        }
        AssetDescriptor::Spritesheet(a) => {
            let bytes = fetch(source, &a.path)?;
            let sheet: SheetFile = parse_json(&a.path, &bytes)?;
            let image_path = match a.image.or(sheet.meta.image) {
                Some(image) => resolve_relative(&a.path, &image),
                None => {
                    return Err(AssetError::Parse {
                        path: a.path,
                        reason: "spritesheet names no image".to_string(),
                    });
                }
            };
            let image_bytes = fetch(source, &image_path)?;
            let texture = decode_texture(&a.id, &image_bytes)?;
            let frames = sheet
                .frames
                .into_iter()
                .map(|(name, f)| (name, f.frame))
                .collect();
            Ok(LoadedAsset::Spritesheet {
                id: a.id,
                sheet: Spritesheet { texture, frames },
            })
        }
        AssetDescriptor::Animate(a) => {
            let bytes = fetch(source, &a.path)?;
            let timeline = Timeline::from_json(&a.path, &bytes)?;
            Ok(LoadedAsset::Timeline {
                id: a.id,
                timeline: Arc::new(timeline),
            })
        }
    }
}
