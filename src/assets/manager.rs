//! Batch loading with global/local lifetimes.
//!
//! A load call becomes a batch that moves through three stages:
//!
//! 1. **Expanding**: manifest descriptors are fetched and replaced by their
//!    contents, recursively. Children of a global manifest become global.
//!    A manifest that (transitively) lists itself fails with
//!    [`AssetError::ManifestCycle`].
//! 2. **Global partition**: global descriptors not already cached are fetched.
//!    When they have all settled, their ids join the global sets.
//! 3. **Local partition**: the remaining descriptors are fetched.
//!
//! Ids already cached are skipped (a skipped global id is still marked
//! global). Results only settle inside [`AssetManager::poll`], never
//! re-entrantly from [`AssetManager::load`].

use super::cache::{AssetCache, LoadedAsset};
use super::descriptor::{AssetDescriptor, AssetKind};
use super::fetch::{FetchDone, FetchPool, FetchRequest, Fetched, Ticket};
use super::source::AssetSource;
use crate::completion::{Completion, Rejection};
use crate::error::AssetError;
use crate::sound::SoundLayer;
use rustc_hash::FxHashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type BatchId = u64;

type LoadCallback = Box<dyn FnOnce(Result<LoadSummary, AssetError>)>;

/// What to do when one asset in a batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// The whole batch fails with the first error.
    #[default]
    FailFast,
    /// Record the failure in [`LoadSummary::failed`] and keep going.
    Tolerant,
}

impl FromStr for LoadPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_fast" | "failfast" => Ok(LoadPolicy::FailFast),
            "tolerant" => Ok(LoadPolicy::Tolerant),
            _ => Err(()),
        }
    }
}

/// Outcome of a finished batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    /// Newly fetched and cached.
    pub loaded: Vec<(AssetKind, String)>,
    /// Already cached before this batch.
    pub skipped: Vec<(AssetKind, String)>,
    /// Id (or manifest path) and error text, under [`LoadPolicy::Tolerant`].
    pub failed: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Partition {
    Global,
    Local,
}

struct PendingManifest {
    path: String,
    is_global: bool,
    /// Manifest paths from the root of the batch down to this one.
    ancestry: Vec<String>,
}

enum BatchStage {
    Expanding {
        manifests: FxHashMap<Ticket, PendingManifest>,
        ready: Vec<AssetDescriptor>,
    },
    Loading {
        partition: Partition,
        pending: FxHashMap<Ticket, (AssetKind, String)>,
        local: Vec<AssetDescriptor>,
        globals: Vec<(AssetKind, String)>,
    },
}

struct LoadBatch {
    stage: BatchStage,
    summary: LoadSummary,
    on_done: Option<LoadCallback>,
}

/// Expanded result of one descriptor list.
#[derive(Default)]
struct Expansion {
    manifests: Vec<PendingManifest>,
    ready: Vec<AssetDescriptor>,
}

fn expand(
    list: Vec<AssetDescriptor>,
    inherit_global: bool,
    ancestry: &[String],
) -> Result<Expansion, AssetError> {
    let mut out = Expansion::default();
    for descriptor in list {
        let descriptor = if inherit_global {
            descriptor.global()
        } else {
            descriptor
        };
        descriptor.validate()?;
        match descriptor {
            AssetDescriptor::Manifest(m) => {
                if ancestry.iter().any(|p| *p == m.path) {
                    return Err(AssetError::ManifestCycle { path: m.path });
                }
                let mut chain = ancestry.to_vec();
                chain.push(m.path.clone());
                out.manifests.push(PendingManifest {
                    path: m.path,
                    is_global: m.is_global,
                    ancestry: chain,
                });
            }
            other => out.ready.push(other),
        }
    }
    Ok(out)
}

/// Collapse duplicates. Identical entries merge (global wins); entries that
/// share kind and id but differ otherwise are an error.
fn dedupe(list: Vec<AssetDescriptor>) -> Result<Vec<AssetDescriptor>, AssetError> {
    let mut index: FxHashMap<(AssetKind, String), usize> = FxHashMap::default();
    let mut out: Vec<AssetDescriptor> = Vec::with_capacity(list.len());
    for descriptor in list {
        let Some(kind) = descriptor.kind() else {
            continue;
        };
        let key = (kind, descriptor.id().to_string());
        match index.get(&key) {
            None => {
                index.insert(key, out.len());
                out.push(descriptor);
            }
            Some(&at) => {
                let existing = &out[at];
                let global = existing.is_global() || descriptor.is_global();
                if existing.clone().with_global(false) != descriptor.clone().with_global(false) {
                    return Err(AssetError::InvalidDescriptor {
                        id: key.1,
                        reason: "listed twice with different settings".to_string(),
                    });
                }
                out[at] = descriptor.with_global(global);
            }
        }
    }
    Ok(out)
}

/// Owns the cache, the sound layer, and the fetch workers.
pub struct AssetManager {
    cache: AssetCache,
    sounds: SoundLayer,
    pool: FetchPool,
    policy: LoadPolicy,
    batches: FxHashMap<BatchId, LoadBatch>,
    tickets: FxHashMap<Ticket, BatchId>,
    /// Settled batches whose callbacks run on the next poll.
    settled: Vec<(LoadCallback, Result<LoadSummary, AssetError>)>,
    next_batch: BatchId,
    next_ticket: Ticket,
}

impl AssetManager {
    /// `workers == 0` fetches inline on the calling thread.
    pub fn new(source: Arc<dyn AssetSource>, workers: usize, sounds: SoundLayer) -> Self {
        AssetManager {
            cache: AssetCache::default(),
            sounds,
            pool: FetchPool::new(source, workers),
            policy: LoadPolicy::default(),
            batches: FxHashMap::default(),
            tickets: FxHashMap::default(),
            settled: Vec::new(),
            next_batch: 1,
            next_ticket: 1,
        }
    }

    pub fn with_policy(mut self, policy: LoadPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: LoadPolicy) {
        self.policy = policy;
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn sounds(&self) -> &SoundLayer {
        &self.sounds
    }

    pub fn sounds_mut(&mut self) -> &mut SoundLayer {
        &mut self.sounds
    }

    /// Borrow the cache and the sound layer at once.
    pub fn split_mut(&mut self) -> (&AssetCache, &mut SoundLayer) {
        (&self.cache, &mut self.sounds)
    }

    /// Number of batches not yet settled.
    pub fn in_flight(&self) -> usize {
        self.batches.len()
    }

    pub fn is_loading(&self) -> bool {
        !self.batches.is_empty() || !self.settled.is_empty()
    }

    /// Start loading `descriptors`; `on_done` runs from a later [`poll`](Self::poll).
    ///
    /// Invalid top-level descriptors are returned here and `on_done` is never
    /// called. Everything else, including a global partition refused because
    /// another batch is loading scene assets, reaches `on_done`.
    pub fn load(
        &mut self,
        descriptors: Vec<AssetDescriptor>,
        on_done: impl FnOnce(Result<LoadSummary, AssetError>) + 'static,
    ) -> Result<BatchId, AssetError> {
        let expansion = expand(descriptors, false, &[])?;

        let batch_id = self.next_batch;
        self.next_batch += 1;
        log::debug!(
            "batch {}: {} manifest(s), {} asset(s)",
            batch_id,
            expansion.manifests.len(),
            expansion.ready.len()
        );

        let mut manifests = FxHashMap::default();
        for pending in expansion.manifests {
            let ticket = self.submit(
                batch_id,
                FetchRequest::Manifest {
                    path: pending.path.clone(),
                },
            );
            manifests.insert(ticket, pending);
        }
        self.batches.insert(
            batch_id,
            LoadBatch {
                stage: BatchStage::Expanding {
                    manifests,
                    ready: expansion.ready,
                },
                summary: LoadSummary::default(),
                on_done: Some(Box::new(on_done)),
            },
        );
        self.advance(batch_id);
        Ok(batch_id)
    }

    /// [`load`](Self::load) with the outcome delivered as a [`Completion`].
    pub fn load_tracked(
        &mut self,
        descriptors: Vec<AssetDescriptor>,
    ) -> Result<Completion<LoadSummary>, AssetError> {
        let (resolver, completion) = Completion::pair();
        self.load(descriptors, move |result| match result {
            Ok(summary) => resolver.resolve(summary),
            Err(e) => resolver.reject(Rejection::Failed(e.to_string())),
        })?;
        Ok(completion)
    }

    /// Drain finished fetches and settle batches. Returns how many results
    /// were handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(done) = self.pool.try_recv() {
            self.handle(done);
            handled += 1;
        }
        for (on_done, result) in std::mem::take(&mut self.settled) {
            on_done(result);
        }
        self.sounds.poll();
        handled
    }

    /// Block until every batch settles or `timeout` passes. Returns `true`
    /// when nothing is left in flight.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        self.poll();
        while self.is_loading() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Some(done) = self.pool.recv_timeout(deadline - now) {
                self.handle(done);
            }
            self.poll();
        }
        true
    }

    /// Evict every non-global entry, or everything with `include_global`.
    /// Returns the number of evicted entries.
    pub fn unload(&mut self, include_global: bool) -> usize {
        let evicted = self.cache.evict(include_global);
        for (kind, id) in &evicted {
            if *kind == AssetKind::Sound {
                self.sounds.remove(id);
            }
        }
        log::info!(
            "unloaded {} asset(s){}",
            evicted.len(),
            if include_global { " including globals" } else { "" }
        );
        evicted.len()
    }

    fn submit(&mut self, batch_id: BatchId, request: FetchRequest) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.tickets.insert(ticket, batch_id);
        self.pool.submit(ticket, request);
        ticket
    }

    /// Is some batch other than `except` loading its local partition?
    fn scene_load_active(&self, except: BatchId) -> bool {
        self.batches.iter().any(|(id, batch)| {
            *id != except
                && matches!(
                    batch.stage,
                    BatchStage::Loading {
                        partition: Partition::Local,
                        ..
                    }
                )
        })
    }

    fn handle(&mut self, done: FetchDone) {
        let Some(batch_id) = self.tickets.remove(&done.ticket) else {
            log::debug!("dropping result for abandoned ticket {}", done.ticket);
            return;
        };
        match done.result {
            Ok(Fetched::Manifest(list)) => self.on_manifest(batch_id, done.ticket, list),
            Ok(Fetched::Asset(asset)) => self.on_asset(batch_id, done.ticket, asset),
            Err(e) => self.on_failure(batch_id, done.ticket, e),
        }
    }

    fn on_manifest(&mut self, batch_id: BatchId, ticket: Ticket, list: Vec<AssetDescriptor>) {
        let Some(batch) = self.batches.get_mut(&batch_id) else {
            return;
        };
        let BatchStage::Expanding { manifests, .. } = &mut batch.stage else {
            return;
        };
        let Some(parent) = manifests.remove(&ticket) else {
            return;
        };
        log::debug!("manifest '{}' lists {} entries", parent.path, list.len());

        let expansion = match expand(list, parent.is_global, &parent.ancestry) {
            Ok(expansion) => expansion,
            Err(e) => {
                self.record_failure(batch_id, parent.path, e);
                return;
            }
        };

        let mut submitted = Vec::with_capacity(expansion.manifests.len());
        for pending in expansion.manifests {
            let ticket = self.submit(
                batch_id,
                FetchRequest::Manifest {
                    path: pending.path.clone(),
                },
            );
            submitted.push((ticket, pending));
        }
        if let Some(LoadBatch {
            stage: BatchStage::Expanding { manifests, ready },
            ..
        }) = self.batches.get_mut(&batch_id)
        {
            manifests.extend(submitted);
            ready.extend(expansion.ready);
        }
        self.advance(batch_id);
    }

    fn on_asset(&mut self, batch_id: BatchId, ticket: Ticket, asset: LoadedAsset) {
        let Some(batch) = self.batches.get_mut(&batch_id) else {
            return;
        };
        let BatchStage::Loading { pending, .. } = &mut batch.stage else {
            return;
        };
        if pending.remove(&ticket).is_none() {
            return;
        }
        let entry = (asset.kind(), asset.id().to_string());
        batch.summary.loaded.push(entry);
        self.store(asset);
        self.advance(batch_id);
    }

    fn on_failure(&mut self, batch_id: BatchId, ticket: Ticket, error: AssetError) {
        let Some(batch) = self.batches.get_mut(&batch_id) else {
            return;
        };
        let label = match &mut batch.stage {
            BatchStage::Expanding { manifests, .. } => manifests.remove(&ticket).map(|m| m.path),
            BatchStage::Loading { pending, .. } => pending.remove(&ticket).map(|(_, id)| id),
        };
        let Some(label) = label else {
            return;
        };
        self.record_failure(batch_id, label, error);
    }

    fn record_failure(&mut self, batch_id: BatchId, label: String, error: AssetError) {
        match self.policy {
            LoadPolicy::FailFast => self.fail(batch_id, error),
            LoadPolicy::Tolerant => {
                log::warn!("batch {}: '{}' failed: {}", batch_id, label, error);
                if let Some(batch) = self.batches.get_mut(&batch_id) {
                    batch.summary.failed.push((label, error.to_string()));
                }
                self.advance(batch_id);
            }
        }
    }

    fn fail(&mut self, batch_id: BatchId, error: AssetError) {
        let Some(mut batch) = self.batches.remove(&batch_id) else {
            return;
        };
        // Results still in flight for this batch are dropped on arrival.
        self.tickets.retain(|_, owner| *owner != batch_id);
        log::error!("batch {} failed: {}", batch_id, error);
        if let Some(on_done) = batch.on_done.take() {
            self.settled.push((on_done, Err(error)));
        }
    }

    fn store(&mut self, asset: LoadedAsset) {
        if let LoadedAsset::Sound {
            id,
            clip,
            context,
            volume,
            looped,
        } = &asset
        {
            self.sounds
                .add(id, clip.clone(), *context, *volume, *looped);
        }
        self.cache.insert(asset);
    }

    /// Move `batch_id` forward as far as settled work allows.
    fn advance(&mut self, batch_id: BatchId) {
        loop {
            let Some(batch) = self.batches.get_mut(&batch_id) else {
                return;
            };
            match &mut batch.stage {
                BatchStage::Expanding { manifests, ready } => {
                    if !manifests.is_empty() {
                        return;
                    }
                    let ready = std::mem::take(ready);
                    let list = match dedupe(ready) {
                        Ok(list) => list,
                        Err(e) => {
                            self.fail(batch_id, e);
                            return;
                        }
                    };
                    let (globals, locals): (Vec<_>, Vec<_>) =
                        list.into_iter().partition(AssetDescriptor::is_global);
                    if !globals.is_empty() && self.scene_load_active(batch_id) {
                        log::warn!("batch {}: global load refused during scene load", batch_id);
                        self.fail(batch_id, AssetError::GlobalLoadDuringScene);
                        return;
                    }
                    self.begin_partition(batch_id, Partition::Global, globals, locals);
                }
                BatchStage::Loading { pending, .. } if !pending.is_empty() => return,
                BatchStage::Loading {
                    partition: Partition::Global,
                    local,
                    globals,
                    ..
                } => {
                    let local = std::mem::take(local);
                    let globals = std::mem::take(globals);
                    for (kind, id) in &globals {
                        if !self.cache.mark_global(*kind, id) {
                            log::debug!("global '{}' not cached, not marked", id);
                        }
                    }
                    self.begin_partition(batch_id, Partition::Local, local, Vec::new());
                }
                BatchStage::Loading {
                    partition: Partition::Local,
                    ..
                } => {
                    let Some(mut batch) = self.batches.remove(&batch_id) else {
                        return;
                    };
                    log::info!(
                        "batch {} done: {} loaded, {} skipped, {} failed",
                        batch_id,
                        batch.summary.loaded.len(),
                        batch.summary.skipped.len(),
                        batch.summary.failed.len()
                    );
                    if let Some(on_done) = batch.on_done.take() {
                        self.settled.push((on_done, Ok(std::mem::take(&mut batch.summary))));
                    }
                    return;
                }
            }
        }
    }

    fn begin_partition(
        &mut self,
        batch_id: BatchId,
        partition: Partition,
        descriptors: Vec<AssetDescriptor>,
        local: Vec<AssetDescriptor>,
    ) {
        let mut pending = FxHashMap::default();
        let mut skipped = Vec::new();
        let mut globals = Vec::new();
        for descriptor in descriptors {
            let Some(kind) = descriptor.kind() else {
                continue;
            };
            let id = descriptor.id().to_string();
            if partition == Partition::Global {
                globals.push((kind, id.clone()));
            }
            if self.cache.contains(kind, &id) {
                skipped.push((kind, id));
                continue;
            }
            let ticket = self.submit(batch_id, FetchRequest::Asset(descriptor));
            pending.insert(ticket, (kind, id));
        }
        if let Some(batch) = self.batches.get_mut(&batch_id) {
            batch.summary.skipped.extend(skipped);
            batch.stage = BatchStage::Loading {
                partition,
                pending,
                local,
                globals,
            };
        }
    }
}
