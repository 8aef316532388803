//! Sound contexts and the bridge to the audio backend.
//!
//! Every loaded sound belongs to exactly one context (`sfx`, `vo`, `music`).
//! The volume a sound plays at is its base volume times its context volume
//! times the global volume. [`SoundLayer`] keeps that bookkeeping and talks to
//! whatever plays the audio over crossbeam channels: [`AudioCmd`] out,
//! [`AudioMessage`] back. The backend end of the channels is an
//! [`AudioEndpoint`]; without one, commands are simply discarded.

use crate::assets::SoundClip;
use crate::completion::{Completion, Rejection, Resolver};
use crate::events::audio::{AudioCmd, AudioMessage, Voice};
use crossbeam_channel::{Receiver, Sender, unbounded};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Volume group a sound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundContextKind {
    #[default]
    Sfx,
    Vo,
    Music,
}

impl SoundContextKind {
    pub const ALL: [SoundContextKind; 3] = [
        SoundContextKind::Sfx,
        SoundContextKind::Vo,
        SoundContextKind::Music,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SoundContextKind::Sfx => "sfx",
            SoundContextKind::Vo => "vo",
            SoundContextKind::Music => "music",
        }
    }

    fn index(self) -> usize {
        match self {
            SoundContextKind::Sfx => 0,
            SoundContextKind::Vo => 1,
            SoundContextKind::Music => 2,
        }
    }
}

impl FromStr for SoundContextKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sfx" => Ok(SoundContextKind::Sfx),
            "vo" => Ok(SoundContextKind::Vo),
            "music" => Ok(SoundContextKind::Music),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SoundEntry {
    base_volume: f32,
    looped: bool,
}

#[derive(Debug, Default)]
struct SoundContext {
    volume: f32,
    sounds: FxHashMap<String, SoundEntry>,
}

/// Backend side of the audio channels.
pub struct AudioEndpoint {
    pub rx_cmd: Receiver<AudioCmd>,
    pub tx_msg: Sender<AudioMessage>,
}

struct Playing {
    voice: Voice,
    looped: bool,
    resolver: Option<Resolver<()>>,
}

pub struct SoundLayer {
    contexts: [SoundContext; 3],
    owners: FxHashMap<String, SoundContextKind>,
    playing: FxHashMap<String, Playing>,
    next_voice: Voice,
    global_volume: f32,
    paused: bool,
    tx_cmd: Sender<AudioCmd>,
    rx_msg: Receiver<AudioMessage>,
}

impl SoundLayer {
    /// Create a layer and the endpoint an audio backend should drive.
    pub fn connected() -> (Self, AudioEndpoint) {
        let (tx_cmd, rx_cmd) = unbounded::<AudioCmd>();
        let (tx_msg, rx_msg) = unbounded::<AudioMessage>();
        let layer = SoundLayer {
            contexts: [
                SoundContext {
                    volume: 1.0,
                    ..Default::default()
                },
                SoundContext {
                    volume: 1.0,
                    ..Default::default()
                },
                SoundContext {
                    volume: 1.0,
                    ..Default::default()
                },
            ],
            owners: FxHashMap::default(),
            playing: FxHashMap::default(),
            next_voice: 0,
            global_volume: 1.0,
            paused: false,
            tx_cmd,
            rx_msg,
        };
        (layer, AudioEndpoint { rx_cmd, tx_msg })
    }

    /// A layer with no backend attached. Bookkeeping still works.
    pub fn detached() -> Self {
        Self::connected().0
    }

    fn send(&self, cmd: AudioCmd) {
        // No backend attached is fine.
        let _ = self.tx_cmd.send(cmd);
    }

    fn context(&self, kind: SoundContextKind) -> &SoundContext {
        &self.contexts[kind.index()]
    }

    fn context_mut(&mut self, kind: SoundContextKind) -> &mut SoundContext {
        &mut self.contexts[kind.index()]
    }

    /// Register a sound under `context`. A sound already owned by another
    /// context moves to the new one. `looped` is the default mode for [`play`](Self::play).
    pub fn add(
        &mut self,
        id: &str,
        clip: SoundClip,
        context: SoundContextKind,
        base_volume: f32,
        looped: bool,
    ) {
        if let Some(previous) = self.owners.insert(id.to_string(), context)
            && previous != context
        {
            log::debug!(
                "sound '{}' moves from {} to {}",
                id,
                previous.name(),
                context.name()
            );
            self.context_mut(previous).sounds.remove(id);
        }
        self.context_mut(context).sounds.insert(
            id.to_string(),
            SoundEntry {
                base_volume: base_volume.clamp(0.0, 1.0),
                looped,
            },
        );
        self.send(AudioCmd::Load {
            id: id.to_string(),
            clip,
        });
    }

    /// Forget a sound. Any playback completion for it is cancelled.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(owner) = self.owners.remove(id) else {
            return false;
        };
        self.context_mut(owner).sounds.remove(id);
        self.playing.remove(id);
        self.send(AudioCmd::Unload { id: id.to_string() });
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.owners.contains_key(id)
    }

    pub fn context_of(&self, id: &str) -> Option<SoundContextKind> {
        self.owners.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Ids registered under `kind`.
    pub fn sounds_in(&self, kind: SoundContextKind) -> impl Iterator<Item = &str> {
        self.context(kind).sounds.keys().map(String::as_str)
    }

    /// Base × context × global volume.
    pub fn effective_volume(&self, id: &str) -> Option<f32> {
        let kind = self.context_of(id)?;
        let context = self.context(kind);
        let entry = context.sounds.get(id)?;
        Some(entry.base_volume * context.volume * self.global_volume)
    }

    /// Start playback in the sound's registered mode. The completion resolves
    /// when the backend reports a one-shot finished and is cancelled by
    /// `stop`, `remove`, or a replay.
    pub fn play(&mut self, id: &str) -> Completion<()> {
        let looped = self
            .context_of(id)
            .and_then(|kind| self.context(kind).sounds.get(id))
            .is_some_and(|entry| entry.looped);
        self.start(id, looped)
    }

    /// Start looping playback. Only `stop` or `remove` settle the completion.
    pub fn play_looped(&mut self, id: &str) -> Completion<()> {
        self.start(id, true)
    }

    fn start(&mut self, id: &str, looped: bool) -> Completion<()> {
        let Some(volume) = self.effective_volume(id) else {
            log::warn!("play: unknown sound '{}'", id);
            return Completion::rejected(Rejection::Failed(format!("unknown sound '{id}'")));
        };
        let (resolver, completion) = Completion::pair();
        self.next_voice += 1;
        let voice = self.next_voice;
        // Replacing an entry drops its resolver, cancelling the earlier playback.
        self.playing.insert(
            id.to_string(),
            Playing {
                voice,
                looped,
                resolver: Some(resolver),
            },
        );
        self.send(AudioCmd::Play {
            id: id.to_string(),
            voice,
            volume,
            looped,
        });
        completion
    }

    pub fn stop(&mut self, id: &str) {
        if let Some(playing) = self.playing.remove(id) {
            self.send(AudioCmd::Stop {
                id: id.to_string(),
                voice: playing.voice,
            });
        }
    }

    pub fn is_playing(&self, id: &str) -> bool {
        self.playing.contains_key(id)
    }

    pub fn context_volume(&self, kind: SoundContextKind) -> f32 {
        self.context(kind).volume
    }

    pub fn set_context_volume(&mut self, kind: SoundContextKind, volume: f32) {
        self.context_mut(kind).volume = volume.clamp(0.0, 1.0);
        self.refresh_playing(|owner| owner == kind);
    }

    pub fn global_volume(&self) -> f32 {
        self.global_volume
    }

    pub fn set_global_volume(&mut self, volume: f32) {
        self.global_volume = volume.clamp(0.0, 1.0);
        self.refresh_playing(|_| true);
    }

    fn refresh_playing(&self, affected: impl Fn(SoundContextKind) -> bool) {
        for id in self.playing.keys() {
            let Some(owner) = self.context_of(id) else {
                continue;
            };
            if !affected(owner) {
                continue;
            }
            if let Some(volume) = self.effective_volume(id) {
                self.send(AudioCmd::Volume {
                    id: id.clone(),
                    volume,
                });
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause or resume everything the backend is playing.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        self.send(if paused {
            AudioCmd::PauseAll
        } else {
            AudioCmd::ResumeAll
        });
    }

    /// Drain backend messages, settling playback completions.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(msg) = self.rx_msg.try_recv() {
            handled += 1;
            match msg {
                AudioMessage::Finished { id, voice } => {
                    let finished_once = self
                        .playing
                        .get(&id)
                        .is_some_and(|p| p.voice == voice && !p.looped);
                    if finished_once
                        && let Some(mut playing) = self.playing.remove(&id)
                        && let Some(resolver) = playing.resolver.take()
                    {
                        resolver.resolve(());
                    }
                }
                AudioMessage::Stopped { id, voice } => {
                    // `stop` already settled it.
                    log::trace!("audio backend stopped '{}' (voice {})", id, voice);
                }
                AudioMessage::LoadFailed { id, error } => {
                    log::error!("audio backend failed to load '{}': {}", id, error);
                }
                AudioMessage::Loaded { id } => {
                    log::trace!("audio backend loaded '{}'", id);
                }
            }
        }
        handled
    }

    /// Ask the backend to stop and release everything.
    pub fn shutdown(&mut self) {
        self.playing.clear();
        self.send(AudioCmd::Shutdown);
    }
}
