//! Headless audio backend.
//!
//! Drives the [`AudioEndpoint`] of a [`SoundLayer`](crate::sound::SoundLayer)
//! on a background thread without touching an audio device. Clips are
//! treated as 16-bit mono PCM at 44.1 kHz, so a one-shot "plays" for as long
//! as its bytes would last and then reports [`AudioMessage::Finished`].
//!
//! Use [`spawn_headless_mixer`] once during startup and [`MixerHandle::join`]
//! after the sound layer has sent its shutdown command.

use crate::events::audio::{AudioCmd, AudioMessage, Voice};
use crate::sound::AudioEndpoint;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use rustc_hash::FxHashMap;
use std::time::{Duration, Instant};

const BYTES_PER_SECOND: f32 = 44_100.0 * 2.0;
const TICK: Duration = Duration::from_millis(10);

pub struct MixerHandle {
    handle: std::thread::JoinHandle<()>,
}

impl MixerHandle {
    /// Wait for the mixer thread to exit.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("mixer thread panicked");
        }
    }
}

pub fn spawn_headless_mixer(endpoint: AudioEndpoint) -> std::io::Result<MixerHandle> {
    let AudioEndpoint { rx_cmd, tx_msg } = endpoint;
    let handle = std::thread::Builder::new()
        .name("headless-mixer".into())
        .spawn(move || mixer_thread(rx_cmd, tx_msg))?;
    Ok(MixerHandle { handle })
}

struct Channel {
    voice: Voice,
    remaining: Duration,
    looped: bool,
}

fn clip_duration(len: usize) -> Duration {
    Duration::from_secs_f32(len as f32 / BYTES_PER_SECOND)
}

fn mixer_thread(rx_cmd: Receiver<AudioCmd>, tx_msg: Sender<AudioMessage>) {
    log::debug!("[mixer] thread starting");

    let mut clips: FxHashMap<String, Duration> = FxHashMap::default();
    let mut channels: FxHashMap<String, Channel> = FxHashMap::default();
    let mut paused = false;
    let mut last = Instant::now();

    'run: loop {
        match rx_cmd.recv_timeout(TICK) {
            Ok(cmd) => match cmd {
                AudioCmd::Load { id, clip } => {
                    if clip.is_empty() {
                        let _ = tx_msg.send(AudioMessage::LoadFailed {
                            id,
                            error: "empty clip".into(),
                        });
                    } else {
                        clips.insert(id.clone(), clip_duration(clip.len()));
                        let _ = tx_msg.send(AudioMessage::Loaded { id });
                    }
                }
                AudioCmd::Unload { id } => {
                    clips.remove(&id);
                    channels.remove(&id);
                }
                AudioCmd::Play {
                    id,
                    voice,
                    volume,
                    looped,
                } => match clips.get(&id) {
                    Some(length) => {
                        log::trace!(
                            "[mixer] play '{}' voice={} volume={} looped={}",
                            id,
                            voice,
                            volume,
                            looped
                        );
                        channels.insert(
                            id,
                            Channel {
                                voice,
                                remaining: *length,
                                looped,
                            },
                        );
                    }
                    None => log::warn!("[mixer] play for unloaded clip '{}'", id),
                },
                AudioCmd::Stop { id, voice } => {
                    if channels.get(&id).is_some_and(|c| c.voice == voice) {
                        channels.remove(&id);
                        let _ = tx_msg.send(AudioMessage::Stopped { id, voice });
                    }
                }
                AudioCmd::Volume { id, volume } => {
                    log::trace!("[mixer] volume '{}' = {}", id, volume);
                }
                AudioCmd::PauseAll => paused = true,
                AudioCmd::ResumeAll => paused = false,
                AudioCmd::Shutdown => break 'run,
            },
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break 'run,
        }

        let now = Instant::now();
        let elapsed = now - last;
        last = now;
        if paused {
            continue;
        }

        let mut finished = Vec::new();
        for (id, channel) in channels.iter_mut() {
            if channel.looped {
                continue;
            }
            channel.remaining = channel.remaining.saturating_sub(elapsed);
            if channel.remaining.is_zero() {
                finished.push((id.clone(), channel.voice));
            }
        }
        for (id, voice) in finished {
            channels.remove(&id);
            let _ = tx_msg.send(AudioMessage::Finished { id, voice });
        }
    }

    log::debug!("[mixer] thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SoundClip;
    use crate::completion::CompletionState;
    use crate::sound::{SoundContextKind, SoundLayer};

    #[test]
    fn test_one_shot_finishes() {
        let (mut layer, endpoint) = SoundLayer::connected();
        let mixer = spawn_headless_mixer(endpoint).unwrap();
        // 882 bytes = 10 ms
        layer.add("blip", SoundClip::new(vec![0; 882]), SoundContextKind::Sfx, 1.0, false);
        let done = layer.play("blip");

        let deadline = Instant::now() + Duration::from_secs(2);
        while done.is_pending() && Instant::now() < deadline {
            layer.poll();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(done.state(), CompletionState::Resolved);
        assert!(!layer.is_playing("blip"));

        layer.shutdown();
        mixer.join();
    }

    #[test]
    fn test_stop_reports_back() {
        let (mut layer, endpoint) = SoundLayer::connected();
        let mixer = spawn_headless_mixer(endpoint).unwrap();
        layer.add("theme", SoundClip::new(vec![0; 64]), SoundContextKind::Music, 1.0, true);
        let done = layer.play("theme");
        layer.stop("theme");
        assert_eq!(done.state(), CompletionState::Rejected);
        layer.shutdown();
        mixer.join();
    }

    #[test]
    fn test_restart_keeps_new_playback() {
        let (mut layer, endpoint) = SoundLayer::connected();
        let mixer = spawn_headless_mixer(endpoint).unwrap();
        layer.add("theme", SoundClip::new(vec![0; 64]), SoundContextKind::Music, 1.0, true);
        let _first = layer.play("theme");
        layer.stop("theme");
        let second = layer.play("theme");

        std::thread::sleep(Duration::from_millis(50));
        layer.poll();
        assert!(layer.is_playing("theme"));
        assert!(second.is_pending());
        layer.shutdown();
        mixer.join();
    }
}
