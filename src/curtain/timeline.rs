//! Frame-labelled animation timelines.
//!
//! A timeline is the parsed form of an `animate` asset:
//!
//! ```json
//! { "fps": 24, "totalFrames": 60,
//!   "labels": { "cover": 0, "cover_stop": 12, "load": 13, "load_loop": 36,
//!               "reveal": 37, "reveal_stop": 59 } }
//! ```
//!
//! [`TimelinePlayer`] walks a timeline by time, seeking to labels, playing
//! forward to a stop label, or looping between two labels.

use crate::error::AssetError;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub fps: f32,
    pub total_frames: u32,
    #[serde(default)]
    pub labels: FxHashMap<String, u32>,
}

impl Timeline {
    /// Parse and sanity-check timeline JSON.
    pub fn from_json(path: &str, bytes: &[u8]) -> Result<Self, AssetError> {
        let timeline: Timeline = serde_json::from_slice(bytes).map_err(|e| AssetError::Parse {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        let invalid = |reason: String| AssetError::Parse {
            path: path.to_string(),
            reason,
        };
        if timeline.fps.is_nan() || timeline.fps <= 0.0 {
            return Err(invalid(format!("fps must be positive, got {}", timeline.fps)));
        }
        if timeline.total_frames == 0 {
            return Err(invalid("timeline has no frames".to_string()));
        }
        if let Some((label, frame)) = timeline
            .labels
            .iter()
            .find(|(_, frame)| **frame >= timeline.total_frames)
        {
            return Err(invalid(format!(
                "label '{label}' at frame {frame} is past the last frame {}",
                timeline.total_frames - 1
            )));
        }
        Ok(timeline)
    }

    pub fn frame_of(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }

    /// Labels from `required` that this timeline lacks, in the given order.
    pub fn missing_labels(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|label| !self.labels.contains_key(**label))
            .map(|label| label.to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlayMode {
    Stopped,
    PlayTo { stop: u32 },
    Loop { start: u32, end: u32 },
}

/// Playback cursor over a shared [`Timeline`].
#[derive(Debug, Clone)]
pub struct TimelinePlayer {
    timeline: Arc<Timeline>,
    frame: f32,
    mode: PlayMode,
}

impl TimelinePlayer {
    pub fn new(timeline: Arc<Timeline>) -> Self {
        Self {
            timeline,
            frame: 0.0,
            mode: PlayMode::Stopped,
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn current_frame(&self) -> u32 {
        self.frame as u32
    }

    pub fn is_playing(&self) -> bool {
        self.mode != PlayMode::Stopped
    }

    pub fn stop(&mut self) {
        self.mode = PlayMode::Stopped;
    }

    /// Jump to `label` and stop there.
    pub fn goto_and_stop(&mut self, label: &str) -> bool {
        let Some(frame) = self.timeline.frame_of(label) else {
            log::warn!("timeline label '{}' not found", label);
            return false;
        };
        self.frame = frame as f32;
        self.mode = PlayMode::Stopped;
        true
    }

    /// Jump to `from` and play forward until `to`.
    pub fn play_to(&mut self, from: &str, to: &str) -> bool {
        let (Some(start), Some(stop)) = (self.timeline.frame_of(from), self.timeline.frame_of(to))
        else {
            log::warn!("timeline segment '{}'..'{}' not found", from, to);
            return false;
        };
        self.frame = start as f32;
        self.mode = PlayMode::PlayTo { stop };
        true
    }

    /// Jump to `from` and loop the frames up to `to` until told otherwise.
    pub fn loop_between(&mut self, from: &str, to: &str) -> bool {
        let (Some(start), Some(end)) = (self.timeline.frame_of(from), self.timeline.frame_of(to))
        else {
            log::warn!("timeline loop '{}'..'{}' not found", from, to);
            return false;
        };
        self.frame = start as f32;
        self.mode = PlayMode::Loop { start, end };
        true
    }

    /// Advance by `dt` seconds. Returns `true` on the call that reaches a
    /// play-to stop frame.
    pub fn advance(&mut self, dt: f32) -> bool {
        let step = dt.max(0.0) * self.timeline.fps;
        match self.mode {
            PlayMode::Stopped => false,
            PlayMode::PlayTo { stop } => {
                self.frame += step;
                if self.frame >= stop as f32 {
                    self.frame = stop as f32;
                    self.mode = PlayMode::Stopped;
                    true
                } else {
                    false
                }
            }
            PlayMode::Loop { start, end } => {
                self.frame += step;
                let span = end.saturating_sub(start) as f32;
                if span <= 0.0 {
                    self.frame = start as f32;
                } else if self.frame > end as f32 {
                    self.frame = start as f32 + (self.frame - start as f32) % span;
                }
                false
            }
        }
    }
}
