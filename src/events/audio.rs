use crate::assets::SoundClip;

/// Stamp of one playback. A replay of the same id gets a new voice, so late
/// replies about an earlier playback can be told apart.
pub type Voice = u64;

/// Commands sent *to* the audio backend
#[derive(Debug)]
pub enum AudioCmd {
    Load { id: String, clip: SoundClip },
    Unload { id: String },
    Play {
        id: String,
        voice: Voice,
        volume: f32,
        looped: bool,
    },
    Stop { id: String, voice: Voice },
    Volume { id: String, volume: f32 },
    PauseAll,
    ResumeAll,
    Shutdown,
}

/// Messages sent *back* from the audio backend
#[derive(Debug, Clone, PartialEq)]
pub enum AudioMessage {
    Loaded { id: String },
    LoadFailed { id: String, error: String },
    Finished { id: String, voice: Voice }, // reached end for non looping
    Stopped { id: String, voice: Voice },
}
