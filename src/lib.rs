//! Multi-track audio playback engine.
//!
//! A fixed set of tracks each own a FIFO queue of audio items; only the head
//! of a queue is audible. The [`manager::AudiotrackManager`] coordinates the
//! tracks, layers a master volume and a global mute over their settings,
//! brokers consent-gated play requests and publishes cloned state snapshots
//! to subscribed listeners. Timed caption cues resolve against the playback
//! position of whatever the head item is.
//!
//! Decoding and output run on [`playback::rodio::RodioBackend`] by default;
//! both the backend and the polling scheduler are trait objects so tests can
//! drive playback by hand.

pub mod captions;
pub mod config;
pub mod error;
pub mod manager;
pub mod options;
pub mod playback;
pub mod scheduler;
pub mod track;
mod util;

pub use captions::{CaptionState, LocalizedText, Subtitle, SubtitleTable};
pub use config::{Settings, SettingsPatch};
pub use error::{PlaybackError, Result};
pub use manager::{
    AudiotrackManager, AudiotrackManagerState, ParticipantMix, ParticipantPatch, PlayRequest,
    PlayRequestArgs, RequestMetadata, Subscription, TrackHandle,
};
pub use options::{AudioCallbacks, AudioOptions, DefaultAudioOptions};
pub use playback::{AudioBackend, AudioHandle, EventSink, PlaybackEvent};
pub use scheduler::{RepeatingTask, Scheduler, ThreadScheduler};
pub use track::{
    AudioItemState, InnerAudioState, MatchMethod, SkipTarget, TrackPatch, TrackState, TrackStream,
};
