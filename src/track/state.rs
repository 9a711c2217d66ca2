//! Observable track and item snapshots.
//!
//! Everything here is a clone-on-publish projection: subscribers receive
//! owned copies and can never mutate engine state through them.

use std::time::Duration;

use serde::Serialize;

use crate::captions::CaptionState;
use crate::playback::AudioHandle;

/// Lifecycle snapshot of one queued item.
#[derive(Debug, Clone, Serialize)]
pub struct AudioItemState {
    /// Unique for the lifetime of the manager.
    pub id: String,
    pub src: String,
    /// Derived display name (last path segment before the first dot).
    pub filename: String,
    pub started: bool,
    pub paused: bool,
    /// Terminal; an ended item leaves the queue and is never reused.
    pub ended: bool,
    /// Explicit progress cadence, when timer-driven polling is active.
    pub update_frequency: Option<Duration>,
}

/// Durable per-track state: settings plus the queue projection.
#[derive(Debug, Clone, Serialize)]
pub struct TrackState {
    /// Stable per-track token.
    pub id: String,
    pub name: String,
    pub volume: f32,
    pub muted: bool,
    pub looping: bool,
    pub auto_play: bool,
    pub allow_duplicates: bool,
    pub playback_rate: f32,
    pub locale: Option<String>,
    pub update_frequency: Option<Duration>,
    /// Index 0 is the active item; the rest are pending.
    pub queue: Vec<AudioItemState>,
    /// Derived: the head item is started and neither paused nor ended.
    pub is_playing: bool,
}

/// Values reported by the live playback handle.
#[derive(Debug, Clone, Serialize)]
pub struct InnerAudioState {
    pub volume: f32,
    pub muted: bool,
    pub current_time: Duration,
    pub duration: Option<Duration>,
    pub paused: bool,
    pub playback_rate: f32,
}

impl InnerAudioState {
    pub(crate) fn capture(handle: &dyn AudioHandle) -> Self {
        Self {
            volume: handle.volume(),
            muted: handle.muted(),
            current_time: handle.position(),
            duration: handle.duration(),
            paused: handle.is_paused(),
            playback_rate: handle.playback_rate(),
        }
    }
}

/// High-churn playback telemetry, rebuilt on every progress tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackStream {
    pub track_is_playing: bool,
    pub audio_item_state: Option<AudioItemState>,
    pub inner_audio_state: Option<InnerAudioState>,
    pub caption: Option<CaptionState>,
}

/// Partial track-settings update. Unset fields are left unchanged.
///
/// Updates to `looping`, `muted`, `volume`, `playback_rate` and
/// `update_frequency` are re-applied to every queued item, not just the
/// active one.
#[derive(Debug, Clone, Default)]
pub struct TrackPatch {
    pub name: Option<String>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub looping: Option<bool>,
    /// Setting `true` also starts the current head item.
    pub auto_play: Option<bool>,
    pub allow_duplicates: Option<bool>,
    pub playback_rate: Option<f32>,
    /// Applies to items registered after the update.
    pub locale: Option<String>,
    /// `Some(None)` clears the cadence override and re-enables native
    /// progress events.
    pub update_frequency: Option<Option<Duration>>,
}
