//! One registered playable source bound to a backend handle.

use std::sync::Arc;
use std::time::Duration;

use crate::captions::Subtitle;
use crate::manager::effects::Effects;
use crate::options::AudioCallbacks;
use crate::playback::AudioHandle;
use crate::track::state::{AudioItemState, InnerAudioState};

/// Queue entry owning its playback handle and user callbacks.
///
/// Lifecycle flags are written by the engine's event dispatch; everything
/// that touches the handle is deferred through [`Effects`] so no handle call
/// ever runs under the engine lock.
pub(crate) struct AudioItem {
    pub(crate) id: String,
    pub(crate) src: String,
    pub(crate) filename: String,
    pub(crate) handle: Option<Arc<dyn AudioHandle>>,
    pub(crate) started: bool,
    pub(crate) paused: bool,
    pub(crate) ended: bool,
    pub(crate) detached: bool,
    pub(crate) update_frequency: Option<Duration>,
    /// Bumped whenever polling must restart; stale pollers check it and die.
    pub(crate) poller_gen: u64,
    pub(crate) locale: Option<String>,
    pub(crate) subtitles: Vec<Subtitle>,
    pub(crate) callbacks: AudioCallbacks,
}

impl AudioItem {
    pub(crate) fn new(
        id: String,
        src: &str,
        filename: String,
        locale: Option<String>,
        subtitles: Vec<Subtitle>,
        update_frequency: Option<Duration>,
        callbacks: AudioCallbacks,
        handle: Option<Arc<dyn AudioHandle>>,
    ) -> Self {
        Self {
            id,
            src: src.to_string(),
            filename,
            handle,
            started: false,
            paused: false,
            ended: false,
            detached: false,
            update_frequency,
            poller_gen: 0,
            locale,
            subtitles,
            callbacks,
        }
    }

    pub(crate) fn snapshot(&self) -> AudioItemState {
        AudioItemState {
            id: self.id.clone(),
            src: self.src.clone(),
            filename: self.filename.clone(),
            started: self.started,
            paused: self.paused,
            ended: self.ended,
            update_frequency: self.update_frequency,
        }
    }

    pub(crate) fn inner_state(&self) -> Option<InnerAudioState> {
        self.handle
            .as_deref()
            .map(InnerAudioState::capture)
    }

    /// Whether this item currently drives `is_playing` for its track.
    pub(crate) fn is_audible(&self) -> bool {
        self.started && !self.paused && !self.ended
    }

    pub(crate) fn play(&self, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.play());
        }
    }

    pub(crate) fn pause(&self, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.pause());
        }
    }

    pub(crate) fn set_volume(&self, volume: f32, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.set_volume(volume));
        }
    }

    pub(crate) fn set_muted(&self, muted: bool, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.set_muted(muted));
        }
    }

    pub(crate) fn set_looping(&self, looping: bool, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.set_looping(looping));
        }
    }

    pub(crate) fn set_playback_rate(&self, rate: f32, fx: &mut Effects) {
        if let Some(h) = self.handle.clone() {
            fx.push(move || h.set_playback_rate(rate));
        }
    }

    /// Stop listening to this item: pause the handle and rewind it to zero.
    /// Idempotent.
    pub(crate) fn detach(&mut self, fx: &mut Effects) {
        if self.detached {
            return;
        }
        self.detached = true;
        self.poller_gen = self.poller_gen.wrapping_add(1);
        if let Some(h) = self.handle.clone() {
            fx.push(move || {
                h.pause();
                h.seek(Duration::ZERO);
            });
        }
    }
}
