use std::sync::Arc;

use crate::manager::listeners::{ListenerKind, Subscription};
use crate::manager::model::Shared;
use crate::options::{AudioCallbacks, AudioOptions};
use crate::track::{SkipTarget, TrackPatch, TrackState, TrackStream};

/// Borrowed view of one track. Cheap to clone and safe to hold across
/// manager reconfiguration; the index stays valid because tracks are never
/// removed, only grown.
#[derive(Clone)]
pub struct TrackHandle {
    shared: Arc<Shared>,
    index: usize,
}

impl TrackHandle {
    pub(crate) fn new(shared: Arc<Shared>, index: usize) -> Self {
        Self { shared, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> TrackState {
        let inner = self.shared.inner.lock().unwrap();
        inner.tracks[self.index].state.clone()
    }

    pub fn stream(&self) -> TrackStream {
        let inner = self.shared.inner.lock().unwrap();
        inner.tracks[self.index].stream.clone()
    }

    /// Observes the track's published state. The listener stays registered
    /// for as long as the returned [`Subscription`] lives.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&TrackState) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.shared.inner.lock().unwrap();
        let id = inner.alloc_listener_id();
        inner.tracks[self.index]
            .state_listeners
            .add(id, Arc::new(listener));
        Subscription::new(
            Arc::downgrade(&self.shared),
            ListenerKind::TrackState(self.index),
            id,
        )
    }

    /// Observes the high-frequency stream snapshot (position, caption).
    pub fn on_stream_change(
        &self,
        listener: impl Fn(&TrackStream) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.shared.inner.lock().unwrap();
        let id = inner.alloc_listener_id();
        inner.tracks[self.index]
            .stream_listeners
            .add(id, Arc::new(listener));
        Subscription::new(
            Arc::downgrade(&self.shared),
            ListenerKind::TrackStream(self.index),
            id,
        )
    }

    /// Queues a source on this track, ignoring any `track_idx` in the
    /// options.
    pub fn register_audio(&self, src: &str, options: AudioOptions, callbacks: AudioCallbacks) {
        let shared = self.shared.clone();
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.register_audio_on(&shared, index, src, options, callbacks, fx);
        });
    }

    pub fn update(&self, patch: TrackPatch) {
        let shared = self.shared.clone();
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.update_track(&shared, index, &patch, fx);
        });
    }

    /// Toggles the head item between playing and paused. `force` pins the
    /// direction.
    pub fn toggle_play(&self, force: Option<bool>) {
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.toggle_play(index, force, fx);
        });
    }

    /// Resumes the head item only if it was explicitly paused.
    pub fn resume(&self) {
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.resume(index, fx);
        });
    }

    /// Force-ends one queued item. Runs the same completion path a natural
    /// end would, including auto-advance.
    pub fn skip(&self, target: SkipTarget) {
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.skip_audio(index, &target, fx);
        });
    }

    /// Empties the queue, ending the head through the normal completion path
    /// and dropping everything behind it.
    pub fn purge(&self) {
        let index = self.index;
        self.shared.command(|inner, fx| {
            inner.purge_track(index, fx);
        });
    }
}
