//! Playback primitive abstraction.
//!
//! The engine never talks to an audio device directly; it opens sources
//! through an [`AudioBackend`] and drives the returned [`AudioHandle`].
//! Handles report lifecycle changes back through the [`EventSink`] they were
//! opened with. The `rodio`-backed production implementation lives in
//! [`rodio`](crate::playback::rodio); tests substitute a mock.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

pub mod rodio;

/// Lifecycle notifications emitted by a handle, in emission order.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// Playback started or resumed.
    Started,
    Paused,
    /// The source played to completion.
    Ended,
    /// Terminal playback failure.
    Error { message: String },
    /// Periodic position report while playing.
    Progress { position: Duration },
}

/// Routes one handle's events into the engine.
///
/// Cloneable so backends can hand it to their worker threads. Emission may
/// happen from any thread; the engine serializes processing internally.
#[derive(Clone)]
pub struct EventSink {
    deliver: Arc<dyn Fn(PlaybackEvent) + Send + Sync>,
}

impl EventSink {
    pub fn new(deliver: impl Fn(PlaybackEvent) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// A sink that drops every event. Useful for probing handles in tests.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: PlaybackEvent) {
        (self.deliver)(event);
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventSink")
    }
}

/// One playable source bound to a device.
///
/// Mutators take effect asynchronously; the outcome is observed through the
/// handle's events, never through a return value. Getters must not emit
/// events or call back into the engine, which reads them while holding its
/// internal lock. Dropping a handle stops playback silently.
pub trait AudioHandle: Send + Sync {
    /// Start or resume playback. Emits `Started` on the transition.
    fn play(&self);
    /// Pause playback. Emits `Paused` on the transition.
    fn pause(&self);
    /// Seek to `position`; unsupported seeks are logged and ignored.
    fn seek(&self, position: Duration);
    fn set_volume(&self, volume: f32);
    fn set_muted(&self, muted: bool);
    fn set_looping(&self, looping: bool);
    fn set_playback_rate(&self, rate: f32);

    fn volume(&self) -> f32;
    fn muted(&self) -> bool;
    fn looping(&self) -> bool;
    fn playback_rate(&self) -> f32;
    fn position(&self) -> Duration;
    fn duration(&self) -> Option<Duration>;
    fn is_paused(&self) -> bool;
}

/// Opens sources into playable handles.
pub trait AudioBackend: Send + Sync {
    /// Open `src` paused. Must not emit events until the handle is driven.
    fn open(&self, src: &str, events: EventSink) -> Result<Arc<dyn AudioHandle>>;
}
