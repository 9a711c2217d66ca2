//! Tracks: independently-sequenced playback lanes.
//!
//! A track owns an ordered queue of [`AudioItem`](item) entries (index 0 is
//! the active one) plus the settings that apply to every item in the queue.
//! It publishes two projections: a durable `TrackState` and a high-churn
//! `TrackStream` carrying playback telemetry and the current caption.

mod item;
mod model;
mod queue;
mod state;

pub use queue::{MatchMethod, SkipTarget};
pub use state::{AudioItemState, InnerAudioState, TrackPatch, TrackState, TrackStream};

pub(crate) use item::AudioItem;
pub(crate) use model::Track;
pub(crate) use queue::{matches_src, resolve_insert_index};

#[cfg(test)]
mod tests;
