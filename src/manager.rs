//! The coordinator: owns every track, the pending play requests, the
//! one-shot effects and the global mix (master volume, global mute,
//! conference table). All mutation funnels through a single lock; user
//! callbacks and backend calls run after it is released.

mod conference;
pub(crate) mod effects;
mod handle;
pub(crate) mod listeners;
mod model;
mod requests;
mod state;

pub use conference::{ParticipantMix, ParticipantPatch};
pub use handle::TrackHandle;
pub use listeners::Subscription;
pub use model::AudiotrackManager;
pub use state::{AudiotrackManagerState, PlayRequest, PlayRequestArgs, RequestMetadata};
