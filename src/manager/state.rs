use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::manager::conference::ParticipantMix;
use crate::options::{AudioCallbacks, AudioOptions};
use crate::playback::AudioHandle;
use crate::track::TrackState;

/// Full manager snapshot handed to state listeners and returned by
/// [`crate::manager::AudiotrackManager::get_state`].
#[derive(Debug, Clone, Serialize)]
pub struct AudiotrackManagerState {
    pub tracks: Vec<TrackState>,
    pub play_requests: Vec<PlayRequest>,
    pub master_volume: f32,
    pub global_muted: bool,
    pub conference_muted: bool,
    pub conference: BTreeMap<String, ParticipantMix>,
}

/// Display metadata carried alongside a play request so a UI can render a
/// consent prompt.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub img_src: Option<String>,
}

/// Public view of a pending request. The registration options and callbacks
/// stay internal until the request is approved.
#[derive(Debug, Clone, Serialize)]
pub struct PlayRequest {
    pub id: String,
    pub src: String,
    pub track_idx: usize,
    pub metadata: Option<RequestMetadata>,
}

/// One entry for [`crate::manager::AudiotrackManager::register_play_requests`].
#[derive(Clone, Default)]
pub struct PlayRequestArgs {
    pub src: String,
    pub options: AudioOptions,
    pub callbacks: AudioCallbacks,
    pub metadata: Option<RequestMetadata>,
}

/// A consented-to registration waiting for approval or dismissal.
pub(crate) struct PendingRequest {
    pub(crate) id: String,
    pub(crate) src: String,
    pub(crate) track_idx: usize,
    pub(crate) options: AudioOptions,
    pub(crate) callbacks: AudioCallbacks,
    pub(crate) metadata: Option<RequestMetadata>,
}

impl PendingRequest {
    pub(crate) fn to_public(&self) -> PlayRequest {
        PlayRequest {
            id: self.id.clone(),
            src: self.src.clone(),
            track_idx: self.track_idx,
            metadata: self.metadata.clone(),
        }
    }
}

/// A fire-and-forget effect playing outside the track system. Tracked only
/// so its callbacks can be dispatched and its handle released on completion.
pub(crate) struct OneShot {
    pub(crate) id: String,
    pub(crate) handle: Arc<dyn AudioHandle>,
    pub(crate) callbacks: AudioCallbacks,
    pub(crate) started: bool,
}
