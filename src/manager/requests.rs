use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::manager::effects::Effects;
use crate::manager::model::{Inner, Shared};
use crate::manager::state::{PendingRequest, PlayRequestArgs};

impl Inner {
    /// Queues registrations for later consent instead of playing them
    /// outright. Returns the ids of the requests actually created; entries
    /// targeting unknown tracks or duplicating a pending src are skipped.
    pub(crate) fn register_play_requests(
        &mut self,
        args: Vec<PlayRequestArgs>,
        fx: &mut Effects,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        for arg in args {
            let track_idx = arg
                .options
                .track_idx
                .or(self.defaults.track_idx)
                .unwrap_or(0);
            let Some(track) = self.tracks.get(track_idx) else {
                warn!(track = track_idx, src = %arg.src, "play request for unknown track");
                continue;
            };
            let allow = arg.options.allow_duplicates.unwrap_or(false)
                || track.state.allow_duplicates
                || self.defaults.allow_duplicates.unwrap_or(false);
            if !allow && self.requests.iter().any(|r| r.src == arg.src) {
                if self.debug {
                    debug!(src = %arg.src, "play request already pending");
                }
                continue;
            }
            let id = Uuid::new_v4().to_string();
            ids.push(id.clone());
            self.requests.push(PendingRequest {
                id,
                src: arg.src,
                track_idx,
                options: arg.options,
                callbacks: arg.callbacks,
                metadata: arg.metadata,
            });
        }
        if !ids.is_empty() {
            self.notify_manager(fx);
        }
        ids
    }

    /// Consent granted: the request leaves the pending list and goes through
    /// the normal registration path with everything it was created with.
    pub(crate) fn approve_play_request(
        &mut self,
        shared: &Arc<Shared>,
        id: &str,
        fx: &mut Effects,
    ) {
        let Some(pos) = self.requests.iter().position(|r| r.id == id) else {
            debug!(request = %id, "approve: no such play request");
            return;
        };
        let request = self.requests.remove(pos);
        self.register_audio_on(
            shared,
            request.track_idx,
            &request.src,
            request.options,
            request.callbacks,
            fx,
        );
        self.notify_manager(fx);
    }

    pub(crate) fn dismiss_play_request(&mut self, id: &str, fx: &mut Effects) {
        let Some(pos) = self.requests.iter().position(|r| r.id == id) else {
            debug!(request = %id, "dismiss: no such play request");
            return;
        };
        self.requests.remove(pos);
        self.notify_manager(fx);
    }
}
