use serde::Serialize;
use tracing::debug;

use crate::manager::effects::Effects;
use crate::manager::model::Inner;
use crate::util::clamp_unit;

/// Per-participant mix entry in the conference table. The table is pure
/// published state; wiring it to an actual voice stream is the caller's
/// business.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantMix {
    pub volume: f32,
    pub muted: bool,
}

impl Default for ParticipantMix {
    fn default() -> Self {
        Self {
            volume: 1.0,
            muted: false,
        }
    }
}

/// Partial update for one participant.
#[derive(Debug, Clone, Default)]
pub struct ParticipantPatch {
    pub volume: Option<f32>,
    pub muted: Option<bool>,
}

impl Inner {
    /// Seeds entries for participants that are not in the table yet.
    /// Existing entries keep their current mix.
    pub(crate) fn initialize_conference_refs(
        &mut self,
        participants: &[(String, Option<ParticipantMix>)],
        fx: &mut Effects,
    ) {
        let mut changed = false;
        for (id, mix) in participants {
            if self.conference.contains_key(id) {
                if self.debug {
                    debug!(participant = %id, "conference entry already present");
                }
                continue;
            }
            self.conference
                .insert(id.clone(), mix.clone().unwrap_or_default());
            changed = true;
        }
        if changed {
            self.notify_manager(fx);
        }
    }

    /// Upserts a participant's mix.
    pub(crate) fn update_conference_refs(
        &mut self,
        participant: &str,
        patch: &ParticipantPatch,
        fx: &mut Effects,
    ) {
        let entry = self
            .conference
            .entry(participant.to_string())
            .or_default();
        if let Some(v) = patch.volume {
            entry.volume = clamp_unit(v);
        }
        if let Some(m) = patch.muted {
            entry.muted = m;
        }
        self.notify_manager(fx);
    }

    pub(crate) fn set_conference_muted(&mut self, muted: bool, fx: &mut Effects) {
        if self.conference_muted == muted {
            return;
        }
        self.conference_muted = muted;
        self.notify_manager(fx);
    }
}
