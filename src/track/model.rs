use std::time::Duration;

use uuid::Uuid;

use crate::captions::resolve_caption;
use crate::manager::effects::Effects;
use crate::manager::listeners::ListenerSet;
use crate::options::DefaultAudioOptions;
use crate::track::item::AudioItem;
use crate::track::state::{TrackPatch, TrackState, TrackStream};
use crate::util::clamp_unit;

/// One playback lane: a queue of [`AudioItem`]s plus the published
/// snapshots and their listeners. Only the head of the queue is ever
/// audible; everything behind it waits its turn.
pub(crate) struct Track {
    pub(crate) state: TrackState,
    pub(crate) items: Vec<AudioItem>,
    pub(crate) stream: TrackStream,
    pub(crate) state_listeners: ListenerSet<TrackState>,
    pub(crate) stream_listeners: ListenerSet<TrackStream>,
}

impl Track {
    pub(crate) fn new(
        index: usize,
        defaults: &DefaultAudioOptions,
        supported_locales: &[String],
        fallback_locale: &str,
    ) -> Self {
        let locale = defaults.locale.as_ref().map(|loc| {
            if supported_locales.iter().any(|s| s == loc) {
                loc.clone()
            } else {
                fallback_locale.to_string()
            }
        });
        Self {
            state: TrackState {
                id: Uuid::new_v4().to_string(),
                name: format!("Track #{}", index + 1),
                volume: clamp_unit(defaults.volume.unwrap_or(1.0)),
                muted: defaults.muted.unwrap_or(false),
                looping: defaults.looping.unwrap_or(false),
                auto_play: defaults.auto_play.unwrap_or(false),
                allow_duplicates: defaults.allow_duplicates.unwrap_or(false),
                playback_rate: defaults.playback_rate.unwrap_or(1.0),
                locale,
                update_frequency: defaults.update_frequency_ms.map(Duration::from_millis),
                queue: Vec::new(),
                is_playing: false,
            },
            items: Vec::new(),
            stream: TrackStream::default(),
            state_listeners: ListenerSet::new(),
            stream_listeners: ListenerSet::new(),
        }
    }

    pub(crate) fn head(&self) -> Option<&AudioItem> {
        self.items.first()
    }

    pub(crate) fn position_of(&self, item_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == item_id)
    }

    /// Rebuild the published queue/playing snapshot and the stream from the
    /// live items.
    pub(crate) fn refresh(&mut self, fallback_locale: &str) {
        self.state.queue = self.items.iter().map(|item| item.snapshot()).collect();
        self.state.is_playing = self.head().is_some_and(|head| head.is_audible());
        self.refresh_stream(fallback_locale);
    }

    /// Rebuild only the stream snapshot. Cheap enough for the progress path.
    pub(crate) fn refresh_stream(&mut self, fallback_locale: &str) {
        let Some(head) = self.items.first() else {
            self.stream = TrackStream::default();
            return;
        };
        let inner = head.inner_state();
        let caption = if head.started && !head.ended {
            let position = inner.as_ref().map(|s| s.current_time).unwrap_or_default();
            resolve_caption(
                &head.subtitles,
                position,
                head.locale.as_deref(),
                fallback_locale,
            )
        } else {
            None
        };
        self.stream = TrackStream {
            track_is_playing: head.is_audible(),
            audio_item_state: Some(head.snapshot()),
            inner_audio_state: inner,
            caption,
        };
    }

    /// Reset configurable fields from fresh defaults. Queue contents are left
    /// alone; live items keep the properties they were created with.
    pub(crate) fn reconstruct(
        &mut self,
        defaults: &DefaultAudioOptions,
        supported_locales: &[String],
        fallback_locale: &str,
    ) {
        if let Some(v) = defaults.volume {
            self.state.volume = clamp_unit(v);
        }
        if let Some(m) = defaults.muted {
            self.state.muted = m;
        }
        if let Some(l) = defaults.looping {
            self.state.looping = l;
        }
        if let Some(a) = defaults.auto_play {
            self.state.auto_play = a;
        }
        if let Some(a) = defaults.allow_duplicates {
            self.state.allow_duplicates = a;
        }
        if let Some(r) = defaults.playback_rate {
            self.state.playback_rate = r;
        }
        if let Some(loc) = &defaults.locale {
            self.state.locale = Some(if supported_locales.iter().any(|s| s == loc) {
                loc.clone()
            } else {
                fallback_locale.to_string()
            });
        }
        if let Some(ms) = defaults.update_frequency_ms {
            self.state.update_frequency = Some(Duration::from_millis(ms));
        }
    }

    /// Apply a partial update and propagate the audible consequences to every
    /// queued item. `master_volume` and `global_muted` are the manager-level
    /// layers that combine with the track's own settings.
    pub(crate) fn apply_patch(
        &mut self,
        patch: &TrackPatch,
        master_volume: f32,
        global_muted: bool,
        fx: &mut Effects,
    ) {
        if let Some(name) = &patch.name {
            self.state.name = name.clone();
        }
        if let Some(v) = patch.volume {
            let v = clamp_unit(v);
            self.state.volume = v;
            let effective = clamp_unit(v * master_volume);
            for item in &self.items {
                item.set_volume(effective, fx);
            }
        }
        if let Some(m) = patch.muted {
            self.state.muted = m;
            let effective = m || global_muted;
            for item in &self.items {
                item.set_muted(effective, fx);
            }
        }
        if let Some(l) = patch.looping {
            self.state.looping = l;
            for item in &self.items {
                item.set_looping(l, fx);
            }
        }
        if let Some(r) = patch.playback_rate {
            self.state.playback_rate = r;
            for item in &self.items {
                item.set_playback_rate(r, fx);
            }
        }
        if let Some(loc) = &patch.locale {
            self.state.locale = Some(loc.clone());
        }
        if let Some(a) = patch.allow_duplicates {
            self.state.allow_duplicates = a;
        }
        if let Some(freq) = patch.update_frequency {
            self.state.update_frequency = freq;
            for item in &mut self.items {
                item.update_frequency = freq;
                // Invalidate any poller driving the old cadence.
                item.poller_gen = item.poller_gen.wrapping_add(1);
            }
        }
        if let Some(a) = patch.auto_play {
            self.state.auto_play = a;
            if a {
                if let Some(head) = self.items.first() {
                    head.play(fx);
                }
            }
        }
    }
}
