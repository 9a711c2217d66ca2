use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::captions::{load_subtitle_table, SubtitleTable};
use crate::config::{Settings, SettingsPatch};
use crate::error::PlaybackError;
use crate::manager::conference::{ParticipantMix, ParticipantPatch};
use crate::manager::effects::Effects;
use crate::manager::listeners::{ListenerKind, ListenerSet, Subscription};
use crate::manager::state::{
    AudiotrackManagerState, OneShot, PendingRequest, PlayRequestArgs,
};
use crate::manager::TrackHandle;
use crate::options::{resolve_effective, AudioCallbacks, AudioOptions, DefaultAudioOptions};
use crate::playback::{AudioBackend, AudioHandle, EventSink, PlaybackEvent};
use crate::scheduler::{Scheduler, ThreadScheduler};
use crate::track::{
    matches_src, resolve_insert_index, AudioItem, SkipTarget, Track, TrackPatch, TrackState,
    TrackStream,
};
use crate::util::clamp_unit;

/// Where a backend notification should land.
#[derive(Clone)]
pub(crate) enum EventTarget {
    Track { index: usize, item_id: String },
    OneShot { id: String },
}

/// Everything behind the lock plus the injected collaborators. Handles and
/// subscriptions hold this; the manager is just the owning façade.
pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) backend: Arc<dyn AudioBackend>,
    pub(crate) scheduler: Arc<dyn Scheduler>,
}

impl Shared {
    /// Runs one mutation under the lock, then the deferred work outside it.
    pub(crate) fn command<R>(self: &Arc<Self>, f: impl FnOnce(&mut Inner, &mut Effects) -> R) -> R {
        let mut fx = Effects::new();
        let out = {
            let mut inner = self.inner.lock().unwrap();
            f(&mut inner, &mut fx)
        };
        fx.run();
        out
    }

    /// Builds the notification sink handed to the backend for one source.
    /// The sink holds only a weak reference, so a dropped engine silently
    /// swallows late events.
    pub(crate) fn event_sink(self: &Arc<Self>, target: EventTarget) -> EventSink {
        let weak = Arc::downgrade(self);
        EventSink::new(move |event| {
            if let Some(shared) = weak.upgrade() {
                shared.dispatch(target.clone(), event);
            }
        })
    }

    pub(crate) fn dispatch(self: &Arc<Self>, target: EventTarget, event: PlaybackEvent) {
        let mut fx = Effects::new();
        {
            let mut inner = self.inner.lock().unwrap();
            match &target {
                EventTarget::Track { index, item_id } => {
                    inner.handle_track_event(self, *index, item_id, event, &mut fx);
                }
                EventTarget::OneShot { id } => {
                    inner.handle_one_shot_event(id, event, &mut fx);
                }
            }
        }
        fx.run();
    }

    fn poll_tick(self: &Arc<Self>, index: usize, item_id: &str, r#gen: u64, every: Duration) -> bool {
        let mut fx = Effects::new();
        let alive = {
            let mut inner = self.inner.lock().unwrap();
            inner.poller_update(index, item_id, r#gen, every, &mut fx)
        };
        fx.run();
        alive
    }
}

/// Schedules the timer that drives `on_update` for one item. The captured
/// generation pins the timer to one play span; any pause, seek-to-front or
/// frequency change bumps the generation and the timer cancels itself.
fn spawn_poller(
    shared: &Arc<Shared>,
    index: usize,
    item_id: String,
    r#gen: u64,
    every: Duration,
    fx: &mut Effects,
) {
    let weak = Arc::downgrade(shared);
    let scheduler = shared.scheduler.clone();
    fx.push(move || {
        scheduler.repeat(
            every,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else {
                    return false;
                };
                shared.poll_tick(index, &item_id, r#gen, every)
            }),
        );
    });
}

pub(crate) struct Inner {
    pub(crate) tracks: Vec<Track>,
    pub(crate) requests: Vec<PendingRequest>,
    pub(crate) one_shots: Vec<OneShot>,
    pub(crate) state_listeners: ListenerSet<AudiotrackManagerState>,
    pub(crate) master_volume: f32,
    pub(crate) global_muted: bool,
    pub(crate) conference_muted: bool,
    pub(crate) conference: BTreeMap<String, ParticipantMix>,
    pub(crate) defaults: DefaultAudioOptions,
    pub(crate) supported_locales: Vec<String>,
    pub(crate) fallback_locale: String,
    pub(crate) subtitles: SubtitleTable,
    pub(crate) debug: bool,
    next_listener_id: u64,
}

impl Inner {
    pub(crate) fn alloc_listener_id(&mut self) -> u64 {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        id
    }

    pub(crate) fn snapshot(&self) -> AudiotrackManagerState {
        AudiotrackManagerState {
            tracks: self.tracks.iter().map(|t| t.state.clone()).collect(),
            play_requests: self.requests.iter().map(|r| r.to_public()).collect(),
            master_volume: self.master_volume,
            global_muted: self.global_muted,
            conference_muted: self.conference_muted,
            conference: self.conference.clone(),
        }
    }

    /// Full republish for one track: state, stream, and the manager
    /// snapshot, in that order.
    pub(crate) fn commit_track(&mut self, index: usize, fx: &mut Effects) {
        let fallback = self.fallback_locale.clone();
        let (state, stream, state_ls, stream_ls) = {
            let track = &mut self.tracks[index];
            track.refresh(&fallback);
            (
                track.state.clone(),
                track.stream.clone(),
                track.state_listeners.snapshot(),
                track.stream_listeners.snapshot(),
            )
        };
        if !state_ls.is_empty() {
            fx.push(move || {
                for listener in &state_ls {
                    listener(&state);
                }
            });
        }
        if !stream_ls.is_empty() {
            fx.push(move || {
                for listener in &stream_ls {
                    listener(&stream);
                }
            });
        }
        self.notify_manager(fx);
    }

    /// Stream-only republish, used on the progress path where the queue
    /// itself has not changed.
    pub(crate) fn commit_stream(&mut self, index: usize, fx: &mut Effects) {
        let fallback = self.fallback_locale.clone();
        let (stream, stream_ls) = {
            let track = &mut self.tracks[index];
            track.refresh_stream(&fallback);
            (track.stream.clone(), track.stream_listeners.snapshot())
        };
        if !stream_ls.is_empty() {
            fx.push(move || {
                for listener in &stream_ls {
                    listener(&stream);
                }
            });
        }
    }

    pub(crate) fn notify_manager(&self, fx: &mut Effects) {
        if self.state_listeners.is_empty() {
            return;
        }
        let listeners = self.state_listeners.snapshot();
        let snapshot = self.snapshot();
        fx.push(move || {
            for listener in &listeners {
                listener(&snapshot);
            }
        });
    }

    pub(crate) fn handle_track_event(
        &mut self,
        shared: &Arc<Shared>,
        index: usize,
        item_id: &str,
        event: PlaybackEvent,
        fx: &mut Effects,
    ) {
        let Some(pos) = self
            .tracks
            .get(index)
            .and_then(|t| t.position_of(item_id))
        else {
            // Stale: the item already left the queue.
            return;
        };
        match event {
            PlaybackEvent::Started => self.on_started(shared, index, pos, fx),
            PlaybackEvent::Paused => self.on_paused(index, pos, fx),
            PlaybackEvent::Progress { .. } => self.on_progress(index, pos, fx),
            PlaybackEvent::Ended => self.end_item(index, pos, None, fx),
            PlaybackEvent::Error { message } => {
                self.end_item(index, pos, Some(PlaybackError::Backend(message)), fx);
            }
        }
    }

    fn on_started(&mut self, shared: &Arc<Shared>, index: usize, pos: usize, fx: &mut Effects) {
        let poll = {
            let item = &mut self.tracks[index].items[pos];
            if item.ended || item.detached {
                return;
            }
            let first_run = !item.started;
            item.started = true;
            item.paused = false;
            item.poller_gen = item.poller_gen.wrapping_add(1);
            if let Some(cb) = item.callbacks.on_play.clone() {
                fx.push(move || cb(first_run));
            }
            item.update_frequency
                .map(|every| (every, item.poller_gen, item.id.clone()))
        };
        if pos != 0 {
            warn!(track = index, "a queued item behind the head reported playback");
        }
        if let Some((every, r#gen, item_id)) = poll {
            spawn_poller(shared, index, item_id, r#gen, every, fx);
        }
        self.commit_track(index, fx);
    }

    fn on_paused(&mut self, index: usize, pos: usize, fx: &mut Effects) {
        {
            let item = &mut self.tracks[index].items[pos];
            if item.ended {
                return;
            }
            item.paused = true;
            item.poller_gen = item.poller_gen.wrapping_add(1);
            if let Some(cb) = item.callbacks.on_pause.clone() {
                fx.push(move || cb());
            }
        }
        self.commit_track(index, fx);
    }

    fn on_progress(&mut self, index: usize, pos: usize, fx: &mut Effects) {
        {
            let item = &self.tracks[index].items[pos];
            if item.ended || item.detached || pos != 0 {
                return;
            }
            // A polling timer owns the update cadence for this item.
            if item.update_frequency.is_some() {
                return;
            }
            if let Some(cb) = item.callbacks.on_update.clone() {
                fx.push(move || cb());
            }
        }
        self.commit_stream(index, fx);
    }

    /// Shared completion path for natural ends, playback errors and forced
    /// skips. Removes the item by identity, runs its terminal callbacks and
    /// auto-advances the queue.
    fn end_item(
        &mut self,
        index: usize,
        pos: usize,
        error: Option<PlaybackError>,
        fx: &mut Effects,
    ) {
        let auto_play = self.tracks[index].state.auto_play;
        let removed = {
            let track = &mut self.tracks[index];
            let item = &mut track.items[pos];
            if item.ended {
                return;
            }
            item.ended = true;
            match error {
                Some(err) => {
                    match item.callbacks.on_error.clone() {
                        Some(cb) => fx.push(move || cb(&err)),
                        None => warn!(track = index, error = %err, "audio item failed"),
                    }
                    if let Some(cb) = item.callbacks.on_end.clone() {
                        fx.push(move || cb());
                    }
                    item.detach(fx);
                }
                None => {
                    item.detach(fx);
                    if let Some(cb) = item.callbacks.on_end.clone() {
                        fx.push(move || cb());
                    }
                    if let Some(cb) = item.callbacks.on_resolve.clone() {
                        fx.push(move || cb());
                    }
                }
            }
            track.items.remove(pos)
        };
        fx.push(move || drop(removed));
        if auto_play {
            if let Some(next) = self.tracks[index].head() {
                next.play(fx);
            }
        }
        self.commit_track(index, fx);
    }

    pub(crate) fn handle_one_shot_event(
        &mut self,
        id: &str,
        event: PlaybackEvent,
        fx: &mut Effects,
    ) {
        let Some(pos) = self.one_shots.iter().position(|shot| shot.id == id) else {
            return;
        };
        match event {
            PlaybackEvent::Started => {
                let shot = &mut self.one_shots[pos];
                let first_run = !shot.started;
                shot.started = true;
                if let Some(cb) = shot.callbacks.on_play.clone() {
                    fx.push(move || cb(first_run));
                }
            }
            PlaybackEvent::Paused => {
                if let Some(cb) = self.one_shots[pos].callbacks.on_pause.clone() {
                    fx.push(move || cb());
                }
            }
            PlaybackEvent::Progress { .. } => {
                if let Some(cb) = self.one_shots[pos].callbacks.on_update.clone() {
                    fx.push(move || cb());
                }
            }
            PlaybackEvent::Ended => {
                let OneShot {
                    handle, callbacks, ..
                } = self.one_shots.remove(pos);
                if let Some(cb) = callbacks.on_end {
                    fx.push(move || cb());
                }
                if let Some(cb) = callbacks.on_resolve {
                    fx.push(move || cb());
                }
                fx.push(move || drop(handle));
            }
            PlaybackEvent::Error { message } => {
                let OneShot {
                    handle, callbacks, ..
                } = self.one_shots.remove(pos);
                let err = PlaybackError::Backend(message);
                match callbacks.on_error {
                    Some(cb) => fx.push(move || cb(&err)),
                    None => warn!(error = %err, "one-shot failed"),
                }
                if let Some(cb) = callbacks.on_end {
                    fx.push(move || cb());
                }
                fx.push(move || drop(handle));
            }
        }
    }

    fn poller_update(
        &mut self,
        index: usize,
        item_id: &str,
        r#gen: u64,
        every: Duration,
        fx: &mut Effects,
    ) -> bool {
        let head_cb = {
            let Some(track) = self.tracks.get(index) else {
                return false;
            };
            let Some(pos) = track.position_of(item_id) else {
                return false;
            };
            let item = &track.items[pos];
            if item.poller_gen != r#gen
                || item.ended
                || item.detached
                || item.paused
                || item.handle.is_none()
                || item.update_frequency != Some(every)
            {
                return false;
            }
            if pos != 0 {
                return true;
            }
            item.callbacks.on_update.clone()
        };
        if let Some(cb) = head_cb {
            fx.push(move || cb());
        }
        self.commit_stream(index, fx);
        true
    }

    pub(crate) fn register_audio(
        &mut self,
        shared: &Arc<Shared>,
        src: &str,
        options: AudioOptions,
        callbacks: AudioCallbacks,
        fx: &mut Effects,
    ) {
        let index = options.track_idx.or(self.defaults.track_idx).unwrap_or(0);
        self.register_audio_on(shared, index, src, options, callbacks, fx);
    }

    pub(crate) fn register_audio_on(
        &mut self,
        shared: &Arc<Shared>,
        index: usize,
        src: &str,
        options: AudioOptions,
        callbacks: AudioCallbacks,
        fx: &mut Effects,
    ) {
        let Some(track) = self.tracks.get(index) else {
            warn!(track = index, src, "registration for unknown track");
            return;
        };
        let allow = options.allow_duplicates.unwrap_or(false) || track.state.allow_duplicates;
        if !allow && track.items.iter().any(|item| item.src == src) {
            if self.debug {
                debug!(track = index, src, "duplicate source rejected");
            }
            return;
        }
        let effective = resolve_effective(
            src,
            &options,
            &track.state,
            &self.defaults,
            &self.supported_locales,
            &self.fallback_locale,
            &self.subtitles,
        );
        let id = Uuid::new_v4().to_string();
        let sink = shared.event_sink(EventTarget::Track {
            index,
            item_id: id.clone(),
        });
        let handle = match shared.backend.open(src, sink) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(track = index, src, error = %err, "failed to open source");
                if let Some(cb) = callbacks.on_error {
                    fx.push(move || cb(&err));
                }
                if let Some(cb) = callbacks.on_end {
                    fx.push(move || cb());
                }
                return;
            }
        };
        {
            let handle = handle.clone();
            let volume = clamp_unit(effective.volume * self.master_volume);
            let muted = effective.muted || self.global_muted;
            let looping = effective.looping;
            let rate = effective.playback_rate;
            fx.push(move || {
                handle.set_volume(volume);
                handle.set_muted(muted);
                handle.set_looping(looping);
                handle.set_playback_rate(rate);
            });
        }
        let item = AudioItem::new(
            id,
            src,
            effective.filename,
            effective.locale,
            effective.subtitles,
            effective.update_frequency,
            callbacks,
            Some(handle),
        );
        let (was_empty, prev_head) = {
            let track = &mut self.tracks[index];
            let was_empty = track.items.is_empty();
            let head_started = track.head().is_some_and(|head| head.started);
            let prev_head = track.head().map(|head| head.id.clone());
            let at = resolve_insert_index(track.items.len(), head_started, options.insert_at);
            track.items.insert(at, item);
            (was_empty, prev_head)
        };
        if options.skip_current {
            if let Some(prev) = prev_head {
                if let Some(pos) = self.tracks[index].position_of(&prev) {
                    self.end_item(index, pos, None, fx);
                }
            }
        }
        if self.tracks[index].state.auto_play && was_empty {
            if let Some(head) = self.tracks[index].head() {
                head.play(fx);
            }
        }
        self.commit_track(index, fx);
    }

    /// Plays a source outside the track system. There is no queueing and no
    /// coupling to global mute; the handle is the caller's remote control.
    pub(crate) fn play_audio(
        &mut self,
        shared: &Arc<Shared>,
        src: &str,
        options: AudioOptions,
        callbacks: AudioCallbacks,
        fx: &mut Effects,
    ) -> Option<Arc<dyn AudioHandle>> {
        let id = Uuid::new_v4().to_string();
        let sink = shared.event_sink(EventTarget::OneShot { id: id.clone() });
        let handle = match shared.backend.open(src, sink) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(src, error = %err, "failed to open one-shot source");
                if let Some(cb) = callbacks.on_error {
                    fx.push(move || cb(&err));
                }
                if let Some(cb) = callbacks.on_end {
                    fx.push(move || cb());
                }
                return None;
            }
        };
        {
            let handle = handle.clone();
            let volume = clamp_unit(options.volume.unwrap_or(self.master_volume));
            let muted = options.muted.unwrap_or(false);
            let looping = options.looping.unwrap_or(false);
            let rate = options.playback_rate.unwrap_or(1.0);
            fx.push(move || {
                handle.set_volume(volume);
                handle.set_muted(muted);
                handle.set_looping(looping);
                handle.set_playback_rate(rate);
                handle.play();
            });
        }
        self.one_shots.push(OneShot {
            id,
            handle: handle.clone(),
            callbacks,
            started: false,
        });
        Some(handle)
    }

    pub(crate) fn toggle_play(&mut self, index: usize, force: Option<bool>, fx: &mut Effects) {
        let Some(track) = self.tracks.get(index) else {
            warn!(track = index, "toggle for unknown track");
            return;
        };
        let Some(head) = track.head() else {
            if self.debug {
                debug!(track = index, "toggle on an empty track");
            }
            return;
        };
        let play = force.unwrap_or(!(head.started && !head.paused));
        if play {
            head.play(fx);
        } else {
            head.pause(fx);
        }
    }

    pub(crate) fn resume(&mut self, index: usize, fx: &mut Effects) {
        let Some(track) = self.tracks.get(index) else {
            warn!(track = index, "resume for unknown track");
            return;
        };
        if let Some(head) = track.head() {
            if head.paused {
                head.play(fx);
            }
        }
    }

    pub(crate) fn skip_audio(&mut self, index: usize, target: &SkipTarget, fx: &mut Effects) {
        let Some(track) = self.tracks.get(index) else {
            warn!(track = index, "skip for unknown track");
            return;
        };
        let pos = match target {
            SkipTarget::Index(i) => (*i < track.items.len()).then_some(*i),
            SkipTarget::Source { pattern, method } => track
                .items
                .iter()
                .position(|item| matches_src(&item.src, pattern, *method)),
        };
        let Some(pos) = pos else {
            if self.debug {
                debug!(track = index, "skip matched nothing");
            }
            return;
        };
        self.end_item(index, pos, None, fx);
    }

    /// Empties the queue. Items behind the head are dropped without
    /// callbacks; the head goes through the normal completion path.
    pub(crate) fn purge_track(&mut self, index: usize, fx: &mut Effects) {
        if index >= self.tracks.len() {
            warn!(track = index, "purge for unknown track");
            return;
        }
        {
            let track = &mut self.tracks[index];
            for item in track.items.iter_mut().skip(1) {
                item.detach(fx);
            }
            if track.items.len() > 1 {
                let tail = track.items.split_off(1);
                fx.push(move || drop(tail));
            }
        }
        if self.tracks[index].items.is_empty() {
            self.commit_track(index, fx);
        } else {
            self.end_item(index, 0, None, fx);
        }
    }

    pub(crate) fn purge_all_tracks(&mut self, fx: &mut Effects) {
        for index in 0..self.tracks.len() {
            self.purge_track(index, fx);
        }
    }

    pub(crate) fn update_track(
        &mut self,
        shared: &Arc<Shared>,
        index: usize,
        patch: &TrackPatch,
        fx: &mut Effects,
    ) {
        if index >= self.tracks.len() {
            warn!(track = index, "update for unknown track");
            return;
        }
        if patch.muted == Some(false) && self.global_muted {
            // Unmuting one track lifts the global mute; every other track
            // falls back to its own flag.
            self.global_muted = false;
            for (i, track) in self.tracks.iter().enumerate() {
                if i == index {
                    continue;
                }
                let effective = track.state.muted;
                for item in &track.items {
                    item.set_muted(effective, fx);
                }
            }
        }
        let master = self.master_volume;
        let global = self.global_muted;
        self.tracks[index].apply_patch(patch, master, global, fx);
        if patch.update_frequency.is_some() {
            self.restart_head_poller(shared, index, fx);
        }
        self.commit_track(index, fx);
    }

    pub(crate) fn update_all_tracks(
        &mut self,
        shared: &Arc<Shared>,
        patch: &TrackPatch,
        fx: &mut Effects,
    ) {
        if let Some(muted) = patch.muted {
            self.global_muted = muted;
        }
        for index in 0..self.tracks.len() {
            let master = self.master_volume;
            let global = self.global_muted;
            self.tracks[index].apply_patch(patch, master, global, fx);
            if patch.update_frequency.is_some() {
                self.restart_head_poller(shared, index, fx);
            }
            self.commit_track(index, fx);
        }
    }

    fn restart_head_poller(&self, shared: &Arc<Shared>, index: usize, fx: &mut Effects) {
        let Some(head) = self.tracks[index].head() else {
            return;
        };
        if !head.is_audible() {
            return;
        }
        if let Some(every) = head.update_frequency {
            spawn_poller(shared, index, head.id.clone(), head.poller_gen, every, fx);
        }
    }

    pub(crate) fn set_master_volume(&mut self, volume: f32, fx: &mut Effects) {
        let volume = clamp_unit(volume);
        self.master_volume = volume;
        for track in &self.tracks {
            let effective = clamp_unit(track.state.volume * volume);
            for item in &track.items {
                item.set_volume(effective, fx);
            }
        }
        self.notify_manager(fx);
    }

    pub(crate) fn toggle_global_mute(&mut self, force: Option<bool>, fx: &mut Effects) {
        let muted = force.unwrap_or(!self.global_muted);
        self.global_muted = muted;
        for track in &self.tracks {
            let effective = track.state.muted || muted;
            for item in &track.items {
                item.set_muted(effective, fx);
            }
        }
        self.notify_manager(fx);
    }

    pub(crate) fn set_configuration(&mut self, patch: &SettingsPatch, fx: &mut Effects) {
        if let Some(debug) = patch.debug {
            self.debug = debug;
        }
        if let Some(table) = &patch.subtitles {
            self.subtitles = table.clone();
        }
        if let Some(locales) = &patch.supported_locales {
            if locales.is_empty() {
                warn!("ignoring empty supported_locales");
            } else {
                self.supported_locales = locales.clone();
            }
        }
        if let Some(fallback) = &patch.fallback_locale {
            self.fallback_locale = fallback.clone();
        }
        if !self.supported_locales.contains(&self.fallback_locale) {
            warn!(fallback = %self.fallback_locale, "fallback locale not in supported set");
            self.fallback_locale = self.supported_locales[0].clone();
        }
        if let Some(defaults) = &patch.default_audio {
            let mut defaults = defaults.clone();
            if let Some(locale) = &defaults.locale {
                if !self.supported_locales.contains(locale) {
                    warn!(locale = %locale, "default locale not in supported set");
                    defaults.locale = Some(self.fallback_locale.clone());
                }
            }
            self.defaults = defaults;
        }
        if let Some(volume) = patch.master_volume {
            self.set_master_volume(volume, fx);
        }
        if let Some(n) = patch.track_length {
            self.grow_tracks(n);
        }
        self.notify_manager(fx);
    }

    fn grow_tracks(&mut self, n: usize) {
        if n == 0 {
            warn!("track_length must be at least 1");
            return;
        }
        if n < self.tracks.len() {
            warn!(
                requested = n,
                current = self.tracks.len(),
                "shrinking tracks is unsupported"
            );
            return;
        }
        for i in self.tracks.len()..n {
            self.tracks.push(Track::new(
                i,
                &self.defaults,
                &self.supported_locales,
                &self.fallback_locale,
            ));
        }
    }

    /// Hard reset: ends everything currently queued (callbacks fire), applies
    /// the configuration patch, then re-seeds every track from the defaults.
    /// Track identities and their listeners survive.
    pub(crate) fn initialize(&mut self, patch: &SettingsPatch, fx: &mut Effects) {
        self.teardown_tracks(fx, true);
        let mut rest = patch.clone();
        rest.track_length = None;
        self.set_configuration(&rest, fx);
        if let Some(n) = patch.track_length {
            self.grow_tracks(n);
        }
        let defaults = self.defaults.clone();
        let supported = self.supported_locales.clone();
        let fallback = self.fallback_locale.clone();
        for index in 0..self.tracks.len() {
            self.tracks[index].reconstruct(&defaults, &supported, &fallback);
            self.commit_track(index, fx);
        }
    }

    /// Ends every queued item wholesale. Used by `initialize` (callbacks
    /// fire) and `shutdown` (they do not).
    fn teardown_tracks(&mut self, fx: &mut Effects, with_callbacks: bool) {
        let fallback = self.fallback_locale.clone();
        for track in &mut self.tracks {
            for item in &mut track.items {
                if item.ended {
                    continue;
                }
                item.ended = true;
                item.detach(fx);
                if with_callbacks {
                    if let Some(cb) = item.callbacks.on_end.clone() {
                        fx.push(move || cb());
                    }
                    if let Some(cb) = item.callbacks.on_resolve.clone() {
                        fx.push(move || cb());
                    }
                }
            }
            if !track.items.is_empty() {
                let drained: Vec<AudioItem> = track.items.drain(..).collect();
                fx.push(move || drop(drained));
            }
            track.refresh(&fallback);
        }
    }

    /// Silent teardown of everything, listeners included.
    pub(crate) fn shutdown(&mut self, fx: &mut Effects) {
        self.teardown_tracks(fx, false);
        let shots = std::mem::take(&mut self.one_shots);
        if !shots.is_empty() {
            fx.push(move || drop(shots));
        }
        self.requests.clear();
        self.state_listeners.clear();
        for track in &mut self.tracks {
            track.state_listeners.clear();
            track.stream_listeners.clear();
        }
    }
}

/// The front-of-house API. One instance owns the whole engine; every handle
/// and subscription keeps the engine alive through its `Arc`.
pub struct AudiotrackManager {
    shared: Arc<Shared>,
}

impl AudiotrackManager {
    /// Builds the engine with the production thread scheduler.
    pub fn new(settings: Settings, backend: Arc<dyn AudioBackend>) -> Self {
        Self::with_scheduler(settings, backend, Arc::new(ThreadScheduler))
    }

    /// Builds the engine with an injected scheduler. Settings are sanitized
    /// rather than rejected; anything off-range is logged and coerced.
    pub fn with_scheduler(
        settings: Settings,
        backend: Arc<dyn AudioBackend>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        let track_length = if settings.track_length == 0 {
            warn!("track_length must be at least 1");
            1
        } else {
            settings.track_length
        };
        let master_volume = clamp_unit(settings.master_volume);
        let supported_locales = if settings.supported_locales.is_empty() {
            warn!("supported_locales is empty, using \"en\"");
            vec!["en".to_string()]
        } else {
            settings.supported_locales
        };
        let fallback_locale = if supported_locales.contains(&settings.fallback_locale) {
            settings.fallback_locale
        } else {
            warn!(fallback = %settings.fallback_locale, "fallback locale not in supported set");
            supported_locales[0].clone()
        };
        let mut defaults = settings.default_audio;
        if let Some(locale) = &defaults.locale {
            if !supported_locales.contains(locale) {
                warn!(locale = %locale, "default locale not in supported set");
                defaults.locale = Some(fallback_locale.clone());
            }
        }
        let subtitles = match &settings.subtitles_path {
            Some(path) => match load_subtitle_table(path) {
                Ok(table) => table,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "failed to load subtitle table");
                    SubtitleTable::new()
                }
            },
            None => SubtitleTable::new(),
        };
        let tracks = (0..track_length)
            .map(|i| Track::new(i, &defaults, &supported_locales, &fallback_locale))
            .collect();
        let inner = Inner {
            tracks,
            requests: Vec::new(),
            one_shots: Vec::new(),
            state_listeners: ListenerSet::new(),
            master_volume,
            global_muted: false,
            conference_muted: false,
            conference: BTreeMap::new(),
            defaults,
            supported_locales,
            fallback_locale,
            subtitles,
            debug: settings.debug,
            next_listener_id: 0,
        };
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                backend,
                scheduler,
            }),
        }
    }

    /// Queues a source on the resolved track (explicit `track_idx`, then the
    /// configured default, then track 0).
    pub fn register_audio(&self, src: &str, options: AudioOptions, callbacks: AudioCallbacks) {
        let shared = self.shared.clone();
        self.shared.command(|inner, fx| {
            inner.register_audio(&shared, src, options, callbacks, fx);
        });
    }

    /// Plays a source immediately, outside any track. Returns the live
    /// handle, or `None` when the source failed to open.
    pub fn play_audio(
        &self,
        src: &str,
        options: AudioOptions,
        callbacks: AudioCallbacks,
    ) -> Option<Arc<dyn AudioHandle>> {
        let shared = self.shared.clone();
        self.shared
            .command(|inner, fx| inner.play_audio(&shared, src, options, callbacks, fx))
    }

    /// Queues registrations pending consent. Returns the ids of the requests
    /// actually created.
    pub fn register_play_requests(&self, requests: Vec<PlayRequestArgs>) -> Vec<String> {
        self.shared
            .command(|inner, fx| inner.register_play_requests(requests, fx))
    }

    pub fn approve_play_request(&self, id: &str) {
        let shared = self.shared.clone();
        self.shared
            .command(|inner, fx| inner.approve_play_request(&shared, id, fx));
    }

    pub fn dismiss_play_request(&self, id: &str) {
        self.shared
            .command(|inner, fx| inner.dismiss_play_request(id, fx));
    }

    pub fn update_track(&self, index: usize, patch: TrackPatch) {
        let shared = self.shared.clone();
        self.shared
            .command(|inner, fx| inner.update_track(&shared, index, &patch, fx));
    }

    pub fn update_all_tracks(&self, patch: TrackPatch) {
        let shared = self.shared.clone();
        self.shared
            .command(|inner, fx| inner.update_all_tracks(&shared, &patch, fx));
    }

    pub fn toggle_play_track(&self, index: usize, force: Option<bool>) {
        self.shared
            .command(|inner, fx| inner.toggle_play(index, force, fx));
    }

    pub fn resume_track(&self, index: usize) {
        self.shared.command(|inner, fx| inner.resume(index, fx));
    }

    pub fn skip_audio(&self, index: usize, target: SkipTarget) {
        self.shared
            .command(|inner, fx| inner.skip_audio(index, &target, fx));
    }

    pub fn purge_track(&self, index: usize) {
        self.shared
            .command(|inner, fx| inner.purge_track(index, fx));
    }

    pub fn purge_all_tracks(&self) {
        self.shared.command(|inner, fx| inner.purge_all_tracks(fx));
    }

    pub fn set_master_volume(&self, volume: f32) {
        self.shared
            .command(|inner, fx| inner.set_master_volume(volume, fx));
    }

    pub fn toggle_global_mute(&self, force: Option<bool>) {
        self.shared
            .command(|inner, fx| inner.toggle_global_mute(force, fx));
    }

    pub fn set_conference_muted(&self, muted: bool) {
        self.shared
            .command(|inner, fx| inner.set_conference_muted(muted, fx));
    }

    pub fn initialize_conference_refs(&self, participants: &[(String, Option<ParticipantMix>)]) {
        self.shared
            .command(|inner, fx| inner.initialize_conference_refs(participants, fx));
    }

    pub fn update_conference_refs(&self, participant: &str, patch: ParticipantPatch) {
        self.shared
            .command(|inner, fx| inner.update_conference_refs(participant, &patch, fx));
    }

    /// Applies a configuration patch in place. Queues are untouched; the
    /// track set can only grow.
    pub fn set_configuration(&self, patch: SettingsPatch) {
        self.shared
            .command(|inner, fx| inner.set_configuration(&patch, fx));
    }

    /// Ends everything and re-seeds the tracks from (possibly new) defaults.
    pub fn initialize(&self, patch: SettingsPatch) {
        self.shared.command(|inner, fx| inner.initialize(&patch, fx));
    }

    pub fn get_state(&self) -> AudiotrackManagerState {
        self.shared.inner.lock().unwrap().snapshot()
    }

    pub fn get_track_state(&self, index: usize) -> Option<TrackState> {
        let inner = self.shared.inner.lock().unwrap();
        inner.tracks.get(index).map(|t| t.state.clone())
    }

    pub fn get_track_stream(&self, index: usize) -> Option<TrackStream> {
        let inner = self.shared.inner.lock().unwrap();
        inner.tracks.get(index).map(|t| t.stream.clone())
    }

    /// A per-track control surface, or `None` for an out-of-range index.
    pub fn track(&self, index: usize) -> Option<TrackHandle> {
        let inner = self.shared.inner.lock().unwrap();
        (index < inner.tracks.len()).then(|| TrackHandle::new(self.shared.clone(), index))
    }

    /// Observes the full manager snapshot.
    pub fn on_state_change(
        &self,
        listener: impl Fn(&AudiotrackManagerState) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.shared.inner.lock().unwrap();
        let id = inner.alloc_listener_id();
        inner.state_listeners.add(id, Arc::new(listener));
        Subscription::new(
            Arc::downgrade(&self.shared),
            ListenerKind::ManagerState,
            id,
        )
    }

    /// Stops and drops everything. The instance stays usable as an empty
    /// engine afterwards.
    pub fn shutdown(&self) {
        self.shared.command(|inner, fx| inner.shutdown(fx));
    }
}
