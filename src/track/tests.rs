use std::time::Duration;

use crate::manager::effects::Effects;
use crate::options::DefaultAudioOptions;
use crate::track::item::AudioItem;
use crate::track::model::Track;
use crate::track::queue::{matches_src, resolve_insert_index, MatchMethod};
use crate::track::state::TrackPatch;

fn locales() -> Vec<String> {
    vec!["en".to_string(), "fr".to_string()]
}

fn bare_item(id: &str, src: &str) -> AudioItem {
    AudioItem::new(
        id.to_string(),
        src,
        "clip".to_string(),
        None,
        Vec::new(),
        None,
        Default::default(),
        None,
    )
}

#[test]
fn insert_index_defaults_to_append() {
    assert_eq!(resolve_insert_index(0, false, None), 0);
    assert_eq!(resolve_insert_index(3, false, None), 3);
    assert_eq!(resolve_insert_index(3, true, None), 3);
}

#[test]
fn insert_index_clamps_out_of_range() {
    assert_eq!(resolve_insert_index(2, false, Some(9)), 2);
    assert_eq!(resolve_insert_index(2, false, Some(1)), 1);
    assert_eq!(resolve_insert_index(2, false, Some(0)), 0);
}

#[test]
fn insert_index_never_displaces_a_started_head() {
    assert_eq!(resolve_insert_index(2, true, Some(0)), 1);
    assert_eq!(resolve_insert_index(1, true, Some(0)), 1);
    // An idle head can be displaced.
    assert_eq!(resolve_insert_index(2, false, Some(0)), 0);
}

#[test]
fn src_matching_methods() {
    assert!(matches_src("a/b/clip.mp3", "a/b/clip.mp3", MatchMethod::Exact));
    assert!(!matches_src("a/b/clip.mp3", "clip", MatchMethod::Exact));
    assert!(matches_src("a/b/clip.mp3", "clip", MatchMethod::Substring));
    assert!(!matches_src("a/b/clip.mp3", "zzz", MatchMethod::Substring));
}

#[test]
fn new_track_takes_defaults() {
    let defaults = DefaultAudioOptions {
        volume: Some(2.5),
        looping: Some(true),
        locale: Some("de".to_string()),
        ..Default::default()
    };
    let track = Track::new(2, &defaults, &locales(), "en");
    assert_eq!(track.state.name, "Track #3");
    assert_eq!(track.state.volume, 1.0);
    assert!(track.state.looping);
    assert!(!track.state.auto_play);
    // Unsupported locale falls back.
    assert_eq!(track.state.locale.as_deref(), Some("en"));
    assert!(track.items.is_empty());
}

#[test]
fn refresh_on_empty_track_clears_stream() {
    let mut track = Track::new(0, &DefaultAudioOptions::default(), &locales(), "en");
    track.refresh("en");
    assert!(!track.state.is_playing);
    assert!(track.stream.audio_item_state.is_none());
    assert!(track.stream.caption.is_none());
}

#[test]
fn item_audibility_follows_flags() {
    let mut item = bare_item("id-1", "clip.mp3");
    assert!(!item.is_audible());
    item.started = true;
    assert!(item.is_audible());
    item.paused = true;
    assert!(!item.is_audible());
    item.paused = false;
    item.ended = true;
    assert!(!item.is_audible());
}

#[test]
fn refresh_snapshots_queue_order() {
    let mut track = Track::new(0, &DefaultAudioOptions::default(), &locales(), "en");
    track.items.push(bare_item("id-1", "one.mp3"));
    track.items.push(bare_item("id-2", "two.mp3"));
    track.items[0].started = true;
    track.refresh("en");
    assert!(track.state.is_playing);
    assert_eq!(track.state.queue.len(), 2);
    assert_eq!(track.state.queue[0].src, "one.mp3");
    assert_eq!(track.state.queue[1].src, "two.mp3");
    let head = track.stream.audio_item_state.as_ref().unwrap();
    assert_eq!(head.id, "id-1");
}

#[test]
fn patch_updates_state_and_invalidates_pollers() {
    let mut track = Track::new(0, &DefaultAudioOptions::default(), &locales(), "en");
    track.items.push(bare_item("id-1", "one.mp3"));
    let before = track.items[0].poller_gen;

    let mut fx = Effects::new();
    let patch = TrackPatch {
        volume: Some(7.0),
        muted: Some(true),
        update_frequency: Some(Some(Duration::from_millis(100))),
        ..Default::default()
    };
    track.apply_patch(&patch, 1.0, false, &mut fx);
    fx.run();

    assert_eq!(track.state.volume, 1.0);
    assert!(track.state.muted);
    assert_eq!(
        track.state.update_frequency,
        Some(Duration::from_millis(100))
    );
    assert_eq!(
        track.items[0].update_frequency,
        Some(Duration::from_millis(100))
    );
    assert_eq!(track.items[0].poller_gen, before + 1);
}

#[test]
fn reconstruct_touches_only_provided_fields() {
    let defaults = DefaultAudioOptions::default();
    let mut track = Track::new(0, &defaults, &locales(), "en");
    track.state.volume = 0.3;
    track.state.looping = true;

    let next = DefaultAudioOptions {
        volume: Some(0.8),
        locale: Some("fr".to_string()),
        ..Default::default()
    };
    track.reconstruct(&next, &locales(), "en");

    assert_eq!(track.state.volume, 0.8);
    assert!(track.state.looping);
    assert_eq!(track.state.locale.as_deref(), Some("fr"));
}
