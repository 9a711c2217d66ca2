//! Audio registration options and their layered resolution.
//!
//! Options arrive in three layers: the explicit per-call `AudioOptions`, the
//! owning track's settings, and the manager-wide `DefaultAudioOptions`.
//! `resolve_effective` flattens them (explicit wins, then track, then
//! default) into the concrete values an item is created with.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::captions::{Subtitle, SubtitleTable};
use crate::error::PlaybackError;
use crate::track::TrackState;
use crate::util::{clamp_unit, display_name};

/// Bare notification callback.
pub type Callback = Arc<dyn Fn() + Send + Sync>;
/// Play notification; the flag is true only for the item's first start.
pub type PlayCallback = Arc<dyn Fn(bool) + Send + Sync>;
/// Error notification carrying the terminal playback error.
pub type ErrorCallback = Arc<dyn Fn(&PlaybackError) + Send + Sync>;

/// Lifecycle callbacks attached to one registration.
///
/// All callbacks are invoked outside the engine lock, so they may freely
/// call back into the manager.
#[derive(Clone, Default)]
pub struct AudioCallbacks {
    /// First start and every resume (`first_run` distinguishes them).
    pub on_play: Option<PlayCallback>,
    /// Periodic progress, native or timer-driven.
    pub on_update: Option<Callback>,
    pub on_pause: Option<Callback>,
    /// Fires exactly once, on natural end, forced end, or error.
    pub on_end: Option<Callback>,
    /// Fires after `on_end`, but never on the error path.
    pub on_resolve: Option<Callback>,
    /// Fires before `on_end` when playback fails terminally.
    pub on_error: Option<ErrorCallback>,
}

/// Per-call registration options. Every field is optional; unset fields
/// inherit from the track and then the manager defaults.
#[derive(Clone, Default)]
pub struct AudioOptions {
    /// Target track for manager-level registration (explicit -> configured
    /// default -> 0). Ignored when registering through a `TrackHandle`.
    pub track_idx: Option<usize>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub looping: Option<bool>,
    pub playback_rate: Option<f32>,
    /// Caption locale; validated against the supported set.
    pub locale: Option<String>,
    /// Subtitle table lookup key; defaults to the derived file name.
    pub key_for_subtitles: Option<String>,
    /// Inline cue list; takes precedence over the table lookup.
    pub subtitles: Option<Vec<Subtitle>>,
    pub allow_duplicates: Option<bool>,
    /// Queue position for the new item. Clamped so a started head is never
    /// displaced; out-of-range appends; `None` appends.
    pub insert_at: Option<usize>,
    /// Force-end the currently active item once the new one is queued.
    pub skip_current: bool,
    /// Display-name override for opaque srcs (blob/object URLs).
    pub original_filename: Option<String>,
    /// Explicit progress-callback cadence; suppresses native progress.
    pub update_frequency: Option<Duration>,
}

/// Manager-wide default audio options, the lowest precedence layer.
/// Loadable from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DefaultAudioOptions {
    /// Target track for registrations that don't name one.
    pub track_idx: Option<usize>,
    pub volume: Option<f32>,
    pub muted: Option<bool>,
    pub looping: Option<bool>,
    pub auto_play: Option<bool>,
    pub playback_rate: Option<f32>,
    pub locale: Option<String>,
    pub allow_duplicates: Option<bool>,
    pub key_for_subtitles: Option<String>,
    /// Progress-callback cadence in milliseconds.
    pub update_frequency_ms: Option<u64>,
}

/// Fully resolved creation-time values for one item.
#[derive(Debug, Clone)]
pub(crate) struct EffectiveOptions {
    pub filename: String,
    /// Resolved volume before the master-volume coefficient is applied.
    pub volume: f32,
    pub muted: bool,
    pub looping: bool,
    pub playback_rate: f32,
    pub locale: Option<String>,
    pub update_frequency: Option<Duration>,
    pub subtitles: Vec<Subtitle>,
}

/// Flatten the three option layers for a registration on `track`.
pub(crate) fn resolve_effective(
    src: &str,
    explicit: &AudioOptions,
    track: &TrackState,
    defaults: &DefaultAudioOptions,
    supported_locales: &[String],
    fallback_locale: &str,
    table: &SubtitleTable,
) -> EffectiveOptions {
    let filename = display_name(explicit.original_filename.as_deref().unwrap_or(src));

    let locale = explicit
        .locale
        .clone()
        .or_else(|| track.locale.clone())
        .or_else(|| defaults.locale.clone())
        .map(|candidate| {
            if supported_locales.iter().any(|l| l == &candidate) {
                candidate
            } else {
                fallback_locale.to_string()
            }
        });

    let subtitles = match &explicit.subtitles {
        Some(inline) => inline.clone(),
        None => {
            let key = explicit
                .key_for_subtitles
                .clone()
                .or_else(|| defaults.key_for_subtitles.clone())
                .unwrap_or_else(|| filename.clone());
            table.get(&key).cloned().unwrap_or_default()
        }
    };

    EffectiveOptions {
        filename,
        volume: clamp_unit(explicit.volume.unwrap_or(track.volume)),
        muted: explicit.muted.unwrap_or(track.muted),
        looping: explicit.looping.unwrap_or(track.looping),
        playback_rate: explicit.playback_rate.unwrap_or(track.playback_rate),
        locale,
        update_frequency: explicit
            .update_frequency
            .or(track.update_frequency)
            .or(defaults.update_frequency_ms.map(Duration::from_millis)),
        subtitles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captions::LocalizedText;
    use std::collections::HashMap;

    fn track() -> TrackState {
        TrackState {
            id: "t".to_string(),
            name: "Track #0".to_string(),
            volume: 0.8,
            muted: false,
            looping: false,
            auto_play: true,
            allow_duplicates: false,
            playback_rate: 1.0,
            locale: Some("fr".to_string()),
            update_frequency: None,
            queue: Vec::new(),
            is_playing: false,
        }
    }

    fn cue(text: &str) -> Subtitle {
        Subtitle {
            from: 0.0,
            to: 1.0,
            text: LocalizedText::Plain(text.to_string()),
            description: None,
            narrator: None,
        }
    }

    #[test]
    fn explicit_beats_track_beats_default() {
        let explicit = AudioOptions {
            volume: Some(0.3),
            ..AudioOptions::default()
        };
        let defaults = DefaultAudioOptions {
            volume: Some(0.1),
            playback_rate: Some(2.0),
            ..DefaultAudioOptions::default()
        };
        let supported = vec!["en".to_string(), "fr".to_string()];
        let eff = resolve_effective(
            "a.mp3",
            &explicit,
            &track(),
            &defaults,
            &supported,
            "en",
            &SubtitleTable::new(),
        );
        assert_eq!(eff.volume, 0.3);
        // Track settings are concrete, so the default layer never reaches
        // volume/rate; the track's 1.0 wins over the default 2.0.
        assert_eq!(eff.playback_rate, 1.0);
        assert_eq!(eff.locale.as_deref(), Some("fr"));
    }

    #[test]
    fn unsupported_locale_falls_back() {
        let explicit = AudioOptions {
            locale: Some("zz".to_string()),
            ..AudioOptions::default()
        };
        let supported = vec!["en".to_string()];
        let eff = resolve_effective(
            "a.mp3",
            &explicit,
            &track(),
            &DefaultAudioOptions::default(),
            &supported,
            "en",
            &SubtitleTable::new(),
        );
        assert_eq!(eff.locale.as_deref(), Some("en"));
    }

    #[test]
    fn volume_is_clamped() {
        let explicit = AudioOptions {
            volume: Some(3.0),
            ..AudioOptions::default()
        };
        let eff = resolve_effective(
            "a.mp3",
            &explicit,
            &track(),
            &DefaultAudioOptions::default(),
            &["en".to_string()],
            "en",
            &SubtitleTable::new(),
        );
        assert_eq!(eff.volume, 1.0);
    }

    #[test]
    fn subtitles_default_to_filename_key() {
        let table: SubtitleTable =
            HashMap::from([("alarm".to_string(), vec![cue("ring")])]);
        let eff = resolve_effective(
            "sfx/alarm.mp3",
            &AudioOptions::default(),
            &track(),
            &DefaultAudioOptions::default(),
            &["en".to_string()],
            "en",
            &table,
        );
        assert_eq!(eff.filename, "alarm");
        assert_eq!(eff.subtitles.len(), 1);
    }

    #[test]
    fn inline_subtitles_beat_table_lookup() {
        let table: SubtitleTable =
            HashMap::from([("alarm".to_string(), vec![cue("table")])]);
        let explicit = AudioOptions {
            subtitles: Some(vec![cue("inline"), cue("inline2")]),
            ..AudioOptions::default()
        };
        let eff = resolve_effective(
            "alarm.mp3",
            &explicit,
            &track(),
            &DefaultAudioOptions::default(),
            &["en".to_string()],
            "en",
            &table,
        );
        assert_eq!(eff.subtitles.len(), 2);
    }

    #[test]
    fn original_filename_overrides_key_derivation() {
        let table: SubtitleTable =
            HashMap::from([("speech".to_string(), vec![cue("hi")])]);
        let explicit = AudioOptions {
            original_filename: Some("speech.wav".to_string()),
            ..AudioOptions::default()
        };
        let eff = resolve_effective(
            "blob:abcd-1234",
            &explicit,
            &track(),
            &DefaultAudioOptions::default(),
            &["en".to_string()],
            "en",
            &table,
        );
        assert_eq!(eff.filename, "speech");
        assert_eq!(eff.subtitles.len(), 1);
    }

    #[test]
    fn update_frequency_inherits_from_defaults() {
        let defaults = DefaultAudioOptions {
            update_frequency_ms: Some(100),
            ..DefaultAudioOptions::default()
        };
        let eff = resolve_effective(
            "a.mp3",
            &AudioOptions::default(),
            &track(),
            &defaults,
            &["en".to_string()],
            "en",
            &SubtitleTable::new(),
        );
        assert_eq!(eff.update_frequency, Some(Duration::from_millis(100)));
    }
}
