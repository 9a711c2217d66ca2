//! Timed, optionally localized captions.
//!
//! A subtitle table maps a lookup key (usually the audio file name) to a list
//! of timed cues. The resolver picks the cue covering the current playback
//! position and flattens its localized fields for display.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PlaybackError, Result};

/// Caption text that is either a plain string or keyed by locale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    ByLocale(HashMap<String, String>),
}

impl LocalizedText {
    /// Flatten to a single string for `locale`, falling back to `fallback`.
    pub fn resolve(&self, locale: Option<&str>, fallback: &str) -> Option<String> {
        match self {
            LocalizedText::Plain(text) => Some(text.clone()),
            LocalizedText::ByLocale(by_locale) => locale
                .and_then(|l| by_locale.get(l))
                .or_else(|| by_locale.get(fallback))
                .cloned(),
        }
    }
}

/// One timed cue. `from`/`to` are seconds; the cue covers the half-open
/// interval `[from, to)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtitle {
    pub from: f64,
    pub to: f64,
    pub text: LocalizedText,
    #[serde(default)]
    pub description: Option<LocalizedText>,
    #[serde(default)]
    pub narrator: Option<String>,
}

/// Subtitle lists keyed by lookup key (typically the source file name).
pub type SubtitleTable = HashMap<String, Vec<Subtitle>>;

/// The caption currently on display, as carried by `TrackStream`.
#[derive(Debug, Clone, Serialize)]
pub struct CaptionState {
    pub text: String,
    pub description: Option<String>,
    pub narrator: Option<String>,
}

/// Resolve the active caption for `position`, or `None` when no cue covers
/// it (or the covering cue has no text for the locale chain).
pub fn resolve_caption(
    subtitles: &[Subtitle],
    position: Duration,
    locale: Option<&str>,
    fallback: &str,
) -> Option<CaptionState> {
    let secs = position.as_secs_f64();
    let cue = subtitles
        .iter()
        .find(|s| s.from <= secs && secs < s.to)?;
    let text = cue.text.resolve(locale, fallback)?;
    Some(CaptionState {
        text,
        description: cue
            .description
            .as_ref()
            .and_then(|d| d.resolve(locale, fallback)),
        narrator: cue.narrator.clone(),
    })
}

/// Load a subtitle table from a JSON file.
///
/// Format: `{ "<key>": [ { "from": 0.0, "to": 2.5, "text": ... }, ... ] }`
/// where `text` (and optional `description`) are either plain strings or
/// locale-keyed objects.
pub fn load_subtitle_table(path: &Path) -> Result<SubtitleTable> {
    let raw = std::fs::read_to_string(path)?;
    parse_subtitle_table(&raw)
}

/// Parse a subtitle table from a JSON string.
pub fn parse_subtitle_table(json: &str) -> Result<SubtitleTable> {
    serde_json::from_str(json).map_err(|e| PlaybackError::Subtitles(e.to_string()))
}
