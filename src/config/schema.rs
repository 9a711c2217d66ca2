use std::path::PathBuf;

use serde::Deserialize;

use crate::captions::SubtitleTable;
use crate::options::DefaultAudioOptions;

/// Top-level engine settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/audiotracks/config.toml` or
/// `~/.config/audiotracks/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `AUDIOTRACKS__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Emit verbose engine chatter through `tracing::debug!`.
    pub debug: bool,
    /// Number of playback lanes built at startup.
    pub track_length: usize,
    /// Global volume coefficient layered on top of per-track volume.
    pub master_volume: f32,
    /// Locale used when a requested one is unsupported or a cue has no text
    /// for it.
    pub fallback_locale: String,
    /// Locales callers may select.
    pub supported_locales: Vec<String>,
    /// Optional JSON file mapping subtitle keys to cue lists.
    pub subtitles_path: Option<PathBuf>,
    /// Baseline registration options for tracks and items that do not
    /// specify their own.
    pub default_audio: DefaultAudioOptions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            track_length: 1,
            master_volume: 0.5,
            fallback_locale: "en".to_string(),
            supported_locales: vec!["en".to_string()],
            subtitles_path: None,
            default_audio: DefaultAudioOptions::default(),
        }
    }
}

impl Settings {
    /// Perform basic validation checks on loaded settings.
    pub fn validate(&self) -> Result<(), String> {
        if self.track_length == 0 {
            return Err("track_length must be >= 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err("master_volume must be within 0.0..=1.0".to_string());
        }
        if self.supported_locales.is_empty() {
            return Err("supported_locales must not be empty".to_string());
        }
        if !self.supported_locales.contains(&self.fallback_locale) {
            return Err("fallback_locale must be listed in supported_locales".to_string());
        }
        Ok(())
    }
}

/// Partial settings update for a running engine. Unset fields keep their
/// current values; `subtitles` replaces the in-memory cue table outright.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub debug: Option<bool>,
    pub track_length: Option<usize>,
    pub master_volume: Option<f32>,
    pub fallback_locale: Option<String>,
    pub supported_locales: Option<Vec<String>>,
    pub subtitles: Option<SubtitleTable>,
    pub default_audio: Option<DefaultAudioOptions>,
}
