//! Small shared helpers.

/// Derive a display name from a source locator: the last path segment,
/// truncated at the first dot (`"sfx/door.open.mp3"` -> `"door"`).
pub(crate) fn display_name(src: &str) -> String {
    let segment = src.rsplit('/').next().unwrap_or(src);
    let stem = segment.split('.').next().unwrap_or(segment);
    stem.to_string()
}

/// Clamp a volume-like value into `[0.0, 1.0]`. NaN maps to 0.
pub(crate) fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}
