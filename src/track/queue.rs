//! Pure queue-placement and source-matching helpers.

/// How a string skip target is compared against item sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMethod {
    /// Exact source equality.
    #[default]
    Exact,
    /// Substring containment.
    Substring,
}

/// What `skip_audio` should end.
#[derive(Debug, Clone)]
pub enum SkipTarget {
    /// The item at this queue index.
    Index(usize),
    /// The first item whose source matches `pattern`.
    Source {
        pattern: String,
        method: MatchMethod,
    },
}

impl Default for SkipTarget {
    /// The active item.
    fn default() -> Self {
        SkipTarget::Index(0)
    }
}

pub(crate) fn matches_src(src: &str, pattern: &str, method: MatchMethod) -> bool {
    match method {
        MatchMethod::Exact => src == pattern,
        MatchMethod::Substring => src.contains(pattern),
    }
}

/// Clamp a requested insertion point.
///
/// A started head is never displaced: while it runs, the earliest legal slot
/// is 1. Out-of-range requests (and `None`) append.
pub(crate) fn resolve_insert_index(
    queue_len: usize,
    head_started: bool,
    insert_at: Option<usize>,
) -> usize {
    let idx = insert_at.unwrap_or(queue_len).min(queue_len);
    if head_started { idx.max(1).min(queue_len) } else { idx }
}
