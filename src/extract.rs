use std::sync::LazyLock;

use regex::Regex;

// Ordered: the first matching pattern wins. The captured identifier runs up
// to `&`, newline, `?`, `#` or end of input.
static ID_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"youtube\.com/watch\?v=([^&\n?#]+)",
        r"youtu\.be/([^&\n?#]+)",
        r"youtube\.com/embed/([^&\n?#]+)",
        r"youtube\.com/shorts/([^&\n?#]+)",
        r"youtube\.com/v/([^&\n?#]+)",
        r"youtube\.com/live/([^&\n?#]+)",
        r"^([A-Za-z0-9_-]{11})$",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid id pattern"))
    .collect()
});

/// Pulls the canonical video identifier out of an arbitrary input URL, or a
/// bare 11-character identifier. Returns `None` when nothing matches; the
/// caller treats that as a client error.
pub fn extract_video_id(raw: &str) -> Option<String> {
    let input = raw.trim();
    if input.is_empty() {
        return None;
    }
    ID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(input)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}
