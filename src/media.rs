use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

/// One downloadable variant of a piece of media, as reported by a metadata
/// provider. Request-scoped: built fresh from the provider response and
/// discarded once the response is written.
#[derive(Debug, Clone)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    /// Provider-specific label, e.g. "FHD", "SD", "128K", "480p", "320kbps".
    pub raw_quality: String,
    /// Resolution or bitrate string when the provider reports one,
    /// e.g. "1920x1080", "480p", "128kbps". Disambiguates SD-class buckets.
    pub resolution: Option<String>,
    pub file_size: Option<String>,
    pub duration_seconds: Option<f64>,
    pub extension: Option<String>,
    /// Opaque reference used to obtain the final download link. Depending on
    /// the provider this is polled (ytdown) or already the final URL.
    pub processing_handle: String,
}

/// Provider-normalized metadata for one video.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub title: String,
    pub thumbnail: Option<String>,
    pub channel: Option<String>,
    pub description: Option<String>,
    pub descriptors: Vec<MediaDescriptor>,
}

impl MediaDescriptor {
    /// Human display duration, e.g. "3:20" for 200 seconds.
    pub fn duration_display(&self) -> Option<String> {
        self.duration_seconds.map(|secs| {
            let total = secs.round() as u64;
            let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
            if h > 0 {
                format!("{h}:{m:02}:{s:02}")
            } else {
                format!("{m}:{s:02}")
            }
        })
    }
}

/// Parses provider duration values: plain seconds ("213", 213.0) or clock
/// strings ("3:33", "1:02:45").
pub fn parse_duration_seconds(value: &serde_json::Value) -> Option<f64> {
    if let Some(n) = value.as_f64() {
        return Some(n);
    }
    parse_duration_str(value.as_str()?)
}

pub fn parse_duration_str(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(n) = text.parse::<f64>() {
        return Some(n);
    }
    let mut total = 0.0;
    for part in text.split(':') {
        total = total * 60.0 + part.trim().parse::<f64>().ok()?;
    }
    Some(total)
}
