use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::media::{MediaDescriptor, MediaKind};

/// Fixed resolution ladder used for tier comparisons. Keys absent from the
/// ladder sort last.
pub const QUALITY_LADDER: [&str; 6] = ["144p", "240p", "360p", "480p", "720p", "1080p"];

/// Stable, provider-independent quality identifier plus its display label.
/// Produced only by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalQuality {
    pub key: String,
    pub label: String,
}

static FIRST_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").expect("valid regex"));
static TIER_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)p$").expect("valid regex"));

/// Maps a provider-specific quality descriptor to its canonical key and
/// display label. Pure and total: unparseable input degrades to a fallback
/// bucket instead of erroring. Rules apply in order, first match wins.
pub fn normalize(descriptor: &MediaDescriptor) -> CanonicalQuality {
    let raw = descriptor.raw_quality.trim();
    match descriptor.kind {
        MediaKind::Video => normalize_video(raw, descriptor.resolution.as_deref()),
        MediaKind::Audio => normalize_audio(raw),
    }
}

fn normalize_video(raw: &str, resolution: Option<&str>) -> CanonicalQuality {
    if raw.eq_ignore_ascii_case("FHD") {
        return tier_quality("1080p");
    }
    if raw.eq_ignore_ascii_case("HD") {
        return tier_quality("720p");
    }
    if raw.eq_ignore_ascii_case("SD") {
        if let Some(res) = resolution {
            for tier in ["480", "360", "240", "144"] {
                if res.contains(tier) {
                    return tier_quality(&format!("{tier}p"));
                }
            }
        }
        // Generic bucket: the provider gave no resolution we can map.
        warn!(resolution, "SD descriptor without a mappable resolution");
        return CanonicalQuality {
            key: "sd".to_string(),
            label: "SD".to_string(),
        };
    }
    let key = raw.trim().to_lowercase();
    if TIER_KEY.is_match(&key) {
        return tier_quality(&key);
    }
    if key.is_empty() {
        return CanonicalQuality {
            key: "unknown".to_string(),
            label: "Unknown".to_string(),
        };
    }
    CanonicalQuality {
        label: raw.to_string(),
        key,
    }
}

fn normalize_audio(raw: &str) -> CanonicalQuality {
    if raw.contains("48") {
        return audio_quality(48);
    }
    if raw.contains("128") {
        return audio_quality(128);
    }
    if let Some(found) = FIRST_INT.find(raw) {
        if let Ok(n) = found.as_str().parse::<u32>() {
            return audio_quality(n);
        }
    }
    CanonicalQuality {
        key: "audio_unknown".to_string(),
        label: "Audio".to_string(),
    }
}

fn tier_quality(key: &str) -> CanonicalQuality {
    let class = match tier_height(key) {
        Some(n) if n >= 1080 => "FHD",
        Some(n) if n >= 720 => "HD",
        _ => "SD",
    };
    CanonicalQuality {
        key: key.to_string(),
        label: format!("{key} ({class})"),
    }
}

fn audio_quality(bitrate: u32) -> CanonicalQuality {
    CanonicalQuality {
        key: format!("audio{bitrate}"),
        label: format!("{bitrate}k Audio"),
    }
}

/// Numeric height for a `{n}p` key, `None` for anything else.
pub fn tier_height(key: &str) -> Option<u32> {
    TIER_KEY
        .captures(key)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Position in [`QUALITY_LADDER`]; absent keys sort last.
pub fn ladder_index(key: &str) -> usize {
    QUALITY_LADDER
        .iter()
        .position(|tier| *tier == key)
        .unwrap_or(QUALITY_LADDER.len())
}
