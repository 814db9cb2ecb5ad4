use crate::media::{MediaDescriptor, MediaKind};
use crate::quality::{CanonicalQuality, normalize, tier_height};

/// Selects the descriptor best matching a requested quality key.
///
/// Match order: exact canonical key, relaxed substring match against the raw
/// provider label and resolution string, video tier fallback (nearest
/// available tier not exceeding the request; SD-class requests never round
/// up, HD-class requests fall back to the best available video descriptor
/// when no tier computation is possible), then "any audio" for audio-shaped
/// requests. Duplicate canonical keys resolve to the first descriptor in
/// provider order; deduplication is the caller's concern.
pub fn resolve<'a>(
    requested: &str,
    descriptors: &'a [MediaDescriptor],
) -> Option<&'a MediaDescriptor> {
    let requested = requested.trim().to_lowercase();
    if requested.is_empty() {
        return None;
    }

    if let Some(found) = descriptors
        .iter()
        .find(|d| normalize(d).key == requested)
    {
        return Some(found);
    }

    if let Some(found) = descriptors.iter().find(|d| {
        d.raw_quality.to_lowercase().contains(&requested)
            || d.resolution
                .as_deref()
                .is_some_and(|res| res.to_lowercase().contains(&requested))
    }) {
        return Some(found);
    }

    if let Some(height) = tier_height(&requested) {
        return resolve_video_tier(height, descriptors);
    }

    if requested.contains("audio") || requested.ends_with("kbps") {
        return descriptors.iter().find(|d| d.kind == MediaKind::Audio);
    }

    None
}

// HD-class requests start at 720p; everything below is SD-class.
const HD_CLASS_FLOOR: u32 = 720;

fn resolve_video_tier(height: u32, descriptors: &[MediaDescriptor]) -> Option<&MediaDescriptor> {
    let tiered: Vec<(u32, &MediaDescriptor)> = descriptors
        .iter()
        .filter(|d| d.kind == MediaKind::Video)
        .filter_map(|d| tier_height(&normalize(d).key).map(|h| (h, d)))
        .collect();

    let at_or_below = tiered
        .iter()
        .filter(|(h, _)| *h <= height)
        .max_by_key(|(h, _)| *h)
        .map(|(_, d)| *d);

    if at_or_below.is_some() {
        return at_or_below;
    }

    if height >= HD_CLASS_FLOOR {
        // No tier at or below the request: take the single best available
        // video descriptor, or whatever video the provider offered first.
        return tiered
            .iter()
            .max_by_key(|(h, _)| *h)
            .map(|(_, d)| *d)
            .or_else(|| descriptors.iter().find(|d| d.kind == MediaKind::Video));
    }

    // SD-class requests never round up.
    None
}

/// Every canonical quality actually present among the descriptors, first
/// occurrence order, no duplicates. Served to the caller when `resolve`
/// finds nothing.
pub fn suggestions(descriptors: &[MediaDescriptor]) -> Vec<CanonicalQuality> {
    let mut seen: Vec<CanonicalQuality> = Vec::new();
    for descriptor in descriptors {
        let quality = normalize(descriptor);
        if !seen.iter().any(|q| q.key == quality.key) {
            seen.push(quality);
        }
    }
    seen
}
