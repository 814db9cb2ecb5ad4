use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiError;
use crate::extract::extract_video_id;
use crate::media::{MediaDescriptor, MediaKind, VideoMetadata};
use crate::poll::{PollPolicy, ProcessingResult, poll, poll_all};
use crate::providers::MetadataProvider;
use crate::quality::normalize;
use crate::resolve::{resolve, suggestions};

const DESCRIPTION_PREVIEW_CHARS: usize = 200;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn MetadataProvider>,
    pub poll_policy: PollPolicy,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/formats", get(formats))
        .route("/api/download", get(download))
        .route("/api/info", get(info_endpoint))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    url: Option<String>,
    quality: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FormatEntry {
    id: String,
    #[serde(rename = "type")]
    kind: MediaKind,
    label: String,
    original_quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    extension: Option<String>,
    download_url: String,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn index() -> Json<Value> {
    Json(json!({
        "message": "Video download link resolver",
        "endpoints": {
            "formats": "/api/formats?url=VIDEO_URL",
            "download": "/api/download?url=VIDEO_URL&quality=QUALITY",
            "info": "/api/info?url=VIDEO_URL",
            "health": "/health",
        },
        "qualities": "1080p, 720p, 480p, 360p, 240p, 144p, audio48, audio128, all",
    }))
}

async fn formats(
    State(state): State<AppState>,
    Query(params): Query<MediaQuery>,
) -> Result<Json<Value>, ApiError> {
    let (url, video_id) = require_video(&params)?;
    let metadata = state.provider.fetch(&url).await?;

    Ok(Json(json!({
        "success": true,
        "videoId": video_id,
        "title": metadata.title,
        "thumbnail": metadata.thumbnail,
        "formats": format_entries(&url, &metadata.descriptors),
    })))
}

async fn info_endpoint(
    State(state): State<AppState>,
    Query(params): Query<MediaQuery>,
) -> Result<Json<Value>, ApiError> {
    let (url, video_id) = require_video(&params)?;
    let metadata = state.provider.fetch(&url).await?;

    Ok(Json(json!({
        "success": true,
        "videoId": video_id,
        "title": metadata.title,
        "thumbnail": metadata.thumbnail,
        "channel": metadata.channel,
        "duration": first_duration(&metadata),
        "description": metadata.description.as_deref().map(truncate_description),
        "qualities": suggestions(&metadata.descriptors),
    })))
}

async fn download(
    State(state): State<AppState>,
    Query(params): Query<MediaQuery>,
) -> Result<Json<Value>, ApiError> {
    let (url, video_id) = require_video(&params)?;
    let requested = params
        .quality
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());

    let metadata = state.provider.fetch(&url).await?;

    match requested {
        None => Ok(Json(available_qualities_response(
            &url, &video_id, &metadata,
        ))),
        Some("all") => Ok(Json(
            download_all(&state, &url, &video_id, &metadata).await,
        )),
        Some(requested) => download_one(&state, &url, &video_id, &metadata, requested).await,
    }
}

async fn download_one(
    state: &AppState,
    url: &str,
    video_id: &str,
    metadata: &VideoMetadata,
    requested: &str,
) -> Result<Json<Value>, ApiError> {
    let Some(descriptor) = resolve(requested, &metadata.descriptors) else {
        return Err(ApiError::quality_not_found(
            requested,
            suggestions(&metadata.descriptors),
        ));
    };
    let quality = normalize(descriptor);
    info!(video_id, quality = %quality.key, "resolving download link");

    match poll(
        state.provider.as_ref(),
        &descriptor.processing_handle,
        &state.poll_policy,
    )
    .await
    {
        ProcessingResult::Ready(file) => Ok(Json(json!({
            "success": true,
            "videoId": video_id,
            "title": metadata.title,
            "thumbnail": metadata.thumbnail,
            "quality": quality.label,
            "originalQuality": descriptor.raw_quality,
            "resolution": descriptor.resolution,
            "type": descriptor.kind,
            "size": descriptor.file_size,
            "duration": descriptor.duration_display(),
            "extension": descriptor.extension,
            "downloadUrl": file.file_url,
            "fileName": file.file_name,
            "fileSize": file.file_size,
            "expires": "Link expires after some time. Download quickly.",
            "otherFormats": self_link(url, None),
        }))),
        ProcessingResult::Failed { attempts, error } => {
            Err(ApiError::processing_failed(attempts, &error))
        }
        ProcessingResult::TimedOut { attempts } => Err(ApiError::processing_timeout(attempts)),
    }
}

async fn download_all(
    state: &AppState,
    url: &str,
    video_id: &str,
    metadata: &VideoMetadata,
) -> Value {
    // One poll sequence per distinct canonical quality, batch-limited.
    let mut targets: Vec<(String, String)> = Vec::new();
    for descriptor in &metadata.descriptors {
        let key = normalize(descriptor).key;
        if !targets.iter().any(|(k, _)| *k == key) {
            targets.push((key, descriptor.processing_handle.clone()));
        }
    }
    info!(video_id, count = targets.len(), "fan-out polling all qualities");

    let outcomes = poll_all(state.provider.as_ref(), &targets, &state.poll_policy).await;
    let results: Vec<Value> = outcomes
        .into_iter()
        .map(|(key, outcome)| match outcome {
            ProcessingResult::Ready(file) => json!({
                "quality": key,
                "status": "ready",
                "downloadUrl": file.file_url,
                "fileName": file.file_name,
                "fileSize": file.file_size,
            }),
            ProcessingResult::Failed { attempts, error } => json!({
                "quality": key,
                "status": "failed",
                "attempts": attempts,
                "error": error,
            }),
            ProcessingResult::TimedOut { attempts } => json!({
                "quality": key,
                "status": "timed_out",
                "attempts": attempts,
            }),
        })
        .collect();

    json!({
        "success": true,
        "videoId": video_id,
        "title": metadata.title,
        "results": results,
    })
}

fn available_qualities_response(url: &str, video_id: &str, metadata: &VideoMetadata) -> Value {
    let formats = format_entries(url, &metadata.descriptors);
    json!({
        "success": true,
        "videoId": video_id,
        "title": metadata.title,
        "thumbnail": metadata.thumbnail,
        "duration": first_duration(metadata),
        "channel": metadata.channel,
        "formats": formats,
        "usage": {
            "formats": self_link(url, None),
            "download": format!("{}&quality=QUALITY", self_link(url, None)),
            "everything": self_link(url, Some("all")),
        },
    })
}

fn require_video(params: &MediaQuery) -> Result<(String, String), ApiError> {
    let url = params
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(ApiError::missing_url)?;
    let video_id = extract_video_id(url).ok_or_else(|| ApiError::invalid_url(url))?;
    Ok((url.to_string(), video_id))
}

/// Formats listing with canonical ids and per-format re-query links,
/// deduplicated by canonical key (first provider offer wins).
fn format_entries(url: &str, descriptors: &[MediaDescriptor]) -> Vec<FormatEntry> {
    let mut entries: Vec<FormatEntry> = Vec::new();
    for descriptor in descriptors {
        let quality = normalize(descriptor);
        if entries.iter().any(|entry| entry.id == quality.key) {
            continue;
        }
        let label = match &descriptor.resolution {
            Some(res) => format!("{} ({res})", quality.label),
            None => quality.label.clone(),
        };
        entries.push(FormatEntry {
            download_url: self_link(url, Some(&quality.key)),
            id: quality.key,
            kind: descriptor.kind,
            label,
            original_quality: descriptor.raw_quality.clone(),
            resolution: descriptor.resolution.clone(),
            size: descriptor.file_size.clone(),
            duration: descriptor.duration_display(),
            extension: descriptor.extension.clone(),
        });
    }
    entries
}

fn self_link(url: &str, quality: Option<&str>) -> String {
    match quality {
        Some(q) => format!(
            "/api/download?url={}&quality={}",
            urlencoding::encode(url),
            urlencoding::encode(q)
        ),
        None => format!("/api/download?url={}", urlencoding::encode(url)),
    }
}

fn first_duration(metadata: &VideoMetadata) -> Option<String> {
    metadata
        .descriptors
        .iter()
        .find_map(MediaDescriptor::duration_display)
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_PREVIEW_CHARS {
        return text.to_string();
    }
    let preview: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    format!("{}...", preview.trim_end())
}
