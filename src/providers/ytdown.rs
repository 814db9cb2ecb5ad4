use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::media::{MediaDescriptor, MediaKind, VideoMetadata, parse_duration_seconds};
use crate::poll::{PollCheck, ReadyFile};
use crate::providers::{MetadataProvider, ProviderConfig, ProviderError, json_string};

const DEFAULT_BASE_URL: &str = "https://ytdown.to";

/// ytdown.to adapter. Metadata comes from a form-encoded POST to the site's
/// own XHR proxy; the returned `mediaUrl` handles point at an asynchronous
/// transcoding endpoint that must be polled until `percent` reaches
/// "Completed".
pub struct YtDownProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    api: Option<ApiPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPayload {
    title: Option<String>,
    image_preview_url: Option<String>,
    description: Option<String>,
    user_info: Option<UserInfo>,
    #[serde(default)]
    media_items: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItem {
    #[serde(rename = "type")]
    kind: String,
    media_quality: String,
    media_res: Option<String>,
    media_file_size: Option<Value>,
    media_duration: Option<Value>,
    media_extension: Option<String>,
    media_url: String,
}

impl YtDownProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_config(
            client,
            ProviderConfig::new(DEFAULT_BASE_URL)
                .origin(DEFAULT_BASE_URL)
                .referer(format!("{DEFAULT_BASE_URL}/en2/")),
        )
    }

    pub fn with_config(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn descriptor_from_item(item: MediaItem) -> Option<MediaDescriptor> {
        let kind = match item.kind.as_str() {
            "Video" => MediaKind::Video,
            "Audio" => MediaKind::Audio,
            _ => return None,
        };
        Some(MediaDescriptor {
            kind,
            raw_quality: item.media_quality,
            resolution: item.media_res,
            file_size: item.media_file_size.as_ref().and_then(json_string),
            duration_seconds: item.media_duration.as_ref().and_then(parse_duration_seconds),
            extension: item.media_extension,
            processing_handle: item.media_url,
        })
    }
}

#[async_trait]
impl MetadataProvider for YtDownProvider {
    fn name(&self) -> &'static str {
        "ytdown"
    }

    async fn fetch(&self, video_url: &str) -> Result<VideoMetadata, ProviderError> {
        let mut request = self
            .client
            .post(format!("{}/proxy.php", self.config.base_url))
            .header("accept", "*/*")
            .header("user-agent", &self.config.user_agent)
            .header("x-requested-with", "XMLHttpRequest")
            .form(&[("url", video_url)]);
        if let Some(origin) = &self.config.origin {
            request = request.header("origin", origin);
        }
        if let Some(referer) = &self.config.referer {
            request = request.header("referer", referer);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Http(response.status()));
        }

        let envelope: Envelope = response.json().await?;
        let api = envelope
            .api
            .ok_or_else(|| ProviderError::Shape("missing `api` payload".to_string()))?;

        let descriptors: Vec<MediaDescriptor> = api
            .media_items
            .into_iter()
            .filter_map(Self::descriptor_from_item)
            .collect();
        if descriptors.is_empty() {
            return Err(ProviderError::NoFormats);
        }

        Ok(VideoMetadata {
            title: api.title.unwrap_or_else(|| "Untitled".to_string()),
            thumbnail: api.image_preview_url,
            channel: api.user_info.and_then(|u| u.name),
            description: api.description,
            descriptors,
        })
    }

    async fn check_processing(&self, handle: &str) -> Result<PollCheck, ProviderError> {
        let response = self
            .client
            .get(handle)
            .header("accept", "application/json, text/html;q=0.9, */*;q=0.8")
            .header("accept-language", "en-US")
            .header("user-agent", &self.config.user_agent)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Http(response.status()));
        }

        let payload: Value = response.json().await?;
        Ok(classify_status(&payload, handle))
    }
}

/// Maps a processing-status payload onto the poll state machine:
/// `percent = "Completed"` with a file URL is terminal success, any other
/// `percent` string means still working, and a payload with neither signal
/// is the final asset itself.
fn classify_status(payload: &Value, handle: &str) -> PollCheck {
    let percent = payload.get("percent").and_then(Value::as_str);
    let file_url = payload.get("fileUrl").and_then(Value::as_str);

    match (percent, file_url) {
        (Some("Completed"), Some(url)) => PollCheck::Completed(ready_file(payload, url)),
        (Some(progress), _) => PollCheck::InProgress(progress.to_string()),
        (None, _) => {
            let url = file_url
                .or_else(|| payload.get("url").and_then(Value::as_str))
                .unwrap_or(handle);
            PollCheck::Direct(ready_file(payload, url))
        }
    }
}

fn ready_file(payload: &Value, url: &str) -> ReadyFile {
    ReadyFile {
        file_url: url.to_string(),
        file_name: payload
            .get("fileName")
            .and_then(Value::as_str)
            .map(str::to_string),
        file_size: payload.get("fileSize").and_then(json_string),
    }
}
