use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::media::{MediaDescriptor, MediaKind, VideoMetadata, parse_duration_seconds};
use crate::poll::{PollCheck, ReadyFile};
use crate::providers::{MetadataProvider, ProviderConfig, ProviderError, json_string};

const DEFAULT_BASE_URL: &str = "https://vidssave.com";

/// vidssave.com adapter. The site exposes a JSON proxy that parses a video
/// URL into `resources`; entries in `check_download` mode already carry the
/// final direct link, so processing completes synchronously.
pub struct VidssaveProvider {
    client: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    status: Option<i64>,
    msg: Option<String>,
    data: Option<DataPayload>,
}

#[derive(Debug, Deserialize)]
struct DataPayload {
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<Value>,
    #[serde(default)]
    resources: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    #[serde(rename = "type")]
    kind: String,
    quality: Option<String>,
    format: Option<String>,
    size: Option<Value>,
    download_url: Option<String>,
    resource_id: Option<Value>,
    download_mode: Option<String>,
}

impl VidssaveProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_config(
            client,
            ProviderConfig::new(DEFAULT_BASE_URL)
                .origin(DEFAULT_BASE_URL)
                .referer(format!("{DEFAULT_BASE_URL}/yt")),
        )
    }

    pub fn with_config(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self { client, config }
    }

    fn descriptor_from_resource(
        resource: Resource,
        duration_seconds: Option<f64>,
    ) -> Option<MediaDescriptor> {
        let kind = match resource.kind.as_str() {
            "video" => MediaKind::Video,
            "audio" => MediaKind::Audio,
            _ => return None,
        };
        // `check_download` entries already carry the final link; everything
        // else only has an opaque resource id.
        let direct = resource.download_mode.as_deref() == Some("check_download");
        let handle = resource
            .download_url
            .filter(|u| direct && !u.trim().is_empty())
            .or_else(|| resource.resource_id.as_ref().and_then(json_string))?;
        Some(MediaDescriptor {
            kind,
            raw_quality: resource.quality.unwrap_or_else(|| "unknown".to_string()),
            resolution: None,
            file_size: resource.size.as_ref().and_then(json_string),
            duration_seconds,
            extension: resource.format,
            processing_handle: handle,
        })
    }
}

#[async_trait]
impl MetadataProvider for VidssaveProvider {
    fn name(&self) -> &'static str {
        "vidssave"
    }

    async fn fetch(&self, video_url: &str) -> Result<VideoMetadata, ProviderError> {
        let body = json!({
            "url": "/media/parse",
            "data": { "origin": "source", "link": video_url },
            "token": "",
        });

        let mut request = self
            .client
            .post(format!("{}/api/proxy", self.config.base_url))
            .header("accept", "application/json")
            .header("user-agent", &self.config.user_agent)
            .json(&body);
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
        if envelope.status != Some(1) {
            return Err(ProviderError::Denied(
                envelope.msg.unwrap_or_else(|| "parse rejected".to_string()),
            ));
        }
        let data = envelope
            .data
            .ok_or_else(|| ProviderError::Shape("missing `data` payload".to_string()))?;

        let duration_seconds = data.duration.as_ref().and_then(parse_duration_seconds);
        let descriptors: Vec<MediaDescriptor> = data
            .resources
            .into_iter()
            .filter_map(|r| Self::descriptor_from_resource(r, duration_seconds))
            .collect();
        if descriptors.is_empty() {
            return Err(ProviderError::NoFormats);
        }

        Ok(VideoMetadata {
            title: data.title.unwrap_or_else(|| "Untitled".to_string()),
            thumbnail: data.thumbnail,
            channel: None,
            description: None,
            descriptors,
        })
    }

    async fn check_processing(&self, handle: &str) -> Result<PollCheck, ProviderError> {
        // Handles from this provider are the final time-limited links.
        if handle.starts_with("http://") || handle.starts_with("https://") {
            return Ok(PollCheck::Completed(ReadyFile {
                file_url: handle.to_string(),
                file_name: None,
                file_size: None,
            }));
        }
        Err(ProviderError::Shape(format!(
            "handle is not a direct link: {handle}"
        )))
    }
}
