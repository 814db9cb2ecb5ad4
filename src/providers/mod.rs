use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::media::VideoMetadata;
use crate::poll::PollCheck;

pub mod vidssave;
pub mod y2mate;
pub mod ytdown;

pub use vidssave::VidssaveProvider;
pub use y2mate::Y2mateProvider;
pub use ytdown::YtDownProvider;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("upstream returned HTTP {0}")]
    Http(reqwest::StatusCode),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error("unexpected upstream payload: {0}")]
    Shape(String),
    #[error("provider reported no usable formats")]
    NoFormats,
    #[error("provider denied the request: {0}")]
    Denied(String),
}

impl ProviderError {
    /// Whether a retry could plausibly succeed. Network and HTTP-status
    /// failures are transient; everything else is wrong data, and retrying
    /// would only burn the caller's attempt budget on a known outcome.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Request(_))
    }
}

/// Outbound request identity presented to a provider. Explicit per-adapter
/// state instead of module-level constants, so every adapter instance is
/// independently configurable and testable.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub user_agent: String,
    pub origin: Option<String>,
    pub referer: Option<String>,
}

impl ProviderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            user_agent: "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/142.0.0.0 Mobile Safari/537.36"
                .to_string(),
            origin: None,
            referer: None,
        }
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// One third-party downloader backend: discovers the available media
/// descriptors for a video URL and answers processing-status probes for the
/// handles it hands out. New providers are added by writing one adapter;
/// the normalizer, resolver and poller never change.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, video_url: &str) -> Result<VideoMetadata, ProviderError>;

    async fn check_processing(&self, handle: &str) -> Result<PollCheck, ProviderError>;
}

/// String form of a JSON scalar: providers report sizes and durations as
/// either strings or numbers depending on the endpoint.
pub(crate) fn json_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Selects the active provider from the `PROVIDER` environment variable
/// (`ytdown` by default).
pub fn provider_from_env(client: reqwest::Client) -> Arc<dyn MetadataProvider> {
    let selected = std::env::var("PROVIDER").unwrap_or_default();
    let provider: Arc<dyn MetadataProvider> = match selected.trim().to_ascii_lowercase().as_str() {
        "vidssave" => Arc::new(VidssaveProvider::new(client)),
        "y2mate" => Arc::new(Y2mateProvider::new(client)),
        _ => Arc::new(YtDownProvider::new(client)),
    };
    info!(provider = provider.name(), "metadata provider selected");
    provider
}
