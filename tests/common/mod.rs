// Not every test binary uses every helper here.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::time::{Duration, sleep};

use vidlink::media::{MediaDescriptor, MediaKind, VideoMetadata};
use vidlink::poll::{PollCheck, ReadyFile};
use vidlink::providers::{MetadataProvider, ProviderError};

/// Scripted stand-in for a real downloader backend: serves canned metadata
/// and replays a scripted sequence of processing-status answers, falling
/// back to a default answer once the script runs out.
pub struct StubProvider {
    metadata: VideoMetadata,
    script: Mutex<VecDeque<ScriptedCheck>>,
    default: ScriptedCheck,
    check_delay: Duration,
    attempts: AtomicU32,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Clone)]
pub enum ScriptedCheck {
    Answer(PollCheck),
    /// A retryable failure, reported as an upstream HTTP status.
    Transient(reqwest::StatusCode),
    /// A wrong-data failure that no retry can cure.
    Permanent(String),
}

impl StubProvider {
    pub fn new(metadata: VideoMetadata, default: ScriptedCheck) -> Self {
        Self {
            metadata,
            script: Mutex::new(VecDeque::new()),
            default,
            check_delay: Duration::ZERO,
            attempts: AtomicU32::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_script(mut self, script: Vec<ScriptedCheck>) -> Self {
        self.script = Mutex::new(script.into());
        self
    }

    /// Makes every status check take this long, so concurrent sequences
    /// actually overlap and the high-water mark is meaningful.
    pub fn with_check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = delay;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn fetch(&self, _video_url: &str) -> Result<VideoMetadata, ProviderError> {
        Ok(self.metadata.clone())
    }

    async fn check_processing(&self, _handle: &str) -> Result<PollCheck, ProviderError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.check_delay.is_zero() {
            sleep(self.check_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = {
            let mut script = self.script.lock().expect("script lock");
            script.pop_front().unwrap_or_else(|| self.default.clone())
        };
        match next {
            ScriptedCheck::Answer(check) => Ok(check),
            ScriptedCheck::Transient(status) => Err(ProviderError::Http(status)),
            ScriptedCheck::Permanent(message) => Err(ProviderError::Shape(message)),
        }
    }
}

pub fn in_progress(progress: &str) -> ScriptedCheck {
    ScriptedCheck::Answer(PollCheck::InProgress(progress.to_string()))
}

pub fn completed(file_url: &str) -> ScriptedCheck {
    ScriptedCheck::Answer(PollCheck::Completed(ReadyFile {
        file_url: file_url.to_string(),
        file_name: Some("clip.mp4".to_string()),
        file_size: Some("12.3 MB".to_string()),
    }))
}

pub fn video(raw: &str, resolution: Option<&str>) -> MediaDescriptor {
    MediaDescriptor {
        kind: MediaKind::Video,
        raw_quality: raw.to_string(),
        resolution: resolution.map(str::to_string),
        file_size: Some("10.0 MB".to_string()),
        duration_seconds: Some(213.0),
        extension: Some("mp4".to_string()),
        processing_handle: format!("https://processing.example/{raw}"),
    }
}

pub fn audio(raw: &str) -> MediaDescriptor {
    MediaDescriptor {
        kind: MediaKind::Audio,
        raw_quality: raw.to_string(),
        resolution: None,
        file_size: Some("3.2 MB".to_string()),
        duration_seconds: Some(213.0),
        extension: Some("m4a".to_string()),
        processing_handle: format!("https://processing.example/{raw}"),
    }
}

pub fn sample_metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Test Clip".to_string(),
        thumbnail: Some("https://img.example/thumb.jpg".to_string()),
        channel: Some("Test Channel".to_string()),
        description: Some("A clip used by the integration tests.".to_string()),
        descriptors: vec![
            video("FHD", Some("1920x1080")),
            video("HD", Some("1280x720")),
            video("HD", Some("1280x720")),
            video("SD", Some("640x360")),
            audio("48K"),
            audio("128K"),
        ],
    }
}
