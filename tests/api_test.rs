mod common;

use std::sync::Arc;

use serde_json::Value;
use tokio::time::Duration;

use common::{StubProvider, completed, in_progress, sample_metadata};
use vidlink::handlers::{AppState, router};
use vidlink::poll::PollPolicy;

const VIDEO_URL: &str = "https://youtu.be/dQw4w9WgXcQ";

async fn spawn_app(provider: StubProvider) -> String {
    let state = AppState {
        provider: Arc::new(provider),
        poll_policy: PollPolicy::new(3, Duration::ZERO),
    };
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.expect("serve");
    });
    format!("http://{addr}")
}

async fn get_json(url: &str) -> (reqwest::StatusCode, Value) {
    let response = reqwest::get(url).await.expect("request");
    let status = response.status();
    let body = response.json().await.expect("json body");
    (status, body)
}

#[tokio::test]
async fn health_reports_ok() {
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("0%"))).await;
    let (status, body) = get_json(&format!("{base}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn formats_lists_canonical_qualities_without_duplicates() {
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("0%"))).await;

    let (status, body) = get_json(&format!("{base}/api/formats?url={VIDEO_URL}")).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["videoId"], "dQw4w9WgXcQ");
    assert_eq!(body["title"], "Test Clip");
    let ids: Vec<&str> = body["formats"]
        .as_array()
        .expect("formats array")
        .iter()
        .map(|f| f["id"].as_str().expect("id"))
        .collect();
    // The duplicate HD offer collapses into one 720p entry.
    assert_eq!(ids, ["1080p", "720p", "360p", "audio48", "audio128"]);

    let first = &body["formats"][0];
    assert_eq!(first["type"], "video");
    assert_eq!(first["label"], "1080p (FHD) (1920x1080)");
    assert_eq!(first["originalQuality"], "FHD");
    let link = first["downloadUrl"].as_str().expect("downloadUrl");
    assert!(link.starts_with("/api/download?url="));
    assert!(link.ends_with("&quality=1080p"));
}

#[tokio::test]
async fn missing_and_invalid_urls_are_client_errors() {
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("0%"))).await;

    let (status, body) = get_json(&format!("{base}/api/formats")).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "MISSING_URL");

    let (status, body) =
        get_json(&format!("{base}/api/download?url=https://example.com/nope")).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "INVALID_URL");
}

#[tokio::test]
async fn download_resolves_polls_and_returns_the_file_url() {
    let provider = StubProvider::new(sample_metadata(), in_progress("88%"))
        .with_script(vec![in_progress("41%"), completed("https://cdn.example/X")]);
    let base = spawn_app(provider).await;

    let (status, body) =
        get_json(&format!("{base}/api/download?url={VIDEO_URL}&quality=720p")).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["quality"], "720p (HD)");
    assert_eq!(body["originalQuality"], "HD");
    assert_eq!(body["downloadUrl"], "https://cdn.example/X");
    assert_eq!(body["fileName"], "clip.mp4");
    assert_eq!(body["videoId"], "dQw4w9WgXcQ");
}

#[tokio::test]
async fn download_falls_back_to_nearest_tier_at_or_below() {
    // 1440p is not offered; the resolver lands on 1080p (FHD).
    let provider = StubProvider::new(sample_metadata(), completed("https://cdn.example/F"));
    let base = spawn_app(provider).await;

    let (status, body) =
        get_json(&format!("{base}/api/download?url={VIDEO_URL}&quality=1440p")).await;

    assert_eq!(status, 200);
    assert_eq!(body["originalQuality"], "FHD");
}

#[tokio::test]
async fn unknown_quality_is_a_404_with_complete_suggestions() {
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("0%"))).await;

    let (status, body) =
        get_json(&format!("{base}/api/download?url={VIDEO_URL}&quality=flac")).await;

    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "QUALITY_NOT_FOUND");
    let suggested: Vec<&str> = body["suggestions"]
        .as_array()
        .expect("suggestions array")
        .iter()
        .map(|s| s.as_str().expect("key"))
        .collect();
    assert_eq!(suggested, ["1080p", "720p", "360p", "audio48", "audio128"]);
}

#[tokio::test]
async fn download_without_quality_lists_formats_and_usage() {
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("0%"))).await;

    let (status, body) = get_json(&format!("{base}/api/download?url={VIDEO_URL}")).await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["formats"].as_array().expect("formats").len(), 5);
    assert!(body["usage"]["everything"]
        .as_str()
        .expect("usage link")
        .ends_with("&quality=all"));
}

#[tokio::test]
async fn processing_timeout_is_distinct_from_generic_failure() {
    // Always in progress: the 3-attempt budget runs out.
    let base = spawn_app(StubProvider::new(sample_metadata(), in_progress("37%"))).await;

    let (status, body) =
        get_json(&format!("{base}/api/download?url={VIDEO_URL}&quality=1080p")).await;

    assert_eq!(status, 500);
    assert_eq!(body["code"], "PROCESSING_TIMEOUT");
    assert!(
        body["error"]
            .as_str()
            .expect("error message")
            .contains("still in progress")
    );
}

#[tokio::test]
async fn download_all_reports_each_distinct_quality() {
    let provider = StubProvider::new(sample_metadata(), completed("https://cdn.example/file"));
    let base = spawn_app(provider).await;

    let (status, body) =
        get_json(&format!("{base}/api/download?url={VIDEO_URL}&quality=all")).await;

    assert_eq!(status, 200);
    let results = body["results"].as_array().expect("results array");
    let keys: Vec<&str> = results
        .iter()
        .map(|r| r["quality"].as_str().expect("quality"))
        .collect();
    assert_eq!(keys, ["1080p", "720p", "360p", "audio48", "audio128"]);
    assert!(results.iter().all(|r| r["status"] == "ready"));
}

#[tokio::test]
async fn info_returns_metadata_without_polling() {
    let provider = StubProvider::new(sample_metadata(), in_progress("0%"));
    let base = spawn_app(provider).await;

    let (status, body) = get_json(&format!("{base}/api/info?url={VIDEO_URL}")).await;

    assert_eq!(status, 200);
    assert_eq!(body["title"], "Test Clip");
    assert_eq!(body["channel"], "Test Channel");
    assert_eq!(body["duration"], "3:33");
    // No status checks happen on the info path.
}
