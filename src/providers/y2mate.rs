use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};

use crate::extract::extract_video_id;
use crate::media::{MediaDescriptor, MediaKind, VideoMetadata, parse_duration_str};
use crate::poll::{PollCheck, ReadyFile};
use crate::providers::{MetadataProvider, ProviderConfig, ProviderError};

const DEFAULT_BASE_URL: &str = "https://v6.www-y2mate.com";
const DEFAULT_FRAME_BASE: &str = "https://frame.y2meta-uk.com";
const DEFAULT_LOAD_BASE: &str = "https://load.y2meta-uk.com";

const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "m4a", "opus", "aac", "wav"];

static GET_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"get_link\('([^']*)','([^']*)','([^']*)'").expect("valid regex"));

static IFRAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("#widgetv2Api").expect("valid selector"));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.thumbnail.cover a").expect("valid selector"));
static THUMBNAIL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.thumbnail.cover img").expect("valid selector"));
static DURATION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.duration").expect("valid selector"));
static TABLE_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.table tbody tr").expect("valid selector"));
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));
static FILE_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("button.btn-file").expect("valid selector"));

/// y2mate/y2meta adapter. This provider has no JSON API at all: the convert
/// page embeds a widget iframe whose HTML lists the offered formats in a
/// table, and the table rows carry the token needed to build each direct
/// download link.
pub struct Y2mateProvider {
    client: reqwest::Client,
    config: ProviderConfig,
    frame_base: String,
    load_base: String,
}

/// One scraped format-table row, already detached from the DOM.
#[derive(Debug)]
struct ScrapedPage {
    title: String,
    thumbnail: Option<String>,
    duration: Option<String>,
    rows: Vec<ScrapedRow>,
}

#[derive(Debug)]
struct ScrapedRow {
    quality: String,
    format: String,
    size: String,
    link_key: String,
}

impl Y2mateProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_config(
            client,
            ProviderConfig::new(DEFAULT_BASE_URL)
                .origin(DEFAULT_BASE_URL)
                .referer(format!("{DEFAULT_BASE_URL}/search/")),
        )
    }

    pub fn with_config(client: reqwest::Client, config: ProviderConfig) -> Self {
        Self {
            client,
            config,
            frame_base: DEFAULT_FRAME_BASE.to_string(),
            load_base: DEFAULT_LOAD_BASE.to_string(),
        }
    }

    fn frame_url(&self, src: &str, video_id: &str) -> String {
        let mut url = if src.starts_with("http") {
            src.to_string()
        } else {
            format!("{}/{}", self.frame_base, src.trim_start_matches('/'))
        };
        if !url.contains("videoId=") {
            url = format!("{url}?videoId={}", urlencoding::encode(video_id));
        }
        url
    }

    fn descriptor_from_row(&self, row: ScrapedRow, video_id: &str) -> MediaDescriptor {
        let format = row.format.to_lowercase();
        let kind = if AUDIO_EXTENSIONS.contains(&format.as_str())
            || row.quality.to_lowercase().contains("kbps")
        {
            MediaKind::Audio
        } else {
            MediaKind::Video
        };
        let handle = format!(
            "{}/download/get?videoId={}&k={}&t={}",
            self.load_base,
            urlencoding::encode(video_id),
            urlencoding::encode(&row.link_key),
            urlencoding::encode(&format),
        );
        MediaDescriptor {
            kind,
            raw_quality: row.quality,
            resolution: None,
            file_size: Some(row.size).filter(|s| !s.is_empty()),
            duration_seconds: None,
            extension: Some(format),
            processing_handle: handle,
        }
    }
}

// DOM work happens in synchronous helpers that return owned data: `Html` is
// not `Send` and must never live across an await point.

fn scrape_iframe_src(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&IFRAME)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(str::to_string)
}

fn scrape_frame(html: &str) -> ScrapedPage {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE)
        .next()
        .and_then(|el| el.value().attr("title"))
        .unwrap_or("Untitled")
        .to_string();
    let thumbnail = document
        .select(&THUMBNAIL)
        .next()
        .and_then(|el| el.value().attr("src"))
        .map(|src| {
            if src.starts_with("http") {
                src.to_string()
            } else {
                format!("https:{src}")
            }
        });
    let duration = document
        .select(&DURATION)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty());

    let mut rows = Vec::new();
    for row in document.select(&TABLE_ROW) {
        let cells: Vec<String> = row
            .select(&CELL)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();
        let Some(button) = row.select(&FILE_BUTTON).next() else {
            continue;
        };
        let Some(onclick) = button.value().attr("onclick") else {
            continue;
        };
        let Some(caps) = GET_LINK.captures(onclick) else {
            continue;
        };
        if cells.len() < 2 {
            continue;
        }
        rows.push(ScrapedRow {
            quality: cells[0].clone(),
            format: cells[1].to_lowercase(),
            size: cells.get(2).cloned().unwrap_or_default(),
            link_key: caps[3].to_string(),
        });
    }

    ScrapedPage {
        title,
        thumbnail,
        duration,
        rows,
    }
}

#[async_trait]
impl MetadataProvider for Y2mateProvider {
    fn name(&self) -> &'static str {
        "y2mate"
    }

    async fn fetch(&self, video_url: &str) -> Result<VideoMetadata, ProviderError> {
        let video_id = extract_video_id(video_url)
            .ok_or_else(|| ProviderError::Shape("could not extract a video id".to_string()))?;

        let mut request = self
            .client
            .post(format!("{}/convert/", self.config.base_url))
            .header("user-agent", &self.config.user_agent)
            .form(&[("videoId", video_id.as_str())]);
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
        let convert_html = response.text().await?;
        let iframe_src = scrape_iframe_src(&convert_html)
            .ok_or_else(|| ProviderError::Shape("widget iframe not found".to_string()))?;

        let frame_response = self
            .client
            .get(self.frame_url(&iframe_src, &video_id))
            .header("user-agent", &self.config.user_agent)
            .send()
            .await?;
        if !frame_response.status().is_success() {
            return Err(ProviderError::Http(frame_response.status()));
        }
        let frame_html = frame_response.text().await?;
        let page = scrape_frame(&frame_html);
        if page.rows.is_empty() {
            return Err(ProviderError::NoFormats);
        }

        let duration_seconds = page.duration.as_deref().and_then(parse_duration_str);
        let descriptors = page
            .rows
            .into_iter()
            .map(|row| {
                let mut descriptor = self.descriptor_from_row(row, &video_id);
                descriptor.duration_seconds = duration_seconds;
                descriptor
            })
            .collect();

        Ok(VideoMetadata {
            title: page.title,
            thumbnail: page.thumbnail,
            channel: None,
            description: None,
            descriptors,
        })
    }

    async fn check_processing(&self, handle: &str) -> Result<PollCheck, ProviderError> {
        // The scraped links are already the final time-limited endpoints.
        Ok(PollCheck::Completed(ReadyFile {
            file_url: handle.to_string(),
            file_name: None,
            file_size: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_HTML: &str = r##"
        <html><body>
          <div class="thumbnail cover">
            <a title="Test Clip" href="#">Test Clip</a>
            <img src="//img.example/thumb.jpg">
          </div>
          <span class="duration">3:33</span>
          <div class="table"><table><tbody>
            <tr>
              <td>1080p</td><td>MP4</td><td>42.0 MB</td>
              <td><button class="btn-file" onclick="get_link('a','b','K1080')">DL</button></td>
            </tr>
            <tr>
              <td>128kbps</td><td>MP3</td><td>3.2 MB</td>
              <td><button class="btn-file" onclick="get_link('a','b','KAUD')">DL</button></td>
            </tr>
            <tr>
              <td>720p</td><td>MP4</td><td></td>
              <td><button class="btn-other">n/a</button></td>
            </tr>
          </tbody></table></div>
        </body></html>"##;

    #[test]
    fn scrapes_iframe_src() {
        let html = r#"<html><body><iframe id="widgetv2Api" src="widget?videoId=abc"></iframe></body></html>"#;
        assert_eq!(scrape_iframe_src(html).as_deref(), Some("widget?videoId=abc"));
        assert_eq!(scrape_iframe_src("<html></html>"), None);
    }

    #[test]
    fn scrapes_title_thumbnail_duration_and_rows() {
        let page = scrape_frame(FRAME_HTML);
        assert_eq!(page.title, "Test Clip");
        assert_eq!(
            page.thumbnail.as_deref(),
            Some("https://img.example/thumb.jpg")
        );
        assert_eq!(page.duration.as_deref(), Some("3:33"));
        // The row without a btn-file button is skipped.
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].quality, "1080p");
        assert_eq!(page.rows[0].format, "mp4");
        assert_eq!(page.rows[0].link_key, "K1080");
    }

    #[test]
    fn classifies_rows_and_builds_direct_links() {
        let provider = Y2mateProvider::new(reqwest::Client::new());
        let page = scrape_frame(FRAME_HTML);

        let video = provider.descriptor_from_row(
            ScrapedRow {
                quality: page.rows[0].quality.clone(),
                format: page.rows[0].format.clone(),
                size: page.rows[0].size.clone(),
                link_key: page.rows[0].link_key.clone(),
            },
            "dQw4w9WgXcQ",
        );
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(video.raw_quality, "1080p");
        assert!(
            video
                .processing_handle
                .contains("/download/get?videoId=dQw4w9WgXcQ&k=K1080&t=mp4")
        );

        let audio = provider.descriptor_from_row(
            ScrapedRow {
                quality: "128kbps".to_string(),
                format: "mp3".to_string(),
                size: String::new(),
                link_key: "KAUD".to_string(),
            },
            "dQw4w9WgXcQ",
        );
        assert_eq!(audio.kind, MediaKind::Audio);
        assert_eq!(audio.file_size, None);
    }

    #[test]
    fn frame_url_joins_relative_src_and_appends_video_id() {
        let provider = Y2mateProvider::new(reqwest::Client::new());
        assert_eq!(
            provider.frame_url("widget?videoId=abc", "abc"),
            format!("{DEFAULT_FRAME_BASE}/widget?videoId=abc")
        );
        assert_eq!(
            provider.frame_url("widget", "abc"),
            format!("{DEFAULT_FRAME_BASE}/widget?videoId=abc")
        );
        assert_eq!(
            provider.frame_url("https://frame.example/w?videoId=abc", "abc"),
            "https://frame.example/w?videoId=abc"
        );
    }
}
