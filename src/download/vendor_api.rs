//! Third-party download API (RapidAPI TikTok downloader).
//!
//! The API answers with JSON listing watermark-free and watermarked video
//! links. Slideshow posts come back as a list of images and are rejected.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::{DownloadError, DownloadedMedia, Platform, Strategy, WorkDir};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

const VIDEO_SUFFIXES: &[&str] = &[".mp4", ".mov", ".webm", ".m4v"];
const NON_VIDEO_SUFFIXES: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif", ".mp3", ".m4a"];

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<ApiData>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    hdplay: Option<String>,
    play: Option<String>,
    wmplay: Option<String>,
    #[serde(default)]
    images: Option<Vec<String>>,
}

/// Client for the vendor download-info API.
pub struct VendorApi {
    client: Client,
    api_key: String,
    api_host: String,
    work_dir: PathBuf,
}

impl VendorApi {
    pub fn new(
        api_key: impl Into<String>,
        api_host: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(15))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            api_host: api_host.into(),
            work_dir: work_dir.into(),
        })
    }

    /// Ask the API for a direct video link.
    async fn resolve(&self, url: &str) -> Result<String, DownloadError> {
        let endpoint = format!("https://{}/", self.api_host);
        let response = self
            .client
            .get(&endpoint)
            .query(&[("url", url), ("hd", "1")])
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", &self.api_host)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        let body = response.text().await?;
        video_link_from_payload(&body)
    }

    /// Stream `link` into `work` as `video.mp4`.
    async fn save(&self, link: &str, work: WorkDir) -> Result<DownloadedMedia, DownloadError> {
        let response = self.client.get(link).send().await?;

        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        if let Some(content_type) = response.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            let content_type = content_type.to_ascii_lowercase();
            if content_type.starts_with("image/") || content_type.starts_with("text/") {
                return Err(DownloadError::NotVideo(format!("{link} ({content_type})")));
            }
        }

        let path = work.path().join("video.mp4");
        let mut file = tokio::fs::File::create(&path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        if written == 0 {
            return Err(DownloadError::NoOutput);
        }

        debug!("Saved {} bytes from vendor API to {}", written, path.display());
        work.into_media(path)
    }
}

/// Pick the best video link out of an API payload.
///
/// Preference: HD without watermark, then without watermark, then the
/// watermarked fallback.
fn video_link_from_payload(body: &str) -> Result<String, DownloadError> {
    let response: ApiResponse =
        serde_json::from_str(body).map_err(|e| DownloadError::Payload(e.to_string()))?;

    if response.code != 0 {
        return Err(DownloadError::Payload(format!(
            "code {}: {}",
            response.code,
            response.msg.unwrap_or_default()
        )));
    }

    let data = response
        .data
        .ok_or_else(|| DownloadError::Payload("missing `data`".to_string()))?;

    if data.images.as_ref().is_some_and(|images| !images.is_empty()) {
        return Err(DownloadError::Slideshow);
    }

    let link = [data.hdplay, data.play, data.wmplay]
        .into_iter()
        .flatten()
        .map(|link| link.trim().to_string())
        .find(|link| !link.is_empty())
        .ok_or_else(|| DownloadError::Payload("no video link in `data`".to_string()))?;

    if !looks_like_video(&link) {
        return Err(DownloadError::NotVideo(link));
    }

    Ok(link)
}

/// Heuristic check that a link points at a video asset.
fn looks_like_video(link: &str) -> bool {
    let Ok(url) = Url::parse(link) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let path = url.path().to_ascii_lowercase();
    if NON_VIDEO_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return false;
    }
    if VIDEO_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return true;
    }

    // CDN links carry no extension but name the asset type
    let query = url.query().unwrap_or_default().to_ascii_lowercase();
    path.contains("video") || query.contains("mime_type=video")
}

#[async_trait]
impl Strategy for VendorApi {
    fn name(&self) -> &'static str {
        "vendor_api"
    }

    async fn fetch(&self, url: &str, _platform: Platform) -> Result<DownloadedMedia, DownloadError> {
        let link = self.resolve(url).await?;
        debug!("Vendor API resolved {} to {}", url, link);

        let work = WorkDir::create_in(&self.work_dir)?;
        self.save(&link, work).await
    }
}
