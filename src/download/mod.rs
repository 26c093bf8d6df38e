//! Download module - turns a link into a local video file.
//!
//! ## Architecture
//!
//! - `platform` - Maps a URL to a [`Platform`]
//! - `extractor` - yt-dlp based retrieval
//! - `vendor_api` - Third-party download API (RapidAPI)
//! - `scraper` - Platform scraping tool (gallery-dl)
//! - `router` - Platform -> strategy routing, errors collapse to `None`
//! - `media` - Per-request work directories and the resulting artifact

mod command;
mod extractor;
mod media;
mod platform;
mod router;
mod scraper;
mod vendor_api;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use extractor::Extractor;
pub use media::{DownloadedMedia, WorkDir};
pub use platform::{detect, Platform};
pub use router::Downloader;
pub use scraper::Scraper;
pub use vendor_api::VendorApi;

/// Everything that can go wrong inside a retrieval strategy.
///
/// These never reach the messaging layer; the router logs them and
/// reports plain absence.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{program} exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed provider response: {0}")]
    Payload(String),
    #[error("content is an image slideshow")]
    Slideshow,
    #[error("resolved link is not a video: {0}")]
    NotVideo(String),
    #[error("no video file was produced")]
    NoOutput,
    #[error("no strategy configured for {0}")]
    NoStrategy(Platform),
}

/// A platform-specific procedure that turns a URL into a local file.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the video behind `url`.
    ///
    /// On success the returned file exists and lives in a directory owned
    /// by the artifact.
    async fn fetch(&self, url: &str, platform: Platform) -> Result<DownloadedMedia, DownloadError>;
}

/// Configurable strategy choice for a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Extractor,
    VendorApi,
    Scraper,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extractor => "extractor",
            Self::VendorApi => "vendor_api",
            Self::Scraper => "scraper",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "extractor" | "ytdlp" | "yt_dlp" => Ok(Self::Extractor),
            "vendor_api" | "api" | "rapidapi" => Ok(Self::VendorApi),
            "scraper" | "gallery_dl" => Ok(Self::Scraper),
            other => Err(format!(
                "unknown strategy `{other}`, expected extractor, vendor_api or scraper"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parse() {
        assert_eq!("extractor".parse(), Ok(StrategyKind::Extractor));
        assert_eq!("yt-dlp".parse(), Ok(StrategyKind::Extractor));
        assert_eq!(" Vendor_API ".parse(), Ok(StrategyKind::VendorApi));
        assert_eq!("gallery-dl".parse(), Ok(StrategyKind::Scraper));
        assert!("magic".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_strategy_kind_display_round_trips() {
        for kind in [StrategyKind::Extractor, StrategyKind::VendorApi, StrategyKind::Scraper] {
            assert_eq!(kind.to_string().parse(), Ok(kind));
        }
    }
}
