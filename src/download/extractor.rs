//! yt-dlp based retrieval.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{command, DownloadError, DownloadedMedia, Platform, Strategy, WorkDir};

/// Prefer a single progressive mp4, fall back to whatever is best.
const FORMAT: &str = "best[ext=mp4]/best";

/// Downloads through the yt-dlp media extractor.
pub struct Extractor {
    executable: String,
    work_dir: PathBuf,
    cookie_file: Option<PathBuf>,
    timeout: Duration,
}

impl Extractor {
    pub fn new(
        executable: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        cookie_file: Option<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            executable: executable.into(),
            work_dir: work_dir.into(),
            cookie_file,
            timeout,
        }
    }

    /// Cookie jar to attach for `platform`, if any.
    fn cookies_for(&self, platform: Platform) -> Option<&Path> {
        if !platform.requires_auth() {
            return None;
        }
        let path = self.cookie_file.as_deref()?;
        if path.is_file() {
            Some(path)
        } else {
            warn!("Cookie file {} does not exist, fetching {} anonymously", path.display(), platform);
            None
        }
    }
}

/// Build the yt-dlp argument list for one download into `output_dir`.
fn build_args(url: &str, output_dir: &Path, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--ignore-config",
        "--no-playlist",
        "--no-colors",
        "--no-progress",
        "--no-mtime",
        "--quiet",
        "--no-warnings",
        "--socket-timeout",
        "15",
        "-f",
        FORMAT,
        "--merge-output-format",
        "mp4",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();

    args.push("-o".into());
    args.push(output_dir.join("video.%(ext)s").into_os_string());

    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.as_os_str().to_owned());
    }

    args.push("--".into());
    args.push(url.into());
    args
}

#[async_trait]
impl Strategy for Extractor {
    fn name(&self) -> &'static str {
        "extractor"
    }

    async fn fetch(&self, url: &str, platform: Platform) -> Result<DownloadedMedia, DownloadError> {
        let work = WorkDir::create_in(&self.work_dir)?;
        let args = build_args(url, work.path(), self.cookies_for(platform));

        debug!("yt-dlp fetching {} into {}", url, work.path().display());
        command::run(&self.executable, args, work.path(), self.timeout).await?;

        work.into_first_video().await
    }
}
