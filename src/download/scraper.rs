//! Retrieval through a platform scraping tool (gallery-dl).
//!
//! The tool writes whatever it finds for a post into the work directory;
//! the first video file it produced is the result.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{command, DownloadError, DownloadedMedia, Platform, Strategy, WorkDir};

pub struct Scraper {
    executable: String,
    work_dir: PathBuf,
    cookie_file: Option<PathBuf>,
    timeout: Duration,
}

impl Scraper {
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
}

fn build_args(url: &str, output_dir: &Path, cookies: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--quiet".into(),
        "--no-part".into(),
        "--no-mtime".into(),
        "--directory".into(),
        output_dir.as_os_str().to_owned(),
    ];

    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.as_os_str().to_owned());
    }

    args.push("--".into());
    args.push(url.into());
    args
}

#[async_trait]
impl Strategy for Scraper {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn fetch(&self, url: &str, platform: Platform) -> Result<DownloadedMedia, DownloadError> {
        let work = WorkDir::create_in(&self.work_dir)?;
        let cookies = self
            .cookie_file
            .as_deref()
            .filter(|path| platform.requires_auth() && path.is_file());
        let args = build_args(url, work.path(), cookies);

        debug!("Scraper fetching {} into {}", url, work.path().display());
        command::run(&self.executable, args, work.path(), self.timeout).await?;

        work.into_first_video().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args_uses_absolute_directory() {
        let args: Vec<String> = build_args("https://www.tiktok.com/@x/video/1", Path::new("/srv/work/vidfetch-1"), None)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let d = args.iter().position(|a| a == "--directory").unwrap();
        assert_eq!(args[d + 1], "/srv/work/vidfetch-1");
        assert!(!args.contains(&"--cookies".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.tiktok.com/@x/video/1");
    }

    #[test]
    fn test_build_args_with_cookies() {
        let args: Vec<String> = build_args("u", Path::new("/w"), Some(Path::new("/c.txt")))
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let c = args.iter().position(|a| a == "--cookies").unwrap();
        assert_eq!(args[c + 1], "/c.txt");
    }

    /// A fake scraper that drops a thumbnail and a video into the directory
    /// it is given, the way gallery-dl does for a post.
    #[cfg(unix)]
    #[tokio::test]
    async fn test_fetch_returns_first_video_and_keeps_process_cwd() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::tempdir().unwrap();
        let script = bin.path().join("fake-scraper");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             while [ \"$1\" != \"--directory\" ]; do shift; done\n\
             dir=\"$2\"\n\
             echo img > \"$dir/cover.jpg\"\n\
             echo vid > \"$dir/post.mp4\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let parent = tempfile::tempdir().unwrap();
        let scraper = Scraper::new(
            script.to_string_lossy(),
            parent.path(),
            None,
            Duration::from_secs(10),
        );
        let cwd_before = std::env::current_dir().unwrap();

        let media = scraper
            .fetch("https://www.tiktok.com/@x/video/1", Platform::TikTok)
            .await
            .unwrap();

        assert!(media.path().is_absolute());
        assert!(media.path().is_file());
        assert_eq!(media.file_name(), "post.mp4");
        assert_eq!(std::env::current_dir().unwrap(), cwd_before);

        let path = media.path().to_path_buf();
        media.discard().await;
        assert!(!path.exists());
    }
}
