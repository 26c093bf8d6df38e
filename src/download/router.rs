//! Platform -> strategy routing.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::{
    DownloadError, DownloadedMedia, Extractor, Platform, Scraper, Strategy, StrategyKind, VendorApi,
};
use crate::config::DownloadConfig;

/// Routes each platform to its configured strategy.
///
/// Callers only ever see a file or `None`; strategy errors are logged here.
pub struct Downloader {
    routes: HashMap<Platform, Arc<dyn Strategy>>,
    permits: Option<Arc<Semaphore>>,
}

impl Downloader {
    /// Create a downloader from explicit routes.
    pub fn new(routes: HashMap<Platform, Arc<dyn Strategy>>, max_parallel: usize) -> Self {
        let permits = (max_parallel > 0).then(|| Arc::new(Semaphore::new(max_parallel)));
        Self { routes, permits }
    }

    /// Build strategies for every route in the configuration.
    ///
    /// Each strategy kind is instantiated once and shared between platforms.
    pub fn from_config(config: &DownloadConfig) -> Result<Self, DownloadError> {
        let mut built: HashMap<StrategyKind, Arc<dyn Strategy>> = HashMap::new();
        let mut routes = HashMap::with_capacity(config.routes.len());

        for (platform, kind) in &config.routes {
            let strategy = match built.get(kind) {
                Some(strategy) => Arc::clone(strategy),
                None => {
                    let strategy = build_strategy(*kind, config)?;
                    built.insert(*kind, Arc::clone(&strategy));
                    strategy
                }
            };
            info!("Routing {} downloads through {}", platform, kind);
            routes.insert(*platform, strategy);
        }

        Ok(Self::new(routes, config.max_parallel))
    }

    /// Fetch `url` with the strategy configured for `platform`.
    ///
    /// Returns `None` on any failure.
    pub async fn fetch(&self, url: &str, platform: Platform) -> Option<DownloadedMedia> {
        let Some(strategy) = self.routes.get(&platform) else {
            warn!("Download failed for {}: {}", url, DownloadError::NoStrategy(platform));
            return None;
        };

        // Held until the strategy returns; a closed semaphore never happens here
        let _permit = match &self.permits {
            Some(permits) => Arc::clone(permits).acquire_owned().await.ok(),
            None => None,
        };

        match strategy.fetch(url, platform).await {
            Ok(media) => {
                info!(
                    "Downloaded {} via {} ({}) to {}",
                    url,
                    strategy.name(),
                    platform,
                    media.path().display()
                );
                Some(media)
            }
            Err(e) => {
                warn!("Download failed for {} via {} ({}): {}", url, strategy.name(), platform, e);
                None
            }
        }
    }
}

fn build_strategy(kind: StrategyKind, config: &DownloadConfig) -> Result<Arc<dyn Strategy>, DownloadError> {
    let strategy: Arc<dyn Strategy> = match kind {
        StrategyKind::Extractor => Arc::new(Extractor::new(
            config.yt_dlp_path.clone(),
            config.work_dir.clone(),
            config.cookie_file.clone(),
            config.timeout,
        )),
        StrategyKind::Scraper => Arc::new(Scraper::new(
            config.scraper_path.clone(),
            config.work_dir.clone(),
            config.cookie_file.clone(),
            config.timeout,
        )),
        StrategyKind::VendorApi => Arc::new(VendorApi::new(
            config.rapidapi_key.clone().unwrap_or_default(),
            config.rapidapi_host.clone(),
            config.work_dir.clone(),
            config.timeout,
        )?),
    };
    Ok(strategy)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::download::WorkDir;

    /// Writes a small file, or fails, and counts calls.
    struct FakeStrategy {
        work_dir: PathBuf,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeStrategy {
        fn new(work_dir: &std::path::Path, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                work_dir: work_dir.to_path_buf(),
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Strategy for FakeStrategy {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch(&self, _url: &str, _platform: Platform) -> Result<DownloadedMedia, DownloadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DownloadError::Slideshow);
            }
            let work = WorkDir::create_in(&self.work_dir)?;
            let path = work.path().join("video.mp4");
            std::fs::write(&path, b"vid")?;
            work.into_media(path)
        }
    }

    #[tokio::test]
    async fn test_routes_to_configured_strategy() {
        let parent = tempfile::tempdir().unwrap();
        let good = FakeStrategy::new(parent.path(), false);
        let bad = FakeStrategy::new(parent.path(), true);

        let mut routes: HashMap<Platform, Arc<dyn Strategy>> = HashMap::new();
        routes.insert(Platform::YouTube, good.clone());
        routes.insert(Platform::TikTok, bad.clone());
        let downloader = Downloader::new(routes, 0);

        let media = downloader.fetch("https://youtu.be/x", Platform::YouTube).await.unwrap();
        assert!(media.path().is_file());
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bad.calls.load(Ordering::SeqCst), 0);
        media.discard().await;

        // Errors collapse to None
        assert!(downloader.fetch("https://tiktok.com/@x/video/1", Platform::TikTok).await.is_none());
        assert_eq!(bad.calls.load(Ordering::SeqCst), 1);

        // Unrouted platform
        assert!(downloader.fetch("https://instagram.com/p/x", Platform::Instagram).await.is_none());
    }

    #[tokio::test]
    async fn test_remapping_swaps_strategy_without_touching_callers() {
        let parent = tempfile::tempdir().unwrap();
        let first = FakeStrategy::new(parent.path(), true);
        let second = FakeStrategy::new(parent.path(), false);

        let mut routes: HashMap<Platform, Arc<dyn Strategy>> = HashMap::new();
        routes.insert(Platform::TikTok, first);
        let downloader = Downloader::new(routes, 0);
        assert!(downloader.fetch("u", Platform::TikTok).await.is_none());

        let mut routes: HashMap<Platform, Arc<dyn Strategy>> = HashMap::new();
        routes.insert(Platform::TikTok, second);
        let downloader = Downloader::new(routes, 1);
        let media = downloader.fetch("u", Platform::TikTok).await.unwrap();
        media.discard().await;
    }

    #[test]
    fn test_from_config_shares_strategy_instances() {
        let mut routes = HashMap::new();
        routes.insert(Platform::TikTok, StrategyKind::Scraper);
        routes.insert(Platform::Instagram, StrategyKind::Extractor);
        routes.insert(Platform::YouTube, StrategyKind::Extractor);

        let config = DownloadConfig {
            work_dir: std::env::temp_dir(),
            yt_dlp_path: "yt-dlp".to_string(),
            scraper_path: "gallery-dl".to_string(),
            cookie_file: None,
            rapidapi_key: None,
            rapidapi_host: "example.com".to_string(),
            timeout: Duration::from_secs(1),
            max_parallel: 2,
            routes,
        };

        let downloader = Downloader::from_config(&config).unwrap();
        assert_eq!(downloader.routes[&Platform::TikTok].name(), "scraper");
        assert_eq!(downloader.routes[&Platform::YouTube].name(), "extractor");
        assert!(Arc::ptr_eq(
            &downloader.routes[&Platform::Instagram],
            &downloader.routes[&Platform::YouTube]
        ));
        assert!(downloader.permits.is_some());
    }
}
