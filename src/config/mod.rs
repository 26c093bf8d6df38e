//! Configuration module for vidfetch.
//!
//! Loads configuration from environment variables.

use std::collections::HashMap;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::download::{Platform, StrategyKind};

/// Default vendor API host (RapidAPI TikTok downloader).
pub const DEFAULT_RAPIDAPI_HOST: &str = "tiktok-video-no-watermark2.p.rapidapi.com";

/// Bot running mode
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    Polling,
    Webhook,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Settings for the download strategies.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Parent directory for per-request work directories.
    pub work_dir: PathBuf,
    /// yt-dlp executable.
    pub yt_dlp_path: String,
    /// Scraping tool executable (gallery-dl).
    pub scraper_path: String,
    /// Cookie jar passed to the extractor for platforms that need a login.
    pub cookie_file: Option<PathBuf>,
    pub rapidapi_key: Option<String>,
    pub rapidapi_host: String,
    /// Wall clock limit for a single retrieval.
    pub timeout: Duration,
    /// Global retrieval limit. `0` means unbounded.
    pub max_parallel: usize,
    /// Which strategy serves which platform.
    pub routes: HashMap<Platform, StrategyKind>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_path: String,
    pub webhook_secret: Option<String>,

    // HTTP server
    pub host: IpAddr,
    pub port: u16,
    /// Expose `GET /download` next to the bot.
    pub api_enabled: bool,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,

    /// Daily download ceiling per user.
    pub max_downloads_per_user: u32,
    /// Delay before a delivered video is deleted from the chat.
    pub cleanup_delay: Duration,

    pub download: DownloadConfig,
}

impl Config {
    /// Load configuration from environment variables (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let webhook_url = var("WEBHOOK_URL");

        // Webhook is implied by a configured URL unless BOT_MODE says otherwise
        let bot_mode = match var("BOT_MODE").map(|m| m.to_lowercase()).as_deref() {
            Some("webhook") => BotMode::Webhook,
            Some("polling") => BotMode::Polling,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "BOT_MODE",
                    value: other.to_string(),
                    reason: "expected `polling` or `webhook`".to_string(),
                });
            }
            None if webhook_url.is_some() => BotMode::Webhook,
            None => BotMode::Polling,
        };

        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }

        let mut webhook_path = var("WEBHOOK_PATH").unwrap_or_else(|| "/webhook".to_string());
        if !webhook_path.starts_with('/') {
            webhook_path.insert(0, '/');
        }

        let routes = parse_routes(&var)?;

        let rapidapi_key = var("RAPIDAPI_KEY");
        if rapidapi_key.is_none() && routes.values().any(|kind| *kind == StrategyKind::VendorApi) {
            return Err(ConfigError::Missing("RAPIDAPI_KEY"));
        }

        let download = DownloadConfig {
            work_dir: var("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or_else(env::temp_dir),
            yt_dlp_path: var("YT_DLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            scraper_path: var("SCRAPER_PATH").unwrap_or_else(|| "gallery-dl".to_string()),
            cookie_file: var("COOKIE_FILE_PATH").map(PathBuf::from),
            rapidapi_key,
            rapidapi_host: var("RAPIDAPI_HOST").unwrap_or_else(|| DEFAULT_RAPIDAPI_HOST.to_string()),
            timeout: Duration::from_secs(parse_or("DOWNLOAD_TIMEOUT_SECS", var("DOWNLOAD_TIMEOUT_SECS"), 300)?),
            max_parallel: parse_or("MAX_PARALLEL_DOWNLOADS", var("MAX_PARALLEL_DOWNLOADS"), 0)?,
            routes,
        };

        Ok(Self {
            bot_token: var("BOT_TOKEN").ok_or(ConfigError::Missing("BOT_TOKEN"))?,
            bot_mode,
            webhook_url,
            webhook_path,
            webhook_secret: var("WEBHOOK_SECRET"),
            host: parse_or("HOST", var("HOST"), IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or("PORT", var("PORT"), 8443)?,
            api_enabled: parse_bool("API_ENABLED", var("API_ENABLED"))?,
            mongodb_uri: var("MONGODB_URI").ok_or(ConfigError::Missing("MONGODB_URI"))?,
            mongodb_database: var("MONGODB_DATABASE").unwrap_or_else(|| "vidfetch".to_string()),
            max_downloads_per_user: parse_or(
                "MAX_DOWNLOADS_PER_USER",
                var("MAX_DOWNLOADS_PER_USER"),
                10,
            )?,
            cleanup_delay: Duration::from_secs(parse_or("CLEANUP_DELAY_SECS", var("CLEANUP_DELAY_SECS"), 300)?),
            download,
        })
    }

    /// Address the HTTP server binds to.
    pub fn bind_address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Full public webhook URL (base URL + path).
    pub fn full_webhook_url(&self) -> Option<String> {
        self.webhook_url
            .as_ref()
            .map(|base| format!("{}{}", base.trim_end_matches('/'), self.webhook_path))
    }
}

/// Default platform -> strategy routes, overridable with `<PLATFORM>_STRATEGY`.
fn parse_routes<F>(var: &F) -> Result<HashMap<Platform, StrategyKind>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = [
        (Platform::TikTok, "TIKTOK_STRATEGY", StrategyKind::VendorApi),
        (Platform::Instagram, "INSTAGRAM_STRATEGY", StrategyKind::Extractor),
        (Platform::YouTube, "YOUTUBE_STRATEGY", StrategyKind::Extractor),
    ];

    let mut routes = HashMap::with_capacity(defaults.len());
    for (platform, name, default) in defaults {
        let kind = match var(name) {
            Some(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                name,
                value,
                reason,
            })?,
            None => default,
        };
        routes.insert(platform, kind);
    }
    Ok(routes)
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("0" | "false" | "no" | "off") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some(other) => Err(ConfigError::Invalid {
            name,
            value: other.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
