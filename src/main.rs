//! vidfetch - Telegram video download bot
//!
//! Send a TikTok, Instagram or YouTube link, get the video back. Every user
//! has a daily download quota; delivered videos are removed from the chat
//! after a delay.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - MongoDB integration (quota and language per user)
//! - `cache` - Moka caches for read-mostly data
//! - `download` - Platform detection and retrieval strategies
//! - `delivery` - Sending videos and scheduled cleanup
//! - `bot` - Dispatcher and runtime (with Throttle for API rate limiting)
//! - `plugins` - Command, link and callback handlers
//! - `api` - Optional HTTP download endpoint
//! - `i18n` - Translations
//! - `utils` - Utility functions

mod api;
mod bot;
mod cache;
mod config;
mod database;
mod delivery;
mod download;
mod i18n;
mod plugins;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bot::AppState;
use cache::CacheRegistry;
use config::Config;
use database::{Database, UserRepo};
use delivery::CleanupScheduler;
use download::Downloader;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vidfetch=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting vidfetch bot...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");
    info!("Bot mode: {:?}", config.bot_mode);
    info!(
        "Daily limit: {} downloads, cleanup after {:?}",
        config.max_downloads_per_user, config.cleanup_delay
    );

    // Connect to MongoDB
    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;

    let cache = CacheRegistry::new();
    let users = Arc::new(UserRepo::new(&db, &cache, config.max_downloads_per_user));
    users.ensure_indexes().await?;
    info!("Database ready ({} caches)", cache.len());

    let downloader = Arc::new(Downloader::from_config(&config.download)?);
    info!("Download work directory: {}", config.download.work_dir.display());

    // Initialize bot with Throttle for automatic rate limiting
    // This respects Telegram's rate limits:
    // - 30 messages per second globally
    // - 1 message per second to the same chat
    // - 20 messages per minute to the same group
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{}", me.username());

    let cleanup = CleanupScheduler::new();
    let state = AppState::new(users, Arc::clone(&downloader), cleanup.clone(), config.cleanup_delay);
    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    let api = config.api_enabled.then(|| api::router(Arc::clone(&downloader)));

    bot::run(&config, bot, dispatcher, api).await?;

    let pending = cleanup.pending();
    if pending > 0 {
        warn!("Shutting down with {} scheduled message deletions pending; they will not run", pending);
    }
    info!("Bye");

    Ok(())
}
