//! Message dispatcher setup.
//!
//! Builds the dispatcher with all command, link and callback handlers.

use std::sync::Arc;
use std::time::Duration;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::User;
use tracing::warn;

use crate::delivery::CleanupScheduler;
use crate::download::Downloader;
use crate::database::UserRepo;
use crate::i18n::{self, Language};
use crate::plugins;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Dispatcher type used throughout the bot.
pub type BotDispatcher = Dispatcher<ThrottledBot, anyhow::Error, DefaultKey>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Quota and language store.
    pub users: Arc<UserRepo>,

    /// Platform -> strategy router.
    pub downloader: Arc<Downloader>,

    /// Pending deletions of delivered videos.
    pub cleanup: CleanupScheduler,

    /// How long a delivered video stays in the chat.
    pub cleanup_delay: Duration,
}

impl AppState {
    pub fn new(
        users: Arc<UserRepo>,
        downloader: Arc<Downloader>,
        cleanup: CleanupScheduler,
        cleanup_delay: Duration,
    ) -> Self {
        Self {
            users,
            downloader,
            cleanup,
            cleanup_delay,
        }
    }

    /// Effective language for `user`.
    ///
    /// A failing lookup falls back to the client language instead of
    /// failing the update.
    pub async fn language_for(&self, user: Option<&User>) -> Language {
        let Some(user) = user else {
            return Language::default();
        };

        let stored = match self.users.language(user.id.0).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Language lookup for {} failed: {}", user.id, e);
                None
            }
        };

        i18n::resolve(stored, user.language_code.as_deref())
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(bot: ThrottledBot, state: AppState) -> BotDispatcher {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    // Commands first so `/start https://...` is not taken as a link
    let message_handler = Update::filter_message()
        .branch(plugins::command_handler())
        .branch(plugins::url_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(plugins::callback_handler())
}
