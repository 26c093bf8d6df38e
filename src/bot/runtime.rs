//! Bot runtime - Polling and Webhook runners.

use axum::Router;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tracing::{error, info};

use super::dispatcher::{BotDispatcher, ThrottledBot};
use super::webhook;
use crate::api;
use crate::config::{BotMode, Config};

/// Run the bot with the configured mode until shutdown.
///
/// `api` is the optional HTTP API. In webhook mode it shares the webhook
/// server; in polling mode it gets a listener of its own.
pub async fn run(
    config: &Config,
    bot: ThrottledBot,
    dispatcher: BotDispatcher,
    api: Option<Router>,
) -> anyhow::Result<()> {
    match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            run_polling(config, bot, dispatcher, api).await;
            Ok(())
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            webhook::start_webhook(config, bot, dispatcher, api).await
        }
    }
}

async fn run_polling(config: &Config, bot: ThrottledBot, mut dispatcher: BotDispatcher, api: Option<Router>) {
    let api_server = api.map(|router| {
        let address = config.bind_address();
        tokio::spawn(async move {
            if let Err(e) = api::serve(address, router).await {
                error!("HTTP API stopped: {}", e);
            }
        })
    });

    // Updates that queued up while the bot was offline are skipped
    let listener = Polling::builder(bot).drop_pending_updates().build();

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    if let Some(server) = api_server {
        server.abort();
    }
}
