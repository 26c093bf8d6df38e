//! Webhook mode implementation for the bot.
//!
//! Uses teloxide's axum webhook support to:
//! - Call `setWebhook` on Telegram
//! - Build the axum router receiving updates, merged with the HTTP API
//! - Call `deleteWebhook` on shutdown

use anyhow::Context;
use axum::Router;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::{error, info};
use url::Url;

use super::dispatcher::{BotDispatcher, ThrottledBot};
use crate::config::Config;

/// Start the bot in webhook mode.
///
/// On shutdown (Ctrl+C), the webhook is deleted and the HTTP server stops.
pub async fn start_webhook(
    config: &Config,
    bot: ThrottledBot,
    mut dispatcher: BotDispatcher,
    api: Option<Router>,
) -> anyhow::Result<()> {
    let webhook_url = config
        .full_webhook_url()
        .context("WEBHOOK_URL must be set when using webhook mode")?;
    let url = Url::parse(&webhook_url).with_context(|| format!("Invalid webhook URL: {webhook_url}"))?;

    let address = config.bind_address();
    let mut options = Options::new(address, url.clone());

    // Telegram echoes the secret in every request header
    if let Some(ref secret) = config.webhook_secret {
        options = options.secret_token(secret.clone());
        info!("Webhook secret token configured");
    }

    info!("🔗 Setting webhook URL: {}", url);

    // The webhook only needs basic API access, not the throttled adaptor
    let (listener, stop_flag, router) = webhooks::axum_to_router(bot.inner().clone(), options)
        .await
        .context("Failed to set up webhook")?;

    let app = match api {
        Some(api) => {
            info!("HTTP API mounted on the webhook server");
            router.merge(api)
        }
        None => router,
    };

    let tcp = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("📡 Listening on: {}", address);

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(tcp, app).with_graceful_shutdown(stop_flag).await {
            error!("Webhook server error: {}", e);
        }
    });

    info!("✅ Webhook setup complete, waiting for updates...");

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    if let Err(e) = server.await {
        error!("Webhook server task failed: {}", e);
    }

    Ok(())
}
