//! Download plugin - the link-to-video flow.
//!
//! detect platform -> admit against the daily quota -> status message ->
//! fetch -> deliver. Unsupported links are rejected before the quota is
//! touched.

use teloxide::prelude::*;
use teloxide::types::ReplyParameters;
use tracing::{debug, info};

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::delivery;
use crate::download::{detect, Platform};
use crate::i18n::{format_text, get_text};
use crate::utils::{extract_url, format_username};

/// First link in `text` and its platform, `None` for unsupported links.
pub fn parse_request(text: &str) -> Option<(&str, Option<Platform>)> {
    extract_url(text).map(|url| (url, detect(url)))
}

/// Handle a message containing a link.
pub async fn download_handler(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some((url, platform)) = msg.text().and_then(parse_request) else {
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let chat_id = msg.chat.id;
    let lang = state.language_for(Some(user)).await;

    let Some(platform) = platform else {
        debug!("Unsupported link from {}: {}", user.id, url);
        bot.send_message(chat_id, get_text(lang, "download.unsupported"))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    };

    let decision = state.users.admit(user.id.0).await?;
    if !decision.is_admitted() {
        info!("Quota exhausted for {}", user.id);
        let max = state.users.max_downloads().to_string();
        bot.send_message(chat_id, format_text(lang, "download.limit", &[("max", max.as_str())]))
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
        return Ok(());
    }

    info!(
        "Download request from {} ({}): {} [{}] {:?}",
        format_username(user.username.as_deref(), &user.first_name),
        user.id,
        url,
        platform,
        decision
    );

    let status = bot.send_message(chat_id, get_text(lang, "download.status")).await?;

    let result = match state.downloader.fetch(url, platform).await {
        Some(media) => {
            delivery::deliver(&bot, chat_id, media, lang, &state.cleanup, state.cleanup_delay).await
        }
        None => bot
            .send_message(chat_id, get_text(lang, "download.failed"))
            .await
            .map(|_| ())
            .map_err(Into::into),
    };

    if let Err(e) = bot.delete_message(chat_id, status.id).await {
        debug!("Could not remove status message in chat {}: {}", chat_id.0, e);
    }

    result
}

/// Handle the "download again" button.
pub async fn download_more_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    bot.answer_callback_query(&q.id).await?;

    let lang = state.language_for(Some(&q.from)).await;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));

    bot.send_message(chat_id, get_text(lang, "download.more_prompt")).await?;

    Ok(())
}
