//! /start and /help command plugin.

use teloxide::prelude::*;
use teloxide::types::ParseMode;

use super::settings::language_keyboard;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::delivery::delay_minutes;
use crate::download::Platform;
use crate::i18n::{format_text, get_text};

/// Handle the /start command: greeting plus the language picker.
pub async fn start_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let lang = state.language_for(msg.from.as_ref()).await;

    let text = format!(
        "{}\n\n{}",
        get_text(lang, "start.greeting"),
        get_text(lang, "start.choose_language")
    );

    bot.send_message(msg.chat.id, text)
        .reply_markup(language_keyboard())
        .await?;

    Ok(())
}

/// Handle the /help command.
pub async fn help_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let lang = state.language_for(msg.from.as_ref()).await;

    let platforms = Platform::ALL
        .iter()
        .map(|p| p.display_name())
        .collect::<Vec<_>>()
        .join(", ");
    let max = state.users.max_downloads().to_string();
    let minutes = delay_minutes(state.cleanup_delay).to_string();

    let text = format_text(
        lang,
        "help.text",
        &[("platforms", &platforms), ("max", &max), ("minutes", &minutes)],
    );

    bot.send_message(msg.chat.id, text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}
