//! Settings plugin.
//!
//! Language selection through /lang and the inline language keyboard.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::i18n::{get_text, Language};

/// Callback data prefix for language buttons (`lang:<code>`).
pub const LANG_PREFIX: &str = "lang:";

/// One button per supported language.
pub fn language_keyboard() -> InlineKeyboardMarkup {
    let buttons = Language::ALL
        .into_iter()
        .map(|lang| InlineKeyboardButton::callback(lang.label(), format!("{LANG_PREFIX}{}", lang.code())))
        .collect::<Vec<_>>();

    InlineKeyboardMarkup::new(vec![buttons])
}

/// Language named by a `lang:<code>` callback.
pub fn parse_lang_callback(data: &str) -> Option<Language> {
    data.strip_prefix(LANG_PREFIX).and_then(Language::from_code)
}

/// Handle the /lang command.
pub async fn lang_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let lang = state.language_for(msg.from.as_ref()).await;

    bot.send_message(msg.chat.id, get_text(lang, "start.choose_language"))
        .reply_markup(language_keyboard())
        .await?;

    Ok(())
}

/// Handle a language button press.
pub async fn lang_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let Some(lang) = q.data.as_deref().and_then(parse_lang_callback) else {
        bot.answer_callback_query(&q.id).await?;
        return Ok(());
    };

    state.users.set_language(q.from.id.0, lang).await?;
    debug!("User {} picked language {}", q.from.id, lang);

    let confirmation = get_text(lang, "lang.set");
    bot.answer_callback_query(&q.id).text(confirmation.clone()).await?;

    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id)
        .unwrap_or_else(|| ChatId::from(q.from.id));
    bot.send_message(chat_id, confirmation).await?;

    Ok(())
}
