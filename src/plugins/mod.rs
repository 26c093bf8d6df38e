//! Plugin system for command, link and callback handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()` or `callback_handler()`

pub mod download;
pub mod settings;
pub mod start;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::delivery::DOWNLOAD_MORE;
use crate::utils::contains_url;

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start,

    #[command(description = "How to use the bot")]
    Help,

    #[command(description = "Choose the interface language")]
    Lang,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start::start_command))
        .branch(case![Command::Help].endpoint(start::help_command))
        .branch(case![Command::Lang].endpoint(settings::lang_command))
}

/// Build the handler for messages carrying a link.
pub fn url_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.text().is_some_and(contains_url))
        .endpoint(download::download_handler)
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query()
        .branch(
            dptree::filter(|q: CallbackQuery| {
                q.data.as_deref().is_some_and(|d| d.starts_with(settings::LANG_PREFIX))
            })
            .endpoint(settings::lang_callback),
        )
        .branch(
            dptree::filter(|q: CallbackQuery| q.data.as_deref() == Some(DOWNLOAD_MORE))
                .endpoint(download::download_more_callback),
        )
}
