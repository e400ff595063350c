//! /start and /help command plugin.

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use super::Command;
use crate::bot::dispatcher::ThrottledBot;

const GREETING: &str = "Hi! I keep the rules of your group.\n\n\
Add me to a group, then an admin can use /setrules to set them. \
Members read them with /rules.\n\nUse /help to see all commands.";

/// Handle the /start command.
pub async fn start_handler(bot: ThrottledBot, msg: Message) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, GREETING).await?;
    Ok(())
}

/// Handle the /help command.
pub async fn help_handler(bot: ThrottledBot, msg: Message) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}
