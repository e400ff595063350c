//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod rules;
pub mod start;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Start the bot")]
    Start(String),

    #[command(description = "Show this help")]
    Help,

    #[command(description = "Show the group rules")]
    Rules,

    #[command(description = "Set the group rules (text or reply)")]
    Setrules,

    #[command(description = "Delete the group rules")]
    Clearrules,

    #[command(description = "Send rules in PM: on/off, toggles without argument")]
    Privaterules,

    #[command(description = "Rules statistics (bot owners only)")]
    Rulestats,
}

/// Build the combined command handler.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start(args)].endpoint(handle_start))
        .branch(case![Command::Help].endpoint(start::help_handler))
        .branch(case![Command::Rules].endpoint(rules::rules_command))
        .branch(case![Command::Setrules].endpoint(rules::setrules_command))
        .branch(case![Command::Clearrules].endpoint(rules::clearrules_command))
        .branch(case![Command::Privaterules].endpoint(rules::privaterules_command))
        .branch(case![Command::Rulestats].endpoint(rules::rulestats_command))
}

/// Handle /start command with optional deep link.
async fn handle_start(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    if let Some(chat_id_str) = args.trim().strip_prefix("rules_") {
        return rules::handle_rules_deeplink(bot, msg, state, chat_id_str).await;
    }

    start::start_handler(bot, msg).await
}
