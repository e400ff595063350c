//! Rules command handlers.
//!
//! Commands for setting and viewing group rules.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, ReplyParameters};
use tracing::info;
use url::Url;

use crate::bot::dispatcher::{AppState, ThrottledBot};

const GROUP_ONLY: &str = "This command only works in groups.";
const NONE_SET: &str = "This group has no rules set yet.";
const MISSING_PERMISSION: &str = "You need the 'Change group info' permission to do that.";
const SET_USAGE: &str = "Usage: /setrules <text>, or reply to a message with /setrules.";
const PRIVATE_USAGE: &str = "Usage: /privaterules [on|off]";
const PM_BUTTON: &str = "📜 Read the rules";

/// Handle /rules command - show group rules.
pub async fn rules_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let chat_id = msg.chat.id;

    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        reply(&bot, &msg, GROUP_ONLY).await?;
        return Ok(());
    }

    let chat = state.rules.open(chat_id.0).await?;

    if !chat.record().has_rules() {
        reply(&bot, &msg, NONE_SET).await?;
        return Ok(());
    }

    if chat.privrules() {
        let link: Url = deep_link(&state.bot_username, chat_id.0).parse()?;
        let keyboard =
            InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(PM_BUTTON, link)]]);

        bot.send_message(chat_id, "Click the button below to read the rules in PM.")
            .reply_markup(keyboard)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    } else {
        let title = msg.chat.title().unwrap_or("this group");

        bot.send_message(chat_id, format_rules(title, chat.rules()))
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(msg.id))
            .await?;
    }

    Ok(())
}

/// Handle /setrules command - set group rules.
pub async fn setrules_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    if !ensure_rules_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let Some(rules_text) = get_rules_text(&msg) else {
        reply(&bot, &msg, SET_USAGE).await?;
        return Ok(());
    };

    let mut chat = state.rules.open(msg.chat.id.0).await?;
    chat.set_rules(rules_text).await?;

    reply(&bot, &msg, "Rules updated.").await?;

    info!("Rules set in chat {}", msg.chat.id);
    Ok(())
}

/// Handle /clearrules command.
pub async fn clearrules_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    if !ensure_rules_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let text = if state.rules.clear(msg.chat.id.0).await? {
        "Rules cleared."
    } else {
        NONE_SET
    };

    reply(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /privaterules command - choose where rules are delivered.
///
/// Without arguments the current mode is toggled.
pub async fn privaterules_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    if !ensure_rules_admin(&bot, &msg, &state).await? {
        return Ok(());
    }

    let mut chat = state.rules.open(msg.chat.id.0).await?;

    let arg = msg.text().and_then(|t| t.split_whitespace().nth(1));
    let privrules = match arg {
        None => !chat.privrules(),
        Some(arg) => match parse_privacy_arg(arg) {
            Some(value) => value,
            None => {
                reply(&bot, &msg, PRIVATE_USAGE).await?;
                return Ok(());
            }
        },
    };

    chat.set_privrules(privrules).await?;

    let mode = if privrules {
        "Rules will be sent in PM."
    } else {
        "Rules will be posted in the group."
    };
    reply(&bot, &msg, mode).await?;

    Ok(())
}

/// Handle /rulestats command - aggregate counts for bot owners.
pub async fn rulestats_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
) -> anyhow::Result<()> {
    let is_owner = msg
        .from
        .as_ref()
        .is_some_and(|user| state.is_owner(user.id.0));
    if !is_owner {
        return Ok(());
    }

    let stats = state.rules.stats().await?;
    let text = format!(
        "Rules records: {}\nWith rules text: {}\nDelivered in PM: {}\nPosted in group: {}",
        stats.total, stats.with_rules, stats.private, stats.group
    );

    reply(&bot, &msg, &text).await?;
    Ok(())
}

/// Handle deep link for rules: /start rules_CHATID
pub async fn handle_rules_deeplink(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    chat_id_str: &str,
) -> anyhow::Result<()> {
    let private_chat_id = msg.chat.id;

    let Ok(group_chat_id) = chat_id_str.parse::<i64>() else {
        bot.send_message(private_chat_id, "That rules link is invalid.")
            .await?;
        return Ok(());
    };

    // Peek only: a stray link must not create a record
    let record = match state.rules.get(group_chat_id).await? {
        Some(record) if record.has_rules() => record,
        _ => {
            bot.send_message(private_chat_id, "That group has no rules set.")
                .await?;
            return Ok(());
        }
    };

    let group_name = match bot.get_chat(ChatId(group_chat_id)).await {
        Ok(chat) => chat.title().map(str::to_string).unwrap_or_else(|| "the group".to_string()),
        Err(_) => "the group".to_string(),
    };

    bot.send_message(private_chat_id, format_rules(&group_name, &record.rules))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}

/// Whether the sender may edit this chat's rules. Replies with the reason
/// when not.
async fn ensure_rules_admin(
    bot: &ThrottledBot,
    msg: &Message,
    state: &AppState,
) -> anyhow::Result<bool> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(false);
    };

    if !msg.chat.is_group() && !msg.chat.is_supergroup() {
        reply(bot, msg, GROUP_ONLY).await?;
        return Ok(false);
    }

    let allowed = state
        .permissions
        .can_change_info(msg.chat.id, user.id)
        .await
        .unwrap_or(false);

    if !allowed {
        reply(bot, msg, MISSING_PERMISSION).await?;
    }
    Ok(allowed)
}

async fn reply(bot: &ThrottledBot, msg: &Message, text: &str) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Get rules text from message (reply or args).
fn get_rules_text(msg: &Message) -> Option<String> {
    let replied = msg
        .reply_to_message()
        .and_then(|reply| reply.text().or_else(|| reply.caption()));

    rules_text(replied, msg.text())
}

/// Replied-to text wins over command arguments. Blank text counts as none,
/// so stored rules are either empty or visible.
fn rules_text(replied: Option<&str>, command: Option<&str>) -> Option<String> {
    if let Some(text) = replied
        && !text.trim().is_empty()
    {
        return Some(text.to_string());
    }

    command_args(command?).map(String::from)
}

/// Everything after the command word, trimmed.
fn command_args(text: &str) -> Option<&str> {
    text.split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .filter(|s| !s.is_empty())
}

fn parse_privacy_arg(arg: &str) -> Option<bool> {
    match arg.to_lowercase().as_str() {
        "on" | "yes" | "true" | "pm" => Some(true),
        "off" | "no" | "false" | "group" => Some(false),
        _ => None,
    }
}

fn deep_link(bot_username: &str, chat_id: i64) -> String {
    format!("https://t.me/{}?start=rules_{}", bot_username, chat_id)
}

/// Rules message body. The rules text is sent as-is so admins can use HTML.
fn format_rules(title: &str, rules: &str) -> String {
    format!("<b>Rules for {}:</b>\n\n{}", html_escape(title), rules)
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_args() {
        assert_eq!(command_args("/setrules  be nice \n"), Some("be nice"));
        assert_eq!(command_args("/setrules\n1. a\n2. b"), Some("1. a\n2. b"));
        assert_eq!(command_args("/setrules"), None);
        assert_eq!(command_args("/setrules   "), None);
    }

    #[test]
    fn test_rules_text_skips_blank_replies() {
        assert_eq!(
            rules_text(Some("1. be kind"), Some("/setrules")),
            Some("1. be kind".to_string())
        );
        assert_eq!(
            rules_text(Some("  \n "), Some("/setrules no ads")),
            Some("no ads".to_string())
        );
        assert_eq!(rules_text(Some("\t"), Some("/setrules")), None);
        assert_eq!(rules_text(None, None), None);
    }

    #[test]
    fn test_parse_privacy_arg() {
        assert_eq!(parse_privacy_arg("ON"), Some(true));
        assert_eq!(parse_privacy_arg("pm"), Some(true));
        assert_eq!(parse_privacy_arg("group"), Some(false));
        assert_eq!(parse_privacy_arg("maybe"), None);
    }

    #[test]
    fn test_deep_link_round_trips_through_start_payload() {
        let link = deep_link("rulebot", -1001234);
        assert_eq!(link, "https://t.me/rulebot?start=rules_-1001234");

        let payload = link.split("start=").nth(1).unwrap();
        let id: i64 = payload.strip_prefix("rules_").unwrap().parse().unwrap();
        assert_eq!(id, -1001234);
    }

    #[test]
    fn test_format_rules_escapes_title_only() {
        let text = format_rules("A & <B>", "<i>be nice</i>");
        assert_eq!(text, "<b>Rules for A &amp; &lt;B&gt;:</b>\n\n<i>be nice</i>");
    }
}
