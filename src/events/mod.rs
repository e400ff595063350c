//! Event handlers for service messages.
//!
//! When Telegram upgrades a group to a supergroup the chat gets a new id;
//! the old group receives a "migrate to" notice and the stored rules follow
//! the chat to its new id.

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{debug, info};

use crate::bot::dispatcher::AppState;

/// Build the chat migration handler.
pub fn migration_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| msg.migrate_to_chat_id().is_some()).endpoint(handle_migration)
}

async fn handle_migration(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(new_chat_id) = msg.migrate_to_chat_id() else {
        return Ok(());
    };
    let (old_id, new_id) = (msg.chat.id.0, new_chat_id.0);

    match state.rules.migrate_chat(old_id, new_id).await {
        Ok(()) => info!("Chat {} migrated to {}, rules moved", old_id, new_id),
        // Chats that never touched the rules have nothing to move
        Err(e) if e.is_not_found() => debug!("Chat {} migrated without rules", old_id),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
