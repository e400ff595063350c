//! Message dispatcher setup.
//!
//! Builds the dispatcher with the rules commands and the chat migration
//! handler.

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::database::RulesStore;
use crate::events;
use crate::permissions::Permissions;
use crate::plugins;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Per-chat rules storage.
    pub rules: RulesStore,

    /// Permission checker with admin caching.
    pub permissions: Permissions,

    /// Owner user IDs (bypass all restrictions).
    pub owner_ids: Vec<u64>,

    /// Bot username (without @) for deep link construction.
    pub bot_username: String,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        bot: &ThrottledBot,
        rules: RulesStore,
        owner_ids: Vec<u64>,
        bot_username: String,
    ) -> Self {
        // Permissions needs the inner Bot for API calls
        let permissions = Permissions::with_owners(bot.inner().clone(), owner_ids.clone());

        Self {
            rules,
            permissions,
            owner_ids,
            bot_username,
        }
    }

    /// Check if a user is a bot owner.
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.owner_ids.contains(&user_id)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    rules: RulesStore,
    owner_ids: Vec<u64>,
    bot_username: String,
) -> Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey> {
    let state = AppState::new(&bot, rules, owner_ids, bot_username);

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    // Service messages first: a migration notice is never a command
    let message_handler = Update::filter_message()
        .branch(events::migration_handler())
        .branch(plugins::command_handler());

    dptree::entry().branch(message_handler)
}
