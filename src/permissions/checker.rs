//! Permission checker with caching.

use teloxide::prelude::*;
use teloxide::types::{ChatId, ChatMember, ChatMemberKind, UserId};
use tracing::debug;

use crate::cache::{CacheConfig, TypedCache};

/// What an admin may do, as far as rules commands care.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminInfo {
    pub is_owner: bool,
    pub can_change_info: bool,
}

impl AdminInfo {
    /// Create AdminInfo from a ChatMember.
    fn from_chat_member(member: &ChatMember) -> Option<Self> {
        match &member.kind {
            ChatMemberKind::Owner(_) => Some(Self {
                is_owner: true,
                can_change_info: true,
            }),
            ChatMemberKind::Administrator(admin) => Some(Self {
                is_owner: false,
                can_change_info: admin.can_change_info,
            }),
            _ => None,
        }
    }
}

/// Cache key for admin lookups.
type AdminCacheKey = (i64, u64); // (chat_id, user_id)

/// Permission checker with caching support.
#[derive(Clone)]
pub struct Permissions {
    bot: Bot,
    cache: TypedCache<AdminCacheKey, Option<AdminInfo>>,
    owner_ids: Vec<u64>,
}

impl Permissions {
    /// Create a new permission checker with bot owner IDs.
    pub fn with_owners(bot: Bot, owner_ids: Vec<u64>) -> Self {
        let cache = TypedCache::new("admin_permissions", &CacheConfig::admin_lookups());
        Self {
            bot,
            cache,
            owner_ids,
        }
    }

    /// Check if a user is a bot owner.
    #[inline]
    pub fn is_bot_owner(&self, user_id: UserId) -> bool {
        self.owner_ids.contains(&user_id.0)
    }

    /// Admin info for a user in a chat, `None` for regular members.
    async fn get_admin_info(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<Option<AdminInfo>> {
        let cache_key = (chat_id.0, user_id.0);

        if let Some(cached) = self.cache.get(&cache_key) {
            debug!("Admin cache hit for user {} in chat {}", user_id, chat_id);
            return Ok(cached);
        }

        let member = self.bot.get_chat_member(chat_id, user_id).await?;
        let result = AdminInfo::from_chat_member(&member);

        // Cache the result (including None for non-admins)
        self.cache.insert(cache_key, result.clone());

        Ok(result)
    }

    /// Check if a user can change group info (and so edit the rules).
    /// Bot owners always return true.
    pub async fn can_change_info(
        &self,
        chat_id: ChatId,
        user_id: UserId,
    ) -> anyhow::Result<bool> {
        if self.is_bot_owner(user_id) {
            return Ok(true);
        }
        Ok(self
            .get_admin_info(chat_id, user_id)
            .await?
            .is_some_and(|a| a.is_owner || a.can_change_info))
    }
}
