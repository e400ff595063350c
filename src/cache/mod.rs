//! Cache module - typed in-process caches backed by Moka.
//!
//! The rules store keeps a read-through cache of records keyed by chat id,
//! and the bot keeps chat-member lookups for permission checks.
//!
//! ```rust,ignore
//! let records: TypedCache<i64, RuleRecord> =
//!     TypedCache::new("rules", CacheConfig::lazy_load());
//!
//! records.insert(chat_id, record);
//! let record = records.get(&chat_id);
//! ```

mod config;
mod typed;

pub use config::CacheConfig;
pub use typed::TypedCache;
