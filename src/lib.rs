//! Rulekeeper - per-chat rules for Telegram groups.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Rules store over MongoDB (or an in-memory collection)
//! - `cache` - Typed Moka caches
//! - `permissions` - Admin checking with caching
//! - `bot` - Dispatcher and polling/webhook runtime
//! - `plugins` - Command handlers
//! - `events` - Service message handlers (chat migration)

pub mod bot;
pub mod cache;
pub mod config;
pub mod database;
pub mod events;
pub mod permissions;
pub mod plugins;

pub use database::{ChatRules, RuleRecord, RulesError, RulesStore};
