//! Configuration module.
//!
//! Loads configuration from environment variables. The binary loads
//! `.env` into the environment before calling [`Config::from_env`].

use std::env;
use std::time::Duration;

use anyhow::{bail, Context};

use crate::cache::CacheConfig;
use crate::database::RULES_COLLECTION;

/// Bot running mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

impl BotMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "webhook" => Self::Webhook,
            _ => Self::Polling,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Bot username (without @) for deep link construction.
    /// Optional - will be fetched via getMe if not set.
    pub bot_username: Option<String>,

    /// Owner user IDs (comma-separated)
    /// These users may run maintenance commands and bypass admin checks.
    pub owner_ids: Vec<u64>,

    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub rules_collection: String,

    /// Read-through cache for rules records. `None` disables it.
    pub rules_cache: Option<CacheConfig>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Fails if a required variable is missing or a value does not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let bot_mode = BotMode::parse(&env::var("BOT_MODE").unwrap_or_default());
        let webhook_url = env::var("WEBHOOK_URL").ok().filter(|s| !s.is_empty());

        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            bail!("WEBHOOK_URL must be set when BOT_MODE is webhook");
        }

        let webhook_port = match env::var("WEBHOOK_PORT") {
            Ok(port) => port
                .trim()
                .parse()
                .with_context(|| format!("invalid WEBHOOK_PORT: {port}"))?,
            Err(_) => 8080,
        };

        let rules_cache = parse_cache_config(
            env::var("RULES_CACHE_CAPACITY").ok().as_deref(),
            env::var("RULES_CACHE_TTL_SECS").ok().as_deref(),
        )?;

        Ok(Self {
            bot_token: env::var("BOT_TOKEN").context("BOT_TOKEN must be set")?,
            bot_mode,
            webhook_url,
            webhook_port,
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
            bot_username: env::var("BOT_USERNAME")
                .ok()
                .as_deref()
                .and_then(parse_username),
            owner_ids: parse_owner_ids(&env::var("OWNER_IDS").unwrap_or_default()),
            mongodb_uri: env::var("MONGODB_URI").context("MONGODB_URI must be set")?,
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "rulekeeper".to_string()),
            rules_collection: env::var("RULES_COLLECTION")
                .unwrap_or_else(|_| RULES_COLLECTION.to_string()),
            rules_cache,
        })
    }
}

/// Comma-separated user IDs; unparsable entries are skipped.
fn parse_owner_ids(raw: &str) -> Vec<u64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse::<u64>().ok())
        .collect()
}

/// Strip a leading `@`; empty names count as unset.
fn parse_username(raw: &str) -> Option<String> {
    let name = raw.trim().trim_start_matches('@');
    (!name.is_empty()).then(|| name.to_string())
}

/// Rules cache settings. Capacity `0` disables the cache.
fn parse_cache_config(
    capacity: Option<&str>,
    ttl_secs: Option<&str>,
) -> anyhow::Result<Option<CacheConfig>> {
    let mut config = CacheConfig::lazy_load();

    if let Some(raw) = capacity {
        config.max_capacity = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid RULES_CACHE_CAPACITY: {raw}"))?;
    }

    if let Some(raw) = ttl_secs {
        let secs: u64 = raw
            .trim()
            .parse()
            .with_context(|| format!("invalid RULES_CACHE_TTL_SECS: {raw}"))?;
        config = if secs == 0 {
            config.no_ttl()
        } else {
            config.ttl(Duration::from_secs(secs))
        };
    }

    Ok(config.is_enabled().then_some(config))
}
