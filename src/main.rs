//! Rulekeeper bot binary.
//!
//! `rulekeeper` runs the bot; `rulekeeper export` prints every stored rules
//! record as JSON and exits.

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rulekeeper::bot;
use rulekeeper::config::Config;
use rulekeeper::database::{Database, RulesStore};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rulekeeper=info,teloxide=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    info!("Starting Rulekeeper...");

    let config = Config::from_env()?;
    info!("Configuration loaded successfully");

    info!("Connecting to MongoDB...");
    let db = Database::connect(&config.mongodb_uri, &config.mongodb_database).await?;

    // Runs the repair pass before anything reads the records
    let rules = RulesStore::connect(&db, &config.rules_collection, config.rules_cache.clone()).await?;
    info!("Rules store ready (collection '{}')", config.rules_collection);

    if std::env::args().nth(1).as_deref() == Some("export") {
        let records = rules.load_all().await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
        info!("Exported {} rules record(s)", records.len());
        return Ok(());
    }

    info!("Bot mode: {:?}", config.bot_mode);

    // Throttle keeps us within Telegram's per-chat and global rate limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    let bot_username = config
        .bot_username
        .clone()
        .unwrap_or_else(|| me.username().to_string());
    info!("Using bot username: @{}", bot_username);

    if config.owner_ids.is_empty() {
        info!("No owner IDs configured (OWNER_IDS is empty)");
    } else {
        info!("Bot owners: {:?}", config.owner_ids);
    }

    let dispatcher = bot::build_dispatcher(bot.clone(), rules, config.owner_ids.clone(), bot_username);

    bot::run(&config, dispatcher, bot).await
}
