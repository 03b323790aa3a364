use anyhow::Result;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pollbot::config::{BotConfig, LogFormat};
use pollbot::dialogue::PollDialogueState;
use pollbot::ledger::VoteLedger;
use pollbot::registry::PollRegistry;
use pollbot::{bot, db, localization};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from the environment and .env file
    let config = BotConfig::from_env()?;

    // Initialize logging
    init_tracing(config.log_format);

    info!("Starting Poll Telegram Bot");

    localization::init_localization()?;

    info!(database_url = %config.database_url, "Initializing database");
    let pool = db::connect(&config.database_url).await?;

    for admin_id in &config.admin_ids {
        if db::add_admin(&pool, *admin_id).await? {
            info!(admin_id, "Provisioned bot administrator");
        }
    }

    let registry = PollRegistry::new(pool.clone(), config.admin_only_polls);
    let ledger = VoteLedger::new(pool);

    // Initialize the bot
    let bot = Bot::new(config.bot_token.clone());

    info!(
        admin_only_polls = config.admin_only_polls,
        "Bot initialized, starting dispatcher"
    );

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![
            InMemStorage::<PollDialogueState>::new(),
            registry,
            ledger
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
