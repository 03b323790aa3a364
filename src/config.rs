//! # Bot Configuration Module
//!
//! Startup configuration read from the environment (optionally seeded from a
//! `.env` file). Parsing goes through a lookup closure so it can be tested
//! without touching the process environment.

use anyhow::{bail, Context, Result};

/// Default SQLite location, relative to the working directory
pub const DEFAULT_DATABASE_URL: &str = "sqlite:data/bot.db";

/// Output format of the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Runtime configuration shared with every handler
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// sqlx connection string for the SQLite store
    pub database_url: String,
    /// Admin ids provisioned into the `admins` table at startup
    pub admin_ids: Vec<i64>,
    /// Whether `/new` is restricted to admins
    pub admin_only_polls: bool,
    pub log_format: LogFormat,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_ids: Vec::new(),
            admin_only_polls: true,
            log_format: LogFormat::Text,
        }
    }
}

impl BotConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .or_else(|| lookup("BOT_TOKEN"))
            .filter(|token| !token.trim().is_empty())
            .context("TELEGRAM_BOT_TOKEN (or BOT_TOKEN) must be set")?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let admin_ids = match lookup("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw)?,
            None => Vec::new(),
        };

        let admin_only_polls = match lookup("ADMIN_ONLY_POLLS") {
            Some(raw) => parse_flag(&raw).context("ADMIN_ONLY_POLLS must be a boolean")?,
            None => true,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            None | Some("") | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("LOG_FORMAT must be 'text' or 'json', got '{other}'"),
        };

        Ok(Self {
            bot_token,
            database_url,
            admin_ids,
            admin_only_polls,
            log_format,
        })
    }
}

/// Parse a comma separated list of numeric Telegram ids
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .with_context(|| format!("Invalid admin id in ADMIN_IDS: '{part}'"))
        })
        .collect()
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognized boolean '{other}'"),
    }
}
