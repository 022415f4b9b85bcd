//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use crate::errors::{MarketError, Result};

/// Discord channels the review workflow posts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    /// Moderator queue; every submitted post lands here first.
    pub review: u64,
    /// Public channel for approved `hiring` posts.
    pub hiring: u64,
    /// Public channel for approved `for_hire` posts.
    pub for_hire: u64,
    /// Audit trail of approvals and rejections.
    pub log: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database location (e.g. `sqlite:./marketplace.db`)
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Bot token; the Discord front-end is skipped when absent
    pub discord_token: Option<String>,
    /// Register the `/post` command for this guild only
    pub discord_guild_id: Option<u64>,
    pub channels: ChannelMap,
    /// How long a draft may sit untouched before it is evicted
    pub draft_ttl_secs: u64,
    /// How often (in seconds) to sweep abandoned drafts
    pub draft_sweep_interval_secs: u64,
    /// Give approved posts without reviews a sample review at start-up
    pub seed_sample_reviews: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./marketplace.db".to_string()),
            api_port: parse_or("API_PORT", 5000)?,
            discord_token: env_var("DISCORD_TOKEN").ok().filter(|t| !t.is_empty()),
            discord_guild_id: match env_var("DISCORD_GUILD_ID") {
                Ok(raw) if !raw.is_empty() => Some(parse_value("DISCORD_GUILD_ID", &raw)?),
                _ => None,
            },
            channels: ChannelMap {
                review: parse_or("REVIEW_CHANNEL_ID", 1_456_382_405_329_031_260)?,
                hiring: parse_or("HIRING_CHANNEL_ID", 1_456_382_266_522_734_738)?,
                for_hire: parse_or("FOR_HIRE_CHANNEL_ID", 1_456_382_344_138_068_151)?,
                log: parse_or("LOG_CHANNEL_ID", 1_456_634_149_422_239_868)?,
            },
            draft_ttl_secs: parse_or("DRAFT_TTL_SECS", 3600)?,
            draft_sweep_interval_secs: parse_or("DRAFT_SWEEP_INTERVAL_SECS", 60)?,
            seed_sample_reviews: parse_or("SEED_SAMPLE_REVIEWS", false)?,
        })
    }

    pub fn draft_ttl(&self) -> Duration {
        Duration::from_secs(self.draft_ttl_secs)
    }

    pub fn draft_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.draft_sweep_interval_secs.max(1))
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| MarketError::Config(format!("Missing env var: {key}")))
}

fn parse_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| MarketError::Config(format!("Invalid {key}")))
}
