use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::models::{Channel, DEFAULT_SITE_ORIGIN};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Immutable process configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Processed in this order on every run.
    pub channels: Vec<Channel>,
    pub check_interval_seconds: u64,
    pub site_origin: String,
    pub http: HttpConfig,
    pub telegram: TelegramConfig,
    pub seen_store: SeenStoreConfig,
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenStoreConfig {
    Upstash { url: String, token: String },
    Sqlite { path: String },
}

/// Flat view of the environment. `config::Environment` lowercases keys.
#[derive(Debug, Deserialize)]
struct Settings {
    regular_url: String,
    taxfree_url: String,
    telegram_bot_token: String,
    telegram_chat_id: String,
    upstash_redis_rest_url: String,
    upstash_redis_rest_token: String,

    #[serde(default = "default_check_interval")]
    check_interval_seconds: u64,
    #[serde(default = "default_timeout")]
    http_timeout_seconds: u64,
    #[serde(default = "default_user_agent")]
    user_agent: String,
    #[serde(default = "default_site_origin")]
    site_origin: String,
    #[serde(default = "default_telegram_api_url")]
    telegram_api_url: String,
    #[serde(default = "default_regular_seen_key")]
    regular_seen_key: String,
    #[serde(default = "default_taxfree_seen_key")]
    taxfree_seen_key: String,
    seen_store_path: Option<String>,
}

fn default_check_interval() -> u64 {
    300
}

fn default_timeout() -> u64 {
    25
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_site_origin() -> String {
    DEFAULT_SITE_ORIGIN.to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_regular_seen_key() -> String {
    "seen_regular".to_string()
}

fn default_taxfree_seen_key() -> String {
    "seen_taxfree".to_string()
}

impl Config {
    /// Reads the process environment. Fails if any required key is missing or invalid.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default())
            .build()
            .context("Failed to read environment")?;

        Self::from_settings(settings)
    }

    pub fn from_settings(settings: config::Config) -> Result<Self> {
        let s: Settings = settings
            .try_deserialize()
            .context("Missing or invalid configuration")?;

        for (name, value) in [
            ("TELEGRAM_BOT_TOKEN", &s.telegram_bot_token),
            ("TELEGRAM_CHAT_ID", &s.telegram_chat_id),
            ("UPSTASH_REDIS_REST_TOKEN", &s.upstash_redis_rest_token),
            ("REGULAR_SEEN_KEY", &s.regular_seen_key),
            ("TAXFREE_SEEN_KEY", &s.taxfree_seen_key),
        ] {
            if value.trim().is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        if s.regular_seen_key == s.taxfree_seen_key {
            bail!("REGULAR_SEEN_KEY and TAXFREE_SEEN_KEY must differ");
        }
        if s.check_interval_seconds == 0 {
            bail!("CHECK_INTERVAL_SECONDS must be greater than zero");
        }

        validate_url("REGULAR_URL", &s.regular_url)?;
        validate_url("TAXFREE_URL", &s.taxfree_url)?;
        validate_url("UPSTASH_REDIS_REST_URL", &s.upstash_redis_rest_url)?;
        validate_url("SITE_ORIGIN", &s.site_origin)?;
        validate_url("TELEGRAM_API_URL", &s.telegram_api_url)?;

        let seen_store = match s.seen_store_path {
            Some(path) if !path.trim().is_empty() => SeenStoreConfig::Sqlite { path },
            _ => SeenStoreConfig::Upstash {
                url: s.upstash_redis_rest_url,
                token: s.upstash_redis_rest_token,
            },
        };

        Ok(Config {
            channels: vec![
                Channel::tax_free(s.taxfree_url, s.taxfree_seen_key),
                Channel::regular(s.regular_url, s.regular_seen_key),
            ],
            check_interval_seconds: s.check_interval_seconds,
            site_origin: s.site_origin,
            http: HttpConfig {
                user_agent: s.user_agent,
                timeout_seconds: s.http_timeout_seconds,
            },
            telegram: TelegramConfig {
                api_url: s.telegram_api_url,
                bot_token: s.telegram_bot_token,
                chat_id: s.telegram_chat_id,
            },
            seen_store,
        })
    }
}

fn validate_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value).with_context(|| format!("{} is not a valid URL", name))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("{} must be an http(s) URL", name);
    }
    Ok(())
}
