//! Configuration types.

use std::collections::HashMap;
use std::path::Path;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Link shown under every confirmation when `SITE_URL` is unset.
pub const DEFAULT_SITE_URL: &str = "https://designeryas.com";

/// Optional file of `KEY=value` lines read at startup.
pub const DOTENV_FILE: &str = ".env";

/// Which transport the bot talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Telegram Bot API long-polling.
    Telegram,
    /// Local stdin/stdout REPL.
    Cli,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "LEAD_BOT_CHANNEL".into(),
                message: format!("expected 'telegram' or 'cli', got '{other}'"),
            }),
        }
    }
}

/// Bot configuration, read once at startup.
#[derive(Debug)]
pub struct BotConfig {
    pub channel: ChannelKind,
    /// Bot API token. Required for the Telegram channel.
    pub telegram_token: Option<SecretString>,
    /// Telegram usernames or numeric ids allowed to talk to the bot (`*` = everyone).
    pub allowed_users: Vec<String>,
    /// Link attached to confirmations.
    pub site_url: String,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl BotConfig {
    /// Read configuration from the process environment, falling back to a
    /// `.env` file in the working directory for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file_vars = read_dotenv(Path::new(DOTENV_FILE));
        Self::from_lookup(layered(|key| std::env::var(key).ok(), &file_vars))
    }

    /// Read configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let channel = match non_empty("LEAD_BOT_CHANNEL") {
            Some(value) => value.parse()?,
            None => ChannelKind::Telegram,
        };

        let telegram_token = non_empty("TELEGRAM_BOT_TOKEN").map(SecretString::from);
        if channel == ChannelKind::Telegram && telegram_token.is_none() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()));
        }

        let allowed_users: Vec<String> = non_empty("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let site_url = non_empty("SITE_URL").unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
        if !(site_url.starts_with("https://") || site_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "SITE_URL".into(),
                message: format!("'{site_url}' is not an http(s) URL"),
            });
        }

        let log_level = non_empty("LOG_LEVEL")
            .map(|level| level.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        Ok(Self {
            channel,
            telegram_token,
            allowed_users,
            site_url,
            log_level,
        })
    }
}

/// Parse a dotenv file. A missing or unreadable file yields no variables;
/// malformed lines are skipped.
fn read_dotenv(path: &Path) -> HashMap<String, String> {
    match dotenvy::from_path_iter(path) {
        Ok(iter) => iter.filter_map(Result::ok).collect(),
        Err(_) => HashMap::new(),
    }
}

/// Look up in `env` first, then in `file_vars`.
fn layered<'a>(
    env: impl Fn(&str) -> Option<String> + 'a,
    file_vars: &'a HashMap<String, String>,
) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| env(key).or_else(|| file_vars.get(key).cloned())
}
