// Application configuration, loaded from environment variables and CLI flags.

use std::time::Duration;

use crate::users::UpsertPolicy;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Maximum pooled database connections.
    pub db_max_connections: u32,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Telegram bot token used to verify login widget signatures.
    /// `None` disables signature verification entirely.
    pub telegram_bot_token: Option<String>,
    /// How Roblox logins find-or-create their user record.
    pub roblox_upsert_policy: UpsertPolicy,
    /// Base URL of the public Roblox games API.
    pub roblox_games_api: String,
    /// Timeout for a single Roblox games API lookup.
    pub roblox_api_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:arena.db?mode=rwc".to_string(),
            db_max_connections: 5,
            port: 3000,
            telegram_bot_token: None,
            roblox_upsert_policy: UpsertPolicy::Conflict,
            roblox_games_api: "https://games.roblox.com".to_string(),
            roblox_api_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:arena.db?mode=rwc`)
    /// - `DB_MAX_CONNECTIONS` - pool size (default: 5)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `TELEGRAM_BOT_TOKEN` - shared secret for Telegram login; unset or empty
    ///   disables signature verification
    /// - `ROBLOX_UPSERT_POLICY` - `conflict` (default) or `check_then_act`
    /// - `ROBLOX_GAMES_API` - games API base URL (default: `https://games.roblox.com`)
    /// - `ROBLOX_API_TIMEOUT_SECS` - games API timeout (default: 5)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from CLI arguments and an environment lookup.
    pub fn from_sources<F>(args: &[String], env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = env("DATABASE_URL").unwrap_or(defaults.database_url);

        let db_max_connections = match env("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("DB_MAX_CONNECTIONS", v))?,
            None => defaults.db_max_connections,
        };

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = match Self::parse_cli_value(args, "--port").or_else(|| env("PORT")) {
            Some(v) => v.parse().map_err(|_| ConfigError::Invalid("PORT", v))?,
            None => defaults.port,
        };

        let telegram_bot_token = env("TELEGRAM_BOT_TOKEN").filter(|t| !t.is_empty());

        let roblox_upsert_policy = match env("ROBLOX_UPSERT_POLICY") {
            Some(v) => UpsertPolicy::from_str_name(&v)
                .ok_or(ConfigError::Invalid("ROBLOX_UPSERT_POLICY", v))?,
            None => defaults.roblox_upsert_policy,
        };

        let roblox_games_api = env("ROBLOX_GAMES_API")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.roblox_games_api);

        let roblox_api_timeout = match env("ROBLOX_API_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .map_err(|_| ConfigError::Invalid("ROBLOX_API_TIMEOUT_SECS", v))?,
            ),
            None => defaults.roblox_api_timeout,
        };

        Ok(Config {
            database_url,
            db_max_connections,
            port,
            telegram_bot_token,
            roblox_upsert_policy,
            roblox_games_api,
            roblox_api_timeout,
        })
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
