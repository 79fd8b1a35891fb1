// Roblox games API client: live player counts for VIP server listings.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::config::Config;
use crate::metrics;

pub const DEFAULT_ONLINE_PLAYERS: i64 = 0;
pub const DEFAULT_MAX_PLAYERS: i64 = 50;

/// Live player counts for a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStats {
    pub online_players: i64,
    pub max_players: i64,
}

impl Default for GameStats {
    fn default() -> Self {
        Self {
            online_players: DEFAULT_ONLINE_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GamesResponse {
    #[serde(default)]
    data: Vec<GameEntry>,
}

#[derive(Debug, Deserialize)]
struct GameEntry {
    playing: Option<i64>,
    #[serde(rename = "maxPlayers")]
    max_players: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("no game data in response")]
    Empty,
}

/// Extract the numeric id from a `/games/<id>` server URL.
pub fn extract_place_id(server_url: &str) -> Option<&str> {
    static PLACE_ID: OnceLock<Regex> = OnceLock::new();
    let re = PLACE_ID.get_or_init(|| Regex::new(r"/games/(\d+)").expect("valid regex"));
    re.captures(server_url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[derive(Debug, Clone)]
pub struct GamesClient {
    http: reqwest::Client,
    base_url: String,
}

impl GamesClient {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.roblox_api_timeout)
            .user_agent("Mozilla/5.0")
            .build()?;
        Ok(Self {
            http,
            base_url: config.roblox_games_api.clone(),
        })
    }

    /// Fetch live counts for a place id.
    pub async fn fetch(&self, place_id: &str) -> Result<GameStats, LookupError> {
        let url = format!("{}/v1/games", self.base_url);
        let response: GamesResponse = self
            .http
            .get(url)
            .query(&[("universeIds", place_id)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let game = response.data.into_iter().next().ok_or(LookupError::Empty)?;
        Ok(GameStats {
            online_players: game.playing.unwrap_or(DEFAULT_ONLINE_PLAYERS),
            max_players: game.max_players.unwrap_or(DEFAULT_MAX_PLAYERS),
        })
    }

    /// Best-effort counts for a server URL. Any failure yields the defaults.
    pub async fn stats_for_server_url(&self, server_url: &str) -> GameStats {
        let Some(place_id) = extract_place_id(server_url) else {
            return GameStats::default();
        };
        match self.fetch(place_id).await {
            Ok(stats) => {
                metrics::GAME_STATS_LOOKUPS_TOTAL
                    .with_label_values(&["ok"])
                    .inc();
                stats
            }
            Err(e) => {
                tracing::warn!(place_id, "Roblox games lookup failed: {e}");
                metrics::GAME_STATS_LOOKUPS_TOTAL
                    .with_label_values(&["error"])
                    .inc();
                GameStats::default()
            }
        }
    }
}
