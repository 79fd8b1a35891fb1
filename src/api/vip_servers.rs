// VIP server registration and listing handlers.

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_body, trimmed, AppState};
use crate::db::VipServerListing;
use crate::error::{AppError, Result};
use crate::users::parse_id;

#[derive(Deserialize)]
pub struct CreateVipServerRequest {
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub server_url: Option<String>,
    #[serde(default)]
    pub user_id: Option<Value>,
}

/// Roblox account name if linked, else "first last" (just "first" without
/// a last name), else "Unknown".
pub fn creator_name(server: &VipServerListing) -> String {
    if let Some(name) = server.creator_roblox_username.as_deref().filter(|s| !s.is_empty()) {
        return name.to_string();
    }
    match server.creator_first_name.as_deref().filter(|s| !s.is_empty()) {
        Some(first) => match server.creator_last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{first} {last}"),
            _ => first.to_string(),
        },
        None => "Unknown".to_string(),
    }
}

fn listing_json(server: &VipServerListing) -> Value {
    json!({
        "id": server.id,
        "game_name": server.game_name,
        "server_url": server.server_url,
        "online_players": server.online_players,
        "max_players": server.max_players,
        "created_at": server.created_at,
        "creator_name": creator_name(server),
    })
}

pub async fn list_vip_servers(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let servers = state.db.list_vip_servers().await?;
    let servers: Vec<Value> = servers.iter().map(listing_json).collect();
    Ok(Json(json!({ "servers": servers })))
}

pub async fn create_vip_server(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: CreateVipServerRequest = parse_body(&body)?;

    let game_name = trimmed(&req.game_name);
    let server_url = trimmed(&req.server_url);
    if game_name.is_empty() || server_url.is_empty() {
        return Err(AppError::validation(
            "Game name and server URL are required",
        ));
    }
    if !server_url.contains("roblox.com") {
        return Err(AppError::validation("Invalid Roblox server URL"));
    }

    let stats = state.games.stats_for_server_url(server_url).await;
    let server_id = state
        .db
        .create_vip_server(
            game_name,
            server_url,
            parse_id(req.user_id.as_ref()),
            stats.online_players,
            stats.max_players,
        )
        .await?;
    tracing::info!(server_id, game_name, "VIP server registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "server_id": server_id,
            "online_players": stats.online_players,
            "max_players": stats.max_players,
        })),
    ))
}
