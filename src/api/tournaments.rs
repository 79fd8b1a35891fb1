// Tournament creation and listing handlers.

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_body, trimmed, AppState};
use crate::db::{NewTournament, TournamentListing};
use crate::error::{AppError, Result};
use crate::users::parse_id;

pub const MIN_PLAYERS: i64 = 2;
pub const MAX_PLAYERS: i64 = 1000;

#[derive(Deserialize)]
pub struct CreateTournamentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub game_name: Option<String>,
    #[serde(default)]
    pub roblox_server_url: Option<String>,
    #[serde(default)]
    pub max_players: Option<i64>,
    #[serde(default)]
    pub prize_robux: Option<i64>,
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub start_date: Option<String>,
}

fn listing_json(t: &TournamentListing) -> Value {
    json!({
        "id": t.id,
        "name": t.name,
        "game": t.game_name,
        "robloxServerUrl": t.roblox_server_url,
        "maxPlayers": t.max_players,
        "prize": t.prize_robux,
        "players": t.current_players,
        "status": t.status,
        "startDate": t.start_date,
        "createdAt": t.created_at,
        "creator": {
            "first_name": t.creator_first_name,
            "last_name": t.creator_last_name,
            "username": t.creator_username,
        },
    })
}

pub async fn list_tournaments(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let tournaments = state.db.list_tournaments().await?;
    let tournaments: Vec<Value> = tournaments.iter().map(listing_json).collect();
    Ok(Json(json!({ "tournaments": tournaments })))
}

pub async fn create_tournament(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: CreateTournamentRequest = parse_body(&body)?;

    let name = trimmed(&req.name);
    let game_name = trimmed(&req.game_name);
    let roblox_server_url = trimmed(&req.roblox_server_url);
    // Zero counts as missing, like an absent field.
    let max_players = req.max_players.filter(|&n| n != 0);
    let prize_robux = req.prize_robux.filter(|&n| n != 0);

    let (Some(max_players), Some(prize_robux)) = (max_players, prize_robux) else {
        return Err(AppError::validation("All fields are required"));
    };
    if name.is_empty() || game_name.is_empty() || roblox_server_url.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&max_players) {
        return Err(AppError::validation(format!(
            "Max players must be between {MIN_PLAYERS} and {MAX_PLAYERS}"
        )));
    }

    let start_date = req.start_date.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let tournament = state
        .db
        .create_tournament(&NewTournament {
            name,
            game_name,
            roblox_server_url,
            max_players,
            prize_robux,
            creator_user_id: parse_id(req.user_id.as_ref()),
            start_date,
        })
        .await?;
    tracing::info!(tournament_id = tournament.id, name, "Tournament created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "tournament": {
                "id": tournament.id,
                "name": tournament.name,
                "game": tournament.game_name,
                "robloxServerUrl": tournament.roblox_server_url,
                "maxPlayers": tournament.max_players,
                "prize": tournament.prize_robux,
                "players": tournament.current_players,
                "status": tournament.status,
                "createdAt": tournament.created_at,
            },
        })),
    ))
}
