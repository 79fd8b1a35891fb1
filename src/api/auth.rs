// Third-party login handlers (Telegram, Roblox).

use axum::{
    body::Bytes,
    extract::{Json, State},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{parse_body, AppState};
use crate::error::Result;

#[derive(Deserialize)]
pub struct TelegramLoginRequest {
    #[serde(default)]
    pub telegram_data: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
pub struct RobloxLoginRequest {
    #[serde(default)]
    pub roblox_data: Option<Map<String, Value>>,
}

pub async fn telegram_login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: TelegramLoginRequest = parse_body(&body)?;
    let data = req.telegram_data.unwrap_or_default();
    let user = state.users.telegram_login(&data).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn roblox_login(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: RobloxLoginRequest = parse_body(&body)?;
    let data = req.roblox_data.unwrap_or_default();
    let user = state.users.roblox_login(&data).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}
