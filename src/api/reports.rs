// Player report handlers.

use axum::{
    body::Bytes,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_body, trimmed, AppState};
use crate::db::PlayerReport;
use crate::error::{AppError, Result};
use crate::users::parse_id;

/// Reports returned when no reporter filter is given.
const RECENT_REPORTS_LIMIT: i64 = 50;

#[derive(Deserialize)]
pub struct CreateReportRequest {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub reported_player: Option<String>,
    #[serde(default)]
    pub report_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct ListReportsParams {
    pub user_id: Option<String>,
}

fn report_json(report: &PlayerReport) -> Value {
    json!({
        "id": report.id,
        "reported_player": report.reported_player_name,
        "type": report.report_type,
        "description": report.description,
        "status": report.status,
        "created_at": report.created_at,
    })
}

pub async fn create_report(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let req: CreateReportRequest = parse_body(&body)?;

    let user_id = parse_id(req.user_id.as_ref());
    let reported_player = trimmed(&req.reported_player);
    let report_type = trimmed(&req.report_type);
    let description = trimmed(&req.description);

    let Some(user_id) = user_id else {
        return Err(AppError::validation("All fields are required"));
    };
    if reported_player.is_empty() || report_type.is_empty() || description.is_empty() {
        return Err(AppError::validation("All fields are required"));
    }

    let report = state
        .db
        .create_report(user_id, reported_player, report_type, description)
        .await?;
    tracing::info!(report_id = report.id, reporter = user_id, "Player report submitted");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "report_id": report.id,
            "message": "Report submitted successfully",
        })),
    ))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListReportsParams>,
) -> Result<impl IntoResponse> {
    let reporter = params.user_id.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let reports = match reporter {
        Some(raw) => {
            let user_id: i64 = raw
                .parse()
                .map_err(|_| AppError::validation("Invalid user_id"))?;
            state.db.list_reports_by_reporter(user_id).await?
        }
        None => state.db.list_recent_reports(RECENT_REPORTS_LIMIT).await?,
    };

    let reports: Vec<Value> = reports.iter().map(report_json).collect();
    Ok(Json(json!({ "reports": reports })))
}
