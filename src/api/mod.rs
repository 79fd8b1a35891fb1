// HTTP API routes: logins, player reports, tournaments, VIP servers.

pub mod auth;
pub mod reports;
pub mod tournaments;
pub mod vip_servers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::{Json, Request},
    handler::Handler,
    http::{
        header::{HeaderName, CONTENT_TYPE},
        Method, StatusCode,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::roblox::GamesClient;
use crate::users::UserService;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub users: Arc<UserService>,
    pub games: GamesClient,
}

// ── CORS ──────────────────────────────────────────────────────────────

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(86400);

/// Methods advertised in preflight responses, per route group.
pub const LOGIN_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];
pub const REPORT_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];
pub const TOURNAMENT_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];
pub const VIP_SERVER_METHODS: [Method; 4] =
    [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Any origin, no preflight details. Used on routes outside `/api`.
fn any_origin() -> CorsLayer {
    CorsLayer::new().allow_origin(Any)
}

/// Any origin plus the preflight answer for one route group. Every
/// `OPTIONS` request is answered by the layer itself.
fn cors_for(methods: &[Method]) -> CorsLayer {
    any_origin()
        .allow_methods(methods.to_vec())
        .allow_headers([CONTENT_TYPE, HeaderName::from_static("x-user-id")])
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Attach the JSON 405 fallback and the route group's CORS layer.
fn with_cors<S>(route: MethodRouter<S>, methods: &[Method]) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    route.fallback(method_not_allowed).layer(cors_for(methods))
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

// ── Request helpers ──────────────────────────────────────────────────

/// Decode a JSON request body. An empty body is treated as `{}`; the
/// Content-Type header is not consulted.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|_| AppError::InvalidBody)?
    };
    serde_json::from_value(value).map_err(|_| AppError::InvalidBody)
}

/// Trimmed copy of an optional string field; missing becomes empty.
pub fn trimmed(field: &Option<String>) -> &str {
    field.as_deref().map(str::trim).unwrap_or_default()
}

// ── Ambient endpoints ────────────────────────────────────────────────

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "service": "arena-backend" }))
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = metrics::normalize_path(req.uri().path());
    let start = Instant::now();

    let response = next.run(req).await;

    metrics::API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(start.elapsed().as_secs_f64());
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check).layer(any_origin()))
        .route("/metrics", get(metrics_handler).layer(any_origin()))
        // Logins
        .route(
            "/api/auth/telegram",
            with_cors(post(auth::telegram_login), &LOGIN_METHODS),
        )
        .route(
            "/api/auth/roblox",
            with_cors(post(auth::roblox_login), &LOGIN_METHODS),
        )
        // Player reports
        .route(
            "/api/reports",
            with_cors(
                get(reports::list_reports).post(reports::create_report),
                &REPORT_METHODS,
            ),
        )
        // Tournaments
        .route(
            "/api/tournaments",
            with_cors(
                get(tournaments::list_tournaments).post(tournaments::create_tournament),
                &TOURNAMENT_METHODS,
            ),
        )
        // VIP servers
        .route(
            "/api/vip-servers",
            with_cors(
                get(vip_servers::list_vip_servers).post(vip_servers::create_vip_server),
                &VIP_SERVER_METHODS,
            ),
        )
        .fallback(not_found.layer(any_origin()))
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}
