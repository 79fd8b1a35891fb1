// Shared helpers for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{Request, Response, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use arena_backend::api::{self, AppState};
use arena_backend::config::Config;
use arena_backend::db::Database;
use arena_backend::roblox::GamesClient;
use arena_backend::users::{UpsertPolicy, UserService};

/// Config pointing at an in-memory database and an unreachable games API.
pub fn test_config(bot_token: Option<&str>, roblox_policy: UpsertPolicy) -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        telegram_bot_token: bot_token.map(str::to_string),
        roblox_upsert_policy: roblox_policy,
        roblox_games_api: "http://127.0.0.1:9".to_string(),
        roblox_api_timeout: Duration::from_secs(1),
        ..Config::default()
    }
}

pub async fn test_app_with(config: Config) -> Router {
    let db = Arc::new(
        Database::new(&config.database_url, config.db_max_connections)
            .await
            .unwrap(),
    );
    let users = Arc::new(UserService::new(db.clone(), &config));
    let games = GamesClient::new(&config).unwrap();
    api::router(AppState { db, users, games })
}

/// Database in a file under `dir`, so the pool can hold more than one
/// connection and concurrent logins really interleave.
pub async fn file_database(dir: &tempfile::TempDir, max_connections: u32) -> Arc<Database> {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("arena.db").display());
    Arc::new(Database::new(&url, max_connections).await.unwrap())
}

pub async fn test_app() -> Router {
    test_app_with(test_config(None, UpsertPolicy::Conflict)).await
}

pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Response<Body>) {
    let response = app.clone().oneshot(req).await.unwrap();
    (response.status(), response)
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// POST and return (status, JSON body).
pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, response) = send(app, post_json(uri, &body)).await;
    (status, body_json(response).await)
}

/// GET and return (status, JSON body).
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, response) = send(app, get(uri)).await;
    (status, body_json(response).await)
}

/// Comma-separated header value as a sorted, lowercased list.
pub fn header_set(response: &Response<Body>, name: &str) -> Vec<String> {
    let mut items: Vec<String> = response.headers()[name]
        .to_str()
        .unwrap()
        .split(',')
        .map(|item| item.trim().to_ascii_lowercase())
        .collect();
    items.sort();
    items
}
