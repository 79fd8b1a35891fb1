use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use arena_backend::api::{self, AppState};
use arena_backend::auth::VerificationMode;
use arena_backend::config::Config;
use arena_backend::db::Database;
use arena_backend::metrics;
use arena_backend::roblox::GamesClient;
use arena_backend::users::{UpsertPolicy, UserService};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().expect("Invalid configuration");
    metrics::register_metrics();

    let db = Database::new(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to initialize database");
    let registered = db
        .count_users()
        .await
        .expect("Failed to query registered users");
    tracing::info!(registered, "Database ready");
    let db = Arc::new(db);

    let users = UserService::new(db.clone(), &config);
    let verification = users.verification_mode();
    if verification == VerificationMode::Disabled {
        tracing::warn!(
            "TELEGRAM_BOT_TOKEN is not set: Telegram logins are accepted without signature verification"
        );
    }
    if users.roblox_policy() == UpsertPolicy::CheckThenAct {
        tracing::warn!(
            "Roblox logins use the legacy check-then-act upsert; concurrent first logins can fail"
        );
    }

    let games = GamesClient::new(&config).expect("Failed to build HTTP client");

    let state = AppState {
        db,
        users: Arc::new(users),
        games,
    };
    let app = api::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .expect("Failed to bind listener");

    tracing::info!(
        port = config.port,
        %verification,
        roblox_upsert_policy = %config.roblox_upsert_policy,
        "Arena backend listening"
    );
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

