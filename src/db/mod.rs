// Database access layer (SQLite via sqlx).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::users::{Identity, ProfileFields};

/// Current UTC time as an ISO-8601 string, evaluated by SQLite.
const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%SZ', 'now')";

const USER_COLUMNS: &str = "id, telegram_id, roblox_id, roblox_username, username, first_name, last_name, photo_url, wins, losses, rating, team_name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub telegram_id: Option<i64>,
    pub roblox_id: Option<i64>,
    pub roblox_username: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: String,
    pub wins: i64,
    pub losses: i64,
    pub rating: i64,
    pub team_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PlayerReport {
    pub id: i64,
    pub reported_player_name: String,
    pub report_type: String,
    pub description: String,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tournament {
    pub id: i64,
    pub name: String,
    pub game_name: String,
    pub roblox_server_url: String,
    pub max_players: i64,
    pub prize_robux: i64,
    pub current_players: i64,
    pub status: String,
    pub created_at: String,
}

/// A tournament joined with its creator's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TournamentListing {
    pub id: i64,
    pub name: String,
    pub game_name: String,
    pub roblox_server_url: String,
    pub max_players: i64,
    pub prize_robux: i64,
    pub current_players: i64,
    pub status: String,
    pub start_date: Option<String>,
    pub created_at: String,
    pub creator_first_name: Option<String>,
    pub creator_last_name: Option<String>,
    pub creator_username: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTournament<'a> {
    pub name: &'a str,
    pub game_name: &'a str,
    pub roblox_server_url: &'a str,
    pub max_players: i64,
    pub prize_robux: i64,
    pub creator_user_id: Option<i64>,
    pub start_date: Option<&'a str>,
}

/// A VIP server joined with its creator's display fields.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VipServerListing {
    pub id: i64,
    pub game_name: String,
    pub server_url: String,
    pub online_players: i64,
    pub max_players: i64,
    pub created_at: String,
    pub creator_first_name: Option<String>,
    pub creator_last_name: Option<String>,
    pub creator_username: Option<String>,
    pub creator_roblox_username: Option<String>,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        // Every connection to an in-memory database is a separate database,
        // so those get a single connection that is never recycled.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };
        let pool = options.connect(database_url).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                telegram_id INTEGER UNIQUE,
                roblox_id INTEGER UNIQUE,
                roblox_username TEXT,
                username TEXT NOT NULL DEFAULT '',
                first_name TEXT NOT NULL DEFAULT '',
                last_name TEXT NOT NULL DEFAULT '',
                photo_url TEXT NOT NULL DEFAULT '',
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                rating INTEGER NOT NULL DEFAULT 1000,
                team_name TEXT,
                created_at TEXT NOT NULL DEFAULT ({NOW}),
                last_login TEXT NOT NULL DEFAULT ({NOW})
            )
        "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS player_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                reporter_user_id INTEGER NOT NULL REFERENCES users(id),
                reported_player_name TEXT NOT NULL,
                report_type TEXT NOT NULL,
                description TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL DEFAULT ({NOW})
            )
        "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS tournaments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                game_name TEXT NOT NULL,
                roblox_server_url TEXT NOT NULL,
                max_players INTEGER NOT NULL,
                prize_robux INTEGER NOT NULL,
                current_players INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'registration',
                creator_user_id INTEGER REFERENCES users(id),
                start_date TEXT,
                created_at TEXT NOT NULL DEFAULT ({NOW})
            )
        "#
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS vip_servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                game_name TEXT NOT NULL,
                server_url TEXT NOT NULL,
                creator_user_id INTEGER REFERENCES users(id),
                online_players INTEGER NOT NULL DEFAULT 0,
                max_players INTEGER NOT NULL DEFAULT 50,
                created_at TEXT NOT NULL DEFAULT ({NOW})
            )
        "#
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Insert a user, or refresh its profile if the identity key already
    /// exists, in one statement.
    pub async fn upsert_user_on_conflict(
        &self,
        identity: Identity,
        profile: &ProfileFields,
    ) -> Result<User, sqlx::Error> {
        let column = identity.column();
        let sql = format!(
            "INSERT INTO users ({column}, roblox_username, username, first_name, last_name, photo_url, last_login) \
             VALUES (?, ?, ?, ?, COALESCE(?, ''), ?, {NOW}) \
             ON CONFLICT({column}) DO UPDATE SET \
                 roblox_username = COALESCE(excluded.roblox_username, users.roblox_username), \
                 username = excluded.username, \
                 first_name = excluded.first_name, \
                 last_name = CASE WHEN ? IS NULL THEN users.last_name ELSE excluded.last_name END, \
                 photo_url = excluded.photo_url, \
                 last_login = {NOW} \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(identity.provider_id())
            .bind(profile.roblox_username.as_deref())
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(profile.last_name.as_deref())
            .bind(&profile.photo_url)
            .bind(profile.last_name.as_deref())
            .fetch_one(&self.pool)
            .await
    }

    pub async fn find_user_id_by_identity(
        &self,
        identity: Identity,
    ) -> Result<Option<i64>, sqlx::Error> {
        let sql = format!("SELECT id FROM users WHERE {} = ?", identity.column());
        sqlx::query_scalar(&sql)
            .bind(identity.provider_id())
            .fetch_optional(&self.pool)
            .await
    }

    /// Overwrite the profile of an existing user. `None` fields are left as-is.
    pub async fn update_user_profile(
        &self,
        identity: Identity,
        profile: &ProfileFields,
    ) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET \
                 roblox_username = COALESCE(?, roblox_username), \
                 username = ?, \
                 first_name = ?, \
                 last_name = COALESCE(?, last_name), \
                 photo_url = ?, \
                 last_login = {NOW} \
             WHERE {} = ? \
             RETURNING {USER_COLUMNS}",
            identity.column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(profile.roblox_username.as_deref())
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(profile.last_name.as_deref())
            .bind(&profile.photo_url)
            .bind(identity.provider_id())
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_user(
        &self,
        identity: Identity,
        profile: &ProfileFields,
    ) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users ({}, roblox_username, username, first_name, last_name, photo_url, last_login) \
             VALUES (?, ?, ?, ?, COALESCE(?, ''), ?, {NOW}) \
             RETURNING {USER_COLUMNS}",
            identity.column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(identity.provider_id())
            .bind(profile.roblox_username.as_deref())
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(profile.last_name.as_deref())
            .bind(&profile.photo_url)
            .fetch_one(&self.pool)
            .await
    }

    /// Number of registered users, logged at startup.
    pub async fn count_users(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }

    // ── Player reports ────────────────────────────────────────────────

    pub async fn create_report(
        &self,
        reporter_user_id: i64,
        reported_player: &str,
        report_type: &str,
        description: &str,
    ) -> Result<PlayerReport, sqlx::Error> {
        sqlx::query_as::<_, PlayerReport>(
            "INSERT INTO player_reports (reporter_user_id, reported_player_name, report_type, description) VALUES (?, ?, ?, ?) RETURNING id, reported_player_name, report_type, description, status, created_at",
        )
        .bind(reporter_user_id)
        .bind(reported_player)
        .bind(report_type)
        .bind(description)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_reports_by_reporter(
        &self,
        reporter_user_id: i64,
    ) -> Result<Vec<PlayerReport>, sqlx::Error> {
        sqlx::query_as::<_, PlayerReport>(
            "SELECT id, reported_player_name, report_type, description, status, created_at FROM player_reports WHERE reporter_user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(reporter_user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_recent_reports(&self, limit: i64) -> Result<Vec<PlayerReport>, sqlx::Error> {
        sqlx::query_as::<_, PlayerReport>(
            "SELECT id, reported_player_name, report_type, description, status, created_at FROM player_reports ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    // ── Tournaments ───────────────────────────────────────────────────

    pub async fn create_tournament(
        &self,
        new: &NewTournament<'_>,
    ) -> Result<Tournament, sqlx::Error> {
        sqlx::query_as::<_, Tournament>(
            "INSERT INTO tournaments (name, game_name, roblox_server_url, max_players, prize_robux, creator_user_id, start_date) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id, name, game_name, roblox_server_url, max_players, prize_robux, current_players, status, created_at",
        )
        .bind(new.name)
        .bind(new.game_name)
        .bind(new.roblox_server_url)
        .bind(new.max_players)
        .bind(new.prize_robux)
        .bind(new.creator_user_id)
        .bind(new.start_date)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_tournaments(&self) -> Result<Vec<TournamentListing>, sqlx::Error> {
        sqlx::query_as::<_, TournamentListing>(
            r#"
            SELECT
                t.id, t.name, t.game_name, t.roblox_server_url,
                t.max_players, t.prize_robux, t.current_players,
                t.status, t.start_date, t.created_at,
                u.first_name AS creator_first_name,
                u.last_name AS creator_last_name,
                u.username AS creator_username
            FROM tournaments t
            LEFT JOIN users u ON t.creator_user_id = u.id
            ORDER BY t.created_at DESC, t.id DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    // ── VIP servers ───────────────────────────────────────────────────

    pub async fn create_vip_server(
        &self,
        game_name: &str,
        server_url: &str,
        creator_user_id: Option<i64>,
        online_players: i64,
        max_players: i64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO vip_servers (game_name, server_url, creator_user_id, online_players, max_players) VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(game_name)
        .bind(server_url)
        .bind(creator_user_id)
        .bind(online_players)
        .bind(max_players)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn list_vip_servers(&self) -> Result<Vec<VipServerListing>, sqlx::Error> {
        sqlx::query_as::<_, VipServerListing>(
            r#"
            SELECT
                v.id, v.game_name, v.server_url, v.online_players,
                v.max_players, v.created_at,
                u.first_name AS creator_first_name,
                u.last_name AS creator_last_name,
                u.username AS creator_username,
                u.roblox_username AS creator_roblox_username
            FROM vip_servers v
            LEFT JOIN users u ON v.creator_user_id = u.id
            ORDER BY v.created_at DESC, v.id DESC
        "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        Database::new("sqlite::memory:", 5).await.unwrap()
    }

    fn profile(username: &str) -> ProfileFields {
        ProfileFields {
            username: username.to_string(),
            first_name: "First".to_string(),
            last_name: Some("Last".to_string()),
            photo_url: String::new(),
            roblox_username: None,
        }
    }

    #[tokio::test]
    async fn test_upsert_on_conflict_keeps_surrogate_id() {
        let db = test_db().await;

        let first = db
            .upsert_user_on_conflict(Identity::Telegram(777), &profile("nova"))
            .await
            .unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.telegram_id, Some(777));
        assert_eq!(first.roblox_id, None);
        assert_eq!(first.username, "nova");

        let second = db
            .upsert_user_on_conflict(Identity::Telegram(777), &profile("nova2"))
            .await
            .unwrap();
        assert_eq!(second.id, 1);
        assert_eq!(second.username, "nova2");
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_on_conflict_preserves_unset_fields() {
        let db = test_db().await;

        db.upsert_user_on_conflict(Identity::Roblox(5), &profile("a"))
            .await
            .unwrap();

        let mut update = profile("b");
        update.last_name = None;
        update.roblox_username = Some("b".into());
        let user = db
            .upsert_user_on_conflict(Identity::Roblox(5), &update)
            .await
            .unwrap();
        assert_eq!(user.last_name, "Last");
        assert_eq!(user.roblox_username.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_new_user_defaults() {
        let db = test_db().await;

        let mut p = profile("x");
        p.last_name = None;
        let user = db.insert_user(Identity::Roblox(9), &p).await.unwrap();
        assert_eq!(user.last_name, "");
        assert_eq!(user.wins, 0);
        assert_eq!(user.losses, 0);
        assert_eq!(user.rating, 1000);
        assert_eq!(user.team_name, None);
    }

    #[tokio::test]
    async fn test_find_update_insert() {
        let db = test_db().await;

        assert_eq!(db.find_user_id_by_identity(Identity::Roblox(42)).await.unwrap(), None);
        assert!(db
            .update_user_profile(Identity::Roblox(42), &profile("ghost"))
            .await
            .unwrap()
            .is_none());

        let created = db.insert_user(Identity::Roblox(42), &profile("r")).await.unwrap();
        assert_eq!(
            db.find_user_id_by_identity(Identity::Roblox(42)).await.unwrap(),
            Some(created.id)
        );

        let updated = db
            .update_user_profile(Identity::Roblox(42), &profile("r2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.username, "r2");

        // Same numeric id under the other provider is a different identity.
        assert_eq!(db.find_user_id_by_identity(Identity::Telegram(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_insert_violates_unique_key() {
        let db = test_db().await;

        db.insert_user(Identity::Roblox(1), &profile("a")).await.unwrap();
        let err = db.insert_user(Identity::Roblox(1), &profile("b")).await;
        assert!(err.is_err());
        assert_eq!(db.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reports() {
        let db = test_db().await;
        let alice = db.insert_user(Identity::Telegram(1), &profile("alice")).await.unwrap();
        let bob = db.insert_user(Identity::Telegram(2), &profile("bob")).await.unwrap();

        let r1 = db.create_report(alice.id, "Griefer", "cheating", "aimbot").await.unwrap();
        assert_eq!(r1.status, "pending");
        assert_eq!(r1.reported_player_name, "Griefer");
        db.create_report(bob.id, "Troll", "toxicity", "spam").await.unwrap();
        let r3 = db.create_report(alice.id, "Other", "cheating", "speed").await.unwrap();

        let mine = db.list_reports_by_reporter(alice.id).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, r3.id);
        assert_eq!(mine[1].id, r1.id);

        let recent = db.list_recent_reports(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, r3.id);
    }

    #[tokio::test]
    async fn test_report_for_unknown_reporter_fails() {
        let db = test_db().await;
        assert!(db.create_report(99, "X", "Y", "Z").await.is_err());
    }

    #[tokio::test]
    async fn test_tournaments() {
        let db = test_db().await;
        let creator = db.insert_user(Identity::Telegram(3), &profile("host")).await.unwrap();

        let t = db
            .create_tournament(&NewTournament {
                name: "Winter Cup",
                game_name: "Arsenal",
                roblox_server_url: "https://www.roblox.com/games/1",
                max_players: 16,
                prize_robux: 500,
                creator_user_id: Some(creator.id),
                start_date: Some("2026-12-01T18:00:00Z"),
            })
            .await
            .unwrap();
        assert_eq!(t.current_players, 0);
        assert_eq!(t.status, "registration");

        db.create_tournament(&NewTournament {
            name: "Orphan",
            game_name: "Blade Ball",
            roblox_server_url: "https://www.roblox.com/games/2",
            max_players: 2,
            prize_robux: 1,
            creator_user_id: None,
            start_date: None,
        })
        .await
        .unwrap();

        let list = db.list_tournaments().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Orphan");
        assert_eq!(list[0].creator_username, None);
        assert_eq!(list[0].start_date, None);
        assert_eq!(list[1].creator_username.as_deref(), Some("host"));
        assert_eq!(list[1].start_date.as_deref(), Some("2026-12-01T18:00:00Z"));
    }

    #[tokio::test]
    async fn test_vip_servers() {
        let db = test_db().await;
        let mut p = profile("host");
        p.roblox_username = Some("HostR".into());
        let creator = db.insert_user(Identity::Roblox(8), &p).await.unwrap();

        let id = db
            .create_vip_server("Arsenal", "https://www.roblox.com/games/1", Some(creator.id), 3, 30)
            .await
            .unwrap();
        let list = db.list_vip_servers().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert_eq!(list[0].online_players, 3);
        assert_eq!(list[0].creator_roblox_username.as_deref(), Some("HostR"));
    }
}
