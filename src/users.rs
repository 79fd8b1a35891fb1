// User login service: turns a third-party identity assertion into a current
// user record, creating the record on first contact.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::auth::{TelegramVerifier, VerificationMode};
use crate::config::Config;
use crate::db::{Database, User};
use crate::error::{AppError, Result};
use crate::metrics;

/// How a login finds-or-creates its user record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertPolicy {
    /// One atomic `INSERT … ON CONFLICT DO UPDATE`.
    Conflict,
    /// Legacy: SELECT, then a separate UPDATE or INSERT. Two concurrent first
    /// logins for the same identity can both miss the SELECT; the loser then
    /// fails on the unique key.
    CheckThenAct,
}

impl UpsertPolicy {
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conflict" => Some(Self::Conflict),
            "check_then_act" | "check-then-act" => Some(Self::CheckThenAct),
            _ => None,
        }
    }

    pub fn to_str_name(&self) -> &'static str {
        match self {
            Self::Conflict => "conflict",
            Self::CheckThenAct => "check_then_act",
        }
    }
}

impl std::fmt::Display for UpsertPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str_name())
    }
}

/// A provider-tagged external identity key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Telegram(i64),
    Roblox(i64),
}

impl Identity {
    /// Column of `users` holding this provider's key.
    pub fn column(&self) -> &'static str {
        match self {
            Identity::Telegram(_) => "telegram_id",
            Identity::Roblox(_) => "roblox_id",
        }
    }

    pub fn provider(&self) -> &'static str {
        match self {
            Identity::Telegram(_) => "telegram",
            Identity::Roblox(_) => "roblox",
        }
    }

    pub fn provider_id(&self) -> i64 {
        match *self {
            Identity::Telegram(id) | Identity::Roblox(id) => id,
        }
    }
}

/// Display fields written on every login. For `last_name` and
/// `roblox_username`, `None` leaves the stored value untouched on update and
/// stores the column default on insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileFields {
    pub username: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub photo_url: String,
    pub roblox_username: Option<String>,
}

/// Read an id from a JSON field. Accepts a non-zero integer or
/// a string holding one; anything else counts as missing.
pub fn parse_id(value: Option<&Value>) -> Option<i64> {
    let id = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (id != 0).then_some(id)
}

fn string_field(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Roblox headshot thumbnail for a user id.
pub fn roblox_avatar_url(roblox_id: i64) -> String {
    format!(
        "https://www.roblox.com/headshot-thumbnail/image?userId={roblox_id}&width=150&height=150&format=png"
    )
}

pub struct UserService {
    db: Arc<Database>,
    verifier: TelegramVerifier,
    roblox_policy: UpsertPolicy,
}

impl UserService {
    pub fn new(db: Arc<Database>, config: &Config) -> Self {
        let verifier = TelegramVerifier::new(config.telegram_bot_token.clone());
        metrics::SIGNATURE_VERIFICATION_DISABLED
            .set(i64::from(verifier.mode() == VerificationMode::Disabled));
        Self {
            db,
            verifier,
            roblox_policy: config.roblox_upsert_policy,
        }
    }

    pub fn verification_mode(&self) -> VerificationMode {
        self.verifier.mode()
    }

    pub fn roblox_policy(&self) -> UpsertPolicy {
        self.roblox_policy
    }

    fn policy_for(&self, identity: Identity) -> UpsertPolicy {
        match identity {
            Identity::Telegram(_) => UpsertPolicy::Conflict,
            Identity::Roblox(_) => self.roblox_policy,
        }
    }

    /// Find-or-create the user for `identity` and refresh its profile.
    pub async fn upsert(&self, identity: Identity, profile: &ProfileFields) -> Result<User> {
        let policy = self.policy_for(identity);
        tracing::debug!(
            provider = identity.provider(),
            provider_id = identity.provider_id(),
            %policy,
            "Upserting user"
        );
        match policy {
            UpsertPolicy::Conflict => Ok(self.db.upsert_user_on_conflict(identity, profile).await?),
            UpsertPolicy::CheckThenAct => {
                if self.db.find_user_id_by_identity(identity).await?.is_some() {
                    if let Some(user) = self.db.update_user_profile(identity, profile).await? {
                        return Ok(user);
                    }
                }
                Ok(self.db.insert_user(identity, profile).await?)
            }
        }
    }

    /// Log in with a Telegram login widget payload.
    pub async fn telegram_login(&self, data: &Map<String, Value>) -> Result<User> {
        let Some(telegram_id) = parse_id(data.get("id")) else {
            metrics::LOGINS_TOTAL
                .with_label_values(&["telegram", "invalid"])
                .inc();
            return Err(AppError::validation("Telegram ID required"));
        };

        match self.verifier.mode() {
            VerificationMode::Enforced => {
                if !self.verifier.verify(data) {
                    tracing::warn!(telegram_id, "Telegram login signature mismatch");
                    metrics::LOGINS_TOTAL
                        .with_label_values(&["telegram", "rejected"])
                        .inc();
                    return Err(AppError::Authentication);
                }
            }
            VerificationMode::Disabled => {
                tracing::warn!(
                    telegram_id,
                    "Accepting Telegram login without signature check: TELEGRAM_BOT_TOKEN is not set"
                );
            }
        }

        let profile = ProfileFields {
            username: string_field(data, "username"),
            first_name: string_field(data, "first_name"),
            last_name: Some(string_field(data, "last_name")),
            photo_url: string_field(data, "photo_url"),
            roblox_username: None,
        };

        let user = self.upsert(Identity::Telegram(telegram_id), &profile).await?;
        let outcome = match self.verifier.mode() {
            VerificationMode::Enforced => "verified",
            VerificationMode::Disabled => "unverified",
        };
        metrics::LOGINS_TOTAL
            .with_label_values(&["telegram", outcome])
            .inc();
        tracing::info!(user_id = user.id, telegram_id, "Telegram login");
        Ok(user)
    }

    /// Log in with a Roblox profile. The id is trusted on presence alone.
    pub async fn roblox_login(&self, data: &Map<String, Value>) -> Result<User> {
        let Some(roblox_id) = parse_id(data.get("id")) else {
            metrics::LOGINS_TOTAL
                .with_label_values(&["roblox", "invalid"])
                .inc();
            return Err(AppError::validation("Roblox ID required"));
        };

        let name = string_field(data, "name");
        let display_name = string_field(data, "displayName");
        let first_name = if display_name.is_empty() {
            name.clone()
        } else {
            display_name
        };

        let profile = ProfileFields {
            username: name.clone(),
            first_name,
            last_name: None,
            photo_url: roblox_avatar_url(roblox_id),
            roblox_username: Some(name),
        };

        let user = self.upsert(Identity::Roblox(roblox_id), &profile).await?;
        metrics::LOGINS_TOTAL
            .with_label_values(&["roblox", "unverified"])
            .inc();
        tracing::info!(user_id = user.id, roblox_id, policy = %self.roblox_policy, "Roblox login");
        Ok(user)
    }
}
