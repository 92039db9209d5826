use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a stored access token. Backed by the `token_status`
/// enum type in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "token_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Active,
    Banned,
    Unknown,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Banned => "banned",
            TokenStatus::Unknown => "unknown",
        }
    }
}

/// A durable Augment access-token record. `access_token` holds the sealed
/// (AES-GCM) form; plaintext only exists in memory on paths that need it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Token {
    pub id: Uuid,
    pub tenant_url: String,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    /// SHA-256 hex of the plaintext token. Sealing is nondeterministic, so
    /// duplicate detection goes through this column instead.
    #[serde(skip_serializing, default)]
    pub token_digest: String,
    pub portal_url: Option<String>,
    pub email: Option<String>,
    pub remark: Option<String>,
    pub status: TokenStatus,
    pub usage_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(tenant_url: String, sealed_token: String, token_digest: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_url,
            access_token: sealed_token,
            token_digest,
            portal_url: None,
            email: None,
            remark: None,
            status: TokenStatus::Active,
            usage_count: 0,
            created_at: now,
            updated_at: now,
            last_checked_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdminSession {
    pub id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl AdminSession {
    pub fn new(token: String, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            token,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// State of a card activation at the partner service. Backed by the
/// `share_status` enum type in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "share_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ShareStatus {
    Active,
    Expired,
    Revoked,
}

/// Record of a token shared through the card-activation partner. One share
/// per token; re-sharing refreshes this row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenShare {
    pub id: Uuid,
    pub token_id: Uuid,
    pub card_id: String,
    pub activation_code: String,
    pub status: ShareStatus,
    pub shared_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenShare {
    pub fn new(
        token_id: Uuid,
        card_id: String,
        activation_code: String,
        status: ShareStatus,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_id,
            card_id,
            activation_code,
            status,
            shared_at: Utc::now(),
            expires_at,
        }
    }
}
