use sqlx::PgPool;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use crate::db::models::{AdminSession, ShareStatus, Token, TokenShare, TokenStatus};
use crate::error::AppError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use std::sync::Arc;

const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

/// Normalizes pagination query parameters: 1-based page, page_size clamped
/// to 1..=100, zero/absent page_size falls back to the default.
pub fn clamp_page_params(page: Option<i64>, page_size: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let page_size = match page_size {
        Some(n) if n >= 1 => n.min(MAX_PAGE_SIZE),
        _ => DEFAULT_PAGE_SIZE,
    };
    (page, page_size)
}

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub fn pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size - idle,
            idle_connections: idle,
        }
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    // ---- tokens ----

    pub async fn create_token_with_transaction(
        &self,
        token: &Token,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<Token, AppError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            INSERT INTO tokens
                (id, tenant_url, access_token, token_digest, portal_url, email, remark,
                 status, usage_count, created_at, updated_at, last_checked_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(token.id)
        .bind(&token.tenant_url)
        .bind(&token.access_token)
        .bind(&token.token_digest)
        .bind(&token.portal_url)
        .bind(&token.email)
        .bind(&token.remark)
        .bind(token.status)
        .bind(token.usage_count)
        .bind(token.created_at)
        .bind(token.updated_at)
        .bind(token.last_checked_at)
        .fetch_one(&mut **transaction)
        .await?;

        Ok(token)
    }

    pub async fn create_token(&self, token: &Token) -> Result<Token, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = self.create_token_with_transaction(token, &mut transaction).await;

        match result {
            Ok(token) => {
                transaction.commit().await?;
                Ok(token)
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    pub async fn get_token_by_id(&self, id: Uuid) -> Result<Option<Token>, AppError> {
        let token = sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(token)
    }

    pub async fn get_token_by_digest(&self, digest: &str) -> Result<Option<Token>, AppError> {
        let token = sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token_digest = $1")
            .bind(digest)
            .fetch_optional(self.pool.as_ref())
            .await?;

        Ok(token)
    }

    pub async fn list_tokens(&self, page: i64, page_size: i64) -> Result<(Vec<Token>, i64), AppError> {
        let offset = (page - 1) * page_size;

        let tokens = sqlx::query_as::<_, Token>(
            "SELECT * FROM tokens ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tokens")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok((tokens, total))
    }

    pub async fn list_all_tokens(&self) -> Result<Vec<Token>, AppError> {
        let tokens = sqlx::query_as::<_, Token>("SELECT * FROM tokens ORDER BY created_at DESC")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(tokens)
    }

    /// Partial update; absent fields keep their stored values.
    pub async fn update_token(
        &self,
        id: Uuid,
        remark: Option<&str>,
        portal_url: Option<&str>,
        status: Option<TokenStatus>,
    ) -> Result<Token, AppError> {
        let token = sqlx::query_as::<_, Token>(
            r#"
            UPDATE tokens SET
                remark = COALESCE($2, remark),
                portal_url = COALESCE($3, portal_url),
                status = COALESCE($4, status),
                updated_at = $5
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(remark)
        .bind(portal_url)
        .bind(status)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(token)
    }

    pub async fn update_token_status(
        &self,
        id: Uuid,
        status: TokenStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE tokens SET status = $2, last_checked_at = $3, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .bind(checked_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    pub async fn touch_token_checked(&self, id: Uuid, checked_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE tokens SET last_checked_at = $2 WHERE id = $1")
            .bind(id)
            .bind(checked_at)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn increment_usage(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE tokens SET usage_count = usage_count + 1 WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn delete_token(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ---- admin sessions ----

    pub async fn create_session(&self, session: &AdminSession) -> Result<AdminSession, AppError> {
        let session = sqlx::query_as::<_, AdminSession>(
            r#"
            INSERT INTO admin_sessions (id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<AdminSession>, AppError> {
        let session = sqlx::query_as::<_, AdminSession>(
            "SELECT * FROM admin_sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    pub async fn update_session_activity(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE admin_sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM admin_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM admin_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }

    // ---- token shares ----

    /// One share row per token; re-activation replaces the stored card.
    pub async fn upsert_share(&self, share: &TokenShare) -> Result<TokenShare, AppError> {
        let share = sqlx::query_as::<_, TokenShare>(
            r#"
            INSERT INTO token_shares
                (id, token_id, card_id, activation_code, status, shared_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (token_id) DO UPDATE SET
                card_id = EXCLUDED.card_id,
                activation_code = EXCLUDED.activation_code,
                status = EXCLUDED.status,
                shared_at = EXCLUDED.shared_at,
                expires_at = EXCLUDED.expires_at
            RETURNING *
            "#,
        )
        .bind(share.id)
        .bind(share.token_id)
        .bind(&share.card_id)
        .bind(&share.activation_code)
        .bind(share.status)
        .bind(share.shared_at)
        .bind(share.expires_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(share)
    }

    pub async fn get_share_by_token_id(&self, token_id: Uuid) -> Result<Option<TokenShare>, AppError> {
        let share = sqlx::query_as::<_, TokenShare>(
            "SELECT * FROM token_shares WHERE token_id = $1",
        )
        .bind(token_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(share)
    }

    pub async fn update_share_status(&self, token_id: Uuid, status: ShareStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE token_shares SET status = $2 WHERE token_id = $1")
            .bind(token_id)
            .bind(status)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page_params_defaults() {
        assert_eq!(clamp_page_params(None, None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_page_params(Some(0), None), (1, DEFAULT_PAGE_SIZE));
        assert_eq!(clamp_page_params(Some(-3), Some(0)), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_clamp_page_params_bounds() {
        assert_eq!(clamp_page_params(Some(4), Some(50)), (4, 50));
        assert_eq!(clamp_page_params(Some(2), Some(5000)), (2, MAX_PAGE_SIZE));
        assert_eq!(clamp_page_params(Some(1), Some(1)), (1, 1));
    }
}
