//! Refresh token repository implementation.
//!
//! Refresh tokens are hard-deleted: they are short-lived credentials, not
//! user-facing records, and keeping them around has no value.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use medboard_core::error::{AppError, ErrorKind};
use medboard_core::result::AppResult;
use medboard_core::traits::{TokenStats, TokenStore};
use medboard_entity::token::RefreshToken;

/// Repository for the `refresh_tokens` table.
#[derive(Debug, Clone)]
pub struct RefreshTokenRepository {
    pool: PgPool,
}

impl RefreshTokenRepository {
    /// Create a new refresh token repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a newly issued token.
    pub async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create refresh token", e))
    }

    /// Find a token by its hash.
    pub async fn find_by_hash(&self, token_hash: &str) -> AppResult<Option<RefreshToken>> {
        sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find refresh token", e)
            })
    }
}

#[async_trait]
impl TokenStore for RefreshTokenRepository {
    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge expired tokens", e)
            })?;

        debug!(deleted = result.rows_affected(), "Purged expired refresh tokens");
        Ok(result.rows_affected())
    }

    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to purge old tokens", e)
            })?;

        debug!(deleted = result.rows_affected(), %cutoff, "Purged old refresh tokens");
        Ok(result.rows_affected())
    }

    async fn stats(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> AppResult<TokenStats> {
        let (total, expired, active, old): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COUNT(*) FILTER (WHERE expires_at < $1), \
                    COUNT(*) FILTER (WHERE expires_at >= $1), \
                    COUNT(*) FILTER (WHERE created_at < $2) \
             FROM refresh_tokens",
        )
        .bind(now)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count tokens", e))?;

        Ok(TokenStats {
            total,
            expired,
            active,
            old,
        })
    }
}
