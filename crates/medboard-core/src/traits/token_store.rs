//! Auxiliary token store used by the cleanup jobs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Point-in-time counts over the token table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStats {
    /// All rows.
    pub total: i64,
    /// Rows whose expiry has passed.
    pub expired: i64,
    /// Rows still valid.
    pub active: i64,
    /// Rows created before the retention cutoff.
    pub old: i64,
}

/// Physical-delete access to ephemeral security tokens.
///
/// Tokens are not user-facing records, so they bypass the soft-delete
/// convention and are removed outright.
#[async_trait]
pub trait TokenStore: Send + Sync + 'static {
    /// Delete every token whose `expires_at` is before `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Delete every token created before `cutoff`, expired or not.
    async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Count tokens by state. Read-only.
    async fn stats(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> AppResult<TokenStats>;
}
