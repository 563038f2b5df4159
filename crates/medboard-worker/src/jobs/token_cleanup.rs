//! Refresh token purge and statistics jobs.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing;

use medboard_core::AppResult;
use medboard_core::error::AppError;
use medboard_core::traits::{TokenStats, TokenStore};

/// Hard-deletes expired and stale tokens, and reports table counts.
///
/// Every method catches and logs its own errors so a failed run never
/// reaches the scheduler; the return value is only for callers that care.
#[derive(Clone)]
pub struct TokenCleanupJob {
    /// Token storage
    store: Arc<dyn TokenStore>,
    /// Tokens created longer ago than this are purged
    retention: Duration,
}

impl std::fmt::Debug for TokenCleanupJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCleanupJob")
            .field("retention_days", &self.retention.num_days())
            .finish()
    }
}

impl TokenCleanupJob {
    /// Create a new cleanup job.
    ///
    /// `retention_days` must be positive and representable as a duration.
    pub fn new(store: Arc<dyn TokenStore>, retention_days: i64) -> AppResult<Self> {
        let retention = Duration::try_days(retention_days)
            .filter(|_| retention_days >= 1)
            .ok_or_else(|| {
                AppError::configuration(format!("Invalid token retention: {retention_days} days"))
            })?;

        Ok(Self { store, retention })
    }

    /// Delete tokens whose expiry has passed
    pub async fn purge_expired(&self) -> Option<u64> {
        tracing::info!("Running expired token purge");

        match self.store.purge_expired(Utc::now()).await {
            Ok(count) => {
                tracing::info!(removed = count, "Purged expired tokens");
                Some(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "Expired token purge failed");
                None
            }
        }
    }

    /// Delete tokens older than the retention window, expired or not
    pub async fn purge_stale(&self) -> Option<u64> {
        let cutoff = Utc::now() - self.retention;
        tracing::info!(%cutoff, "Running stale token purge");

        match self.store.purge_created_before(cutoff).await {
            Ok(count) => {
                tracing::info!(removed = count, "Purged stale tokens");
                Some(count)
            }
            Err(e) => {
                tracing::error!(error = %e, "Stale token purge failed");
                None
            }
        }
    }

    /// Log token counts. Read-only.
    pub async fn report_stats(&self) -> Option<TokenStats> {
        let now = Utc::now();

        match self.store.stats(now, now - self.retention).await {
            Ok(stats) => {
                tracing::info!(
                    total = stats.total,
                    expired = stats.expired,
                    active = stats.active,
                    old = stats.old,
                    "Token statistics"
                );
                Some(stats)
            }
            Err(e) => {
                tracing::error!(error = %e, "Token statistics query failed");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use medboard_core::error::ErrorKind;

    use super::*;

    /// In-memory token table: `(created_at, expires_at)` per row.
    #[derive(Default)]
    pub(crate) struct MemoryTokenStore {
        pub(crate) rows: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl TokenStore for MemoryTokenStore {
        async fn purge_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
            if self.fail {
                return Err(AppError::database("connection reset"));
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|(_, expires)| *expires >= now);
            Ok((before - rows.len()) as u64)
        }

        async fn purge_created_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
            if self.fail {
                return Err(AppError::database("connection reset"));
            }
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|(created, _)| *created >= cutoff);
            Ok((before - rows.len()) as u64)
        }

        async fn stats(&self, now: DateTime<Utc>, cutoff: DateTime<Utc>) -> AppResult<TokenStats> {
            if self.fail {
                return Err(AppError::database("connection reset"));
            }
            let rows = self.rows.lock().unwrap();
            let expired = rows.iter().filter(|(_, e)| *e < now).count() as i64;
            Ok(TokenStats {
                total: rows.len() as i64,
                expired,
                active: rows.len() as i64 - expired,
                old: rows.iter().filter(|(c, _)| *c < cutoff).count() as i64,
            })
        }
    }

    fn seeded() -> Arc<MemoryTokenStore> {
        let now = Utc::now();
        let store = MemoryTokenStore::default();
        store.rows.lock().unwrap().extend([
            // expired yesterday
            (now - Duration::days(8), now - Duration::days(1)),
            // valid, but created 40 days ago
            (now - Duration::days(40), now + Duration::days(1)),
            // valid and recent
            (now - Duration::hours(1), now + Duration::days(7)),
        ]);
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_expired_purge_is_idempotent() {
        let job = TokenCleanupJob::new(seeded(), 30).unwrap();

        assert_eq!(job.purge_expired().await, Some(1));
        assert_eq!(job.purge_expired().await, Some(0));
    }

    #[tokio::test]
    async fn test_stale_purge_uses_retention_window() {
        let store = seeded();
        let job = TokenCleanupJob::new(store.clone(), 30).unwrap();

        assert_eq!(job.purge_stale().await, Some(1));
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let job = TokenCleanupJob::new(seeded(), 30).unwrap();

        let stats = job.report_stats().await.unwrap();
        assert_eq!(
            stats,
            TokenStats {
                total: 3,
                expired: 1,
                active: 2,
                old: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_store_errors_are_swallowed() {
        let store = Arc::new(MemoryTokenStore {
            fail: true,
            ..MemoryTokenStore::default()
        });
        let job = TokenCleanupJob::new(store, 30).unwrap();

        assert_eq!(job.purge_expired().await, None);
        assert_eq!(job.purge_stale().await, None);
        assert_eq!(job.report_stats().await, None);
    }

    #[tokio::test]
    async fn test_invalid_retention_is_rejected() {
        for days in [0, -1, i64::MAX] {
            let err = TokenCleanupJob::new(seeded(), days).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Configuration);
        }
    }

    #[tokio::test]
    async fn test_one_day_retention_keeps_fresh_tokens() {
        let store = seeded();
        let job = TokenCleanupJob::new(store.clone(), 1).unwrap();

        assert_eq!(job.purge_stale().await, Some(2));
        assert_eq!(store.rows.lock().unwrap().len(), 1);
    }
}
