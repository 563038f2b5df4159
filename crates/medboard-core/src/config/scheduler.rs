//! Cleanup scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Upper bound for `retention_days` (ten years).
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// Cron schedules and retention window for token cleanup.
///
/// Cron expressions use the six-field form with a leading seconds column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the cleanup scheduler starts with the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Schedule for purging expired tokens (default: daily at 2 AM).
    #[serde(default = "default_expired_purge_cron")]
    pub expired_purge_cron: String,
    /// Schedule for purging tokens past the retention window (default: Sunday 3 AM).
    #[serde(default = "default_stale_purge_cron")]
    pub stale_purge_cron: String,
    /// Schedule for the token statistics snapshot (default: hourly).
    #[serde(default = "default_stats_cron")]
    pub stats_cron: String,
    /// Age in days after which a token is purged regardless of expiry.
    /// Must be between 1 and [`MAX_RETENTION_DAYS`].
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

impl SchedulerConfig {
    /// Reject settings that would make the stale purge unsafe.
    ///
    /// A retention window below one day moves the cutoff to now or into the
    /// future, which would delete tokens that are still valid.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=MAX_RETENTION_DAYS).contains(&self.retention_days) {
            return Err(AppError::configuration(format!(
                "scheduler.retention_days must be between 1 and {MAX_RETENTION_DAYS}, got {}",
                self.retention_days
            )));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            expired_purge_cron: default_expired_purge_cron(),
            stale_purge_cron: default_stale_purge_cron(),
            stats_cron: default_stats_cron(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_expired_purge_cron() -> String {
    "0 0 2 * * *".to_string()
}

fn default_stale_purge_cron() -> String {
    "0 0 3 * * 0".to_string()
}

fn default_stats_cron() -> String {
    "0 0 * * * *".to_string()
}

fn default_retention_days() -> i64 {
    30
}
