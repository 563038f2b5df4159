//! Scheduled maintenance for MedBoard.
//!
//! This crate provides:
//! - A cleanup scheduler that owns the registry of recurring tasks
//! - A cron-backed task runner on top of `tokio-cron-scheduler`
//! - Token cleanup jobs (expired purge, stale purge, statistics snapshot)

pub mod jobs;
pub mod scheduler;

pub use jobs::TokenCleanupJob;
pub use scheduler::{CleanupScheduler, CronTaskRunner, ScheduledTask, TaskFn, TaskRunner, task_fn};
