//! Cleanup scheduler for recurring token maintenance.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;
use uuid::Uuid;

use medboard_core::AppResult;
use medboard_core::config::SchedulerConfig;
use medboard_core::error::AppError;

use crate::jobs::TokenCleanupJob;

/// Body of a scheduled task. Called once per trigger.
pub type TaskFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Handle to a registered recurring task.
#[async_trait]
pub trait ScheduledTask: Send + Sync {
    /// Task name
    fn name(&self) -> &str;

    /// Stop future triggers. A run already in progress is not interrupted.
    async fn stop(&self) -> AppResult<()>;
}

/// Registers recurring tasks with a timer backend.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Run `task` on the six-field cron schedule `cron`.
    async fn schedule(
        &self,
        name: &str,
        cron: &str,
        task: TaskFn,
    ) -> AppResult<Box<dyn ScheduledTask>>;
}

/// [`TaskRunner`] backed by `tokio-cron-scheduler`
#[derive(Clone)]
pub struct CronTaskRunner {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronTaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronTaskRunner").finish()
    }
}

impl CronTaskRunner {
    /// Create and start the underlying scheduler
    pub async fn new() -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {}", e)))?;

        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(Self { scheduler })
    }

    /// Shut the underlying scheduler down
    pub async fn shutdown(&self) -> AppResult<()> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}

#[async_trait]
impl TaskRunner for CronTaskRunner {
    async fn schedule(
        &self,
        name: &str,
        cron: &str,
        task: TaskFn,
    ) -> AppResult<Box<dyn ScheduledTask>> {
        let job = CronJob::new_async(cron, move |_uuid, _lock| task()).map_err(|e| {
            AppError::internal(format!("Failed to create {} schedule: {}", name, e))
        })?;

        let id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add {} schedule: {}", name, e)))?;

        Ok(Box::new(CronTask {
            name: name.to_string(),
            id,
            scheduler: self.scheduler.clone(),
        }))
    }
}

/// A job registered with [`CronTaskRunner`]
struct CronTask {
    name: String,
    id: Uuid,
    scheduler: JobScheduler,
}

#[async_trait]
impl ScheduledTask for CronTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stop(&self) -> AppResult<()> {
        self.scheduler
            .remove(&self.id)
            .await
            .map_err(|e| AppError::internal(format!("Failed to remove {}: {}", self.name, e)))
    }
}

/// Owns the recurring token cleanup tasks.
///
/// `start` registers the expired purge, the stale purge and the statistics
/// snapshot; `stop` releases them. The guard against double registration
/// is per process.
pub struct CleanupScheduler {
    /// Timer backend
    runner: Arc<dyn TaskRunner>,
    /// Job bodies
    job: TokenCleanupJob,
    /// Schedules
    config: SchedulerConfig,
    /// Registered tasks; empty while stopped
    tasks: Mutex<Vec<Box<dyn ScheduledTask>>>,
}

impl std::fmt::Debug for CleanupScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupScheduler")
            .field("job", &self.job)
            .field("config", &self.config)
            .finish()
    }
}

impl CleanupScheduler {
    /// Create a stopped scheduler
    pub fn new(runner: Arc<dyn TaskRunner>, job: TokenCleanupJob, config: SchedulerConfig) -> Self {
        Self {
            runner,
            job,
            config,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Register all cleanup tasks. Returns the number of registered tasks.
    ///
    /// Calling this while already running logs a warning and changes
    /// nothing. If any registration fails, tasks registered so far are
    /// released and the error is returned.
    pub async fn start(&self) -> AppResult<usize> {
        let mut tasks = self.tasks.lock().await;
        if !tasks.is_empty() {
            tracing::warn!(tasks = tasks.len(), "Cleanup scheduler already running");
            return Ok(tasks.len());
        }

        for (name, cron, body) in self.task_table() {
            match self.runner.schedule(name, cron, body).await {
                Ok(task) => {
                    tracing::info!("Registered: {} ({})", name, cron);
                    tasks.push(task);
                }
                Err(e) => {
                    tracing::error!(task = name, error = %e, "Failed to register cleanup task");
                    release(&mut tasks).await;
                    return Err(e);
                }
            }
        }

        tracing::info!(tasks = tasks.len(), "Cleanup scheduler started");
        Ok(tasks.len())
    }

    /// Release every registered task. Returns how many were released.
    ///
    /// A task that fails to stop is logged and dropped; the rest are still
    /// stopped.
    pub async fn stop(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let count = release(&mut tasks).await;
        tracing::info!(tasks = count, "Cleanup scheduler stopped");
        count
    }

    /// Whether tasks are registered
    pub async fn is_running(&self) -> bool {
        !self.tasks.lock().await.is_empty()
    }

    /// Number of registered tasks
    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    fn task_table(&self) -> [(&'static str, &str, TaskFn); 3] {
        let expired = self.job.clone();
        let stale = self.job.clone();
        let stats = self.job.clone();

        [
            (
                "expired_token_purge",
                self.config.expired_purge_cron.as_str(),
                task_fn(move || {
                    let job = expired.clone();
                    async move {
                        job.purge_expired().await;
                    }
                }),
            ),
            (
                "stale_token_purge",
                self.config.stale_purge_cron.as_str(),
                task_fn(move || {
                    let job = stale.clone();
                    async move {
                        job.purge_stale().await;
                    }
                }),
            ),
            (
                "token_stats_snapshot",
                self.config.stats_cron.as_str(),
                task_fn(move || {
                    let job = stats.clone();
                    async move {
                        job.report_stats().await;
                    }
                }),
            ),
        ]
    }
}

/// Wrap an async closure as a [`TaskFn`].
pub fn task_fn<F, Fut>(f: F) -> TaskFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

async fn release(tasks: &mut Vec<Box<dyn ScheduledTask>>) -> usize {
    let count = tasks.len();
    for task in tasks.drain(..) {
        if let Err(e) = task.stop().await {
            tracing::warn!(task = task.name(), error = %e, "Failed to stop cleanup task");
        }
    }
    count
}
