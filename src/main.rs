//! MedBoard Server: job-board backend
//!
//! Wires configuration, database, email delivery, and the token cleanup
//! scheduler together, then runs until a shutdown signal arrives.

use std::sync::Arc;

use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use medboard_core::config::AppConfig;
use medboard_core::error::AppError;
use medboard_database::DatabasePool;
use medboard_database::repositories::RefreshTokenRepository;
use medboard_notification::{
    EmailService, NotificationDispatcher, TemplateRenderer, TemplateStore, transport_from_config,
};
use medboard_worker::{CleanupScheduler, CronTaskRunner, TokenCleanupJob};

#[tokio::main]
async fn main() {
    let env = std::env::var("MEDBOARD_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!("Loaded configuration (env: {})", env);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MedBoard v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Database connection + migrations ─────────────────
    tracing::info!("Connecting to database...");
    let db = DatabasePool::connect(&config.database).await?;

    tracing::info!("Running database migrations...");
    medboard_database::migration::run_migrations(db.pool()).await?;
    tracing::info!("Database migrations complete");

    if !db.health_check().await? {
        return Err(AppError::database("Database health check returned an unexpected value"));
    }

    // ── Step 2: Email delivery ───────────────────────────────────
    let store = Arc::new(TemplateStore::new(&config.templates.directory));
    let renderer = TemplateRenderer::new(store, config.email.site_url.clone());
    let dispatcher = NotificationDispatcher::new(transport_from_config(&config.email));
    let email_service = EmailService::new(dispatcher, renderer);
    tracing::info!(
        simulated = email_service.dispatcher().is_simulated(),
        "Email service initialized"
    );

    // ── Step 3: Token cleanup scheduler ──────────────────────────
    let token_repo = Arc::new(RefreshTokenRepository::new(db.pool().clone()));
    let runner = Arc::new(CronTaskRunner::new().await?);
    let scheduler = CleanupScheduler::new(
        runner.clone(),
        TokenCleanupJob::new(token_repo, config.scheduler.retention_days)?,
        config.scheduler.clone(),
    );

    if config.scheduler.enabled {
        scheduler.start().await?;
    } else {
        tracing::info!("Cleanup scheduler disabled");
    }

    tracing::info!("MedBoard server running");

    // ── Step 4: Graceful shutdown ────────────────────────────────
    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    scheduler.stop().await;
    if let Err(e) = runner.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    db.close().await;

    tracing::info!("MedBoard server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
