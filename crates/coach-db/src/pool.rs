//! PostgreSQL pool setup

use coach_core::config::DatabaseConfig;
use coach_core::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{info, warn};

/// A seat lock must never queue long behind a busy pool
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Open the pool described by `[database]`, applying migrations when enabled
///
/// ```no_run
/// use coach_core::config::DatabaseConfig;
///
/// # async fn run() -> coach_core::AppResult<()> {
/// let config = DatabaseConfig {
///     url: Some("postgresql://localhost/coach_booking".to_string()),
///     ..Default::default()
/// };
/// let pool = coach_db::connect(&config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(config: &DatabaseConfig) -> AppResult<PgPool> {
    let url = config.url.as_deref().ok_or_else(|| {
        AppError::Config("database.url is required for the postgres backend".into())
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(Some(IDLE_TIMEOUT))
        .test_before_acquire(true)
        .connect(url)
        .await
        .map_err(|e| {
            warn!("Database connection failed: {}", e);
            AppError::Pool(e.to_string())
        })?;

    info!(
        max_connections = config.max_connections,
        "Database pool ready"
    );

    if config.run_migrations {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| AppError::Database(format!("migration failed: {}", e)))?;
        info!("Seat booking schema is up to date");
    }

    Ok(pool)
}
