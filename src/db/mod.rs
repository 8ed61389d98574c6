//! Database layer for recorder-vault
//!
//! Manages the SQLite connection pool, embedded migrations and the typed
//! records shared by the session and video stores.

pub mod models;

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// Create a SQLite connection pool
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .foreign_keys(true)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await?;

    tracing::info!(path = %config.path.display(), "database pool ready");

    Ok(pool)
}

/// Run migrations embedded at compile time from ./migrations
pub async fn run_migrations(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;

    Ok(())
}

/// Test database connection
pub async fn test_connection(pool: &SqlitePool) -> AppResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// In-memory pool with the schema applied
///
/// A single connection that never idles out, since every new SQLite
/// memory connection would start from an empty database.
#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(
            <SqliteConnectOptions as std::str::FromStr>::from_str("sqlite::memory:")
                .unwrap()
                .foreign_keys(true),
        )
        .await
        .unwrap();

    run_migrations(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = memory_pool().await;
        test_connection(&pool).await.unwrap();

        for table in ["users", "refresh_tokens", "videos"] {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_create_pool_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested").join("vault.sqlite"),
            max_connections: 2,
        };

        let pool = create_pool(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        test_connection(&pool).await.unwrap();
        assert!(config.path.exists());
    }
}
