//! Application context and dependency injection
use crate::{
    config::ServerConfig,
    crypto::password::PasswordHasher,
    db,
    error::AppResult,
    session::{signer::TokenSigner, SessionService},
    video_store::VideoStore,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub sessions: Arc<SessionService>,
    pub videos: Arc<VideoStore>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        let db = db::create_pool(&config.database).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        Self::with_pool(config, db, PasswordHasher::new()).await
    }

    /// Wire services around an already migrated pool
    pub async fn with_pool(
        config: ServerConfig,
        db: SqlitePool,
        hasher: PasswordHasher,
    ) -> AppResult<Self> {
        let signer = Arc::new(TokenSigner::new(&config.authentication));
        let sessions = Arc::new(SessionService::new(
            db.clone(),
            signer,
            &config.authentication,
            hasher,
        )?);

        let videos = Arc::new(VideoStore::new(&config.storage, db.clone()));
        videos.ensure_directories().await?;

        Ok(Self {
            config: Arc::new(config),
            db,
            sessions,
            videos,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}

#[cfg(test)]
impl AppContext {
    /// Context over an in-memory database and a cheap password hasher
    pub async fn for_tests(upload_dir: std::path::PathBuf) -> Self {
        let config = ServerConfig::for_tests(upload_dir);
        Self::with_pool(config, db::memory_pool().await, PasswordHasher::for_tests())
            .await
            .unwrap()
    }
}
