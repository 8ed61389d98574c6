//! Background job scheduler
use crate::context::AppContext;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub mod tasks;

/// Interval between database health pings
const HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::refresh_token_purge_job(Arc::clone(&self)));
        tokio::spawn(Self::stale_upload_sweep_job(Arc::clone(&self)));
        tokio::spawn(Self::health_check_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Delete refresh tokens past their expiry
    async fn refresh_token_purge_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.token_purge_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;

            match tasks::purge_expired_refresh_tokens(&scheduler.context).await {
                Ok(count) if count > 0 => info!("Purged {} expired refresh tokens", count),
                Ok(_) => {}
                Err(e) => error!("Failed to purge expired refresh tokens: {}", e),
            }
        }
    }

    /// Remove staging files left by interrupted uploads
    async fn stale_upload_sweep_job(scheduler: Arc<Self>) {
        let period = scheduler.context.config.jobs.temp_sweep_interval_secs;
        let mut interval = interval(Duration::from_secs(period));

        loop {
            interval.tick().await;
            info!("Running stale upload sweep");

            match tasks::sweep_stale_uploads(&scheduler.context).await {
                Ok(count) if count > 0 => info!("Removed {} stale upload files", count),
                Ok(_) => {}
                Err(e) => error!("Failed to sweep stale uploads: {}", e),
            }
        }
    }

    /// Health check job (runs every 5 minutes)
    async fn health_check_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));

        loop {
            interval.tick().await;

            if let Err(e) = tasks::health_check(&scheduler.context).await {
                error!("Health check failed: {}", e);
            }
        }
    }
}
