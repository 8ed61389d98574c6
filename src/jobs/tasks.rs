//! Background task implementations
use crate::{context::AppContext, db, error::AppResult};
use chrono::Utc;
use std::time::Duration;

/// Staging files older than this belong to uploads that will never finish
pub const STALE_UPLOAD_AGE: Duration = Duration::from_secs(24 * 3600);

/// Delete refresh tokens whose expiry has passed
pub async fn purge_expired_refresh_tokens(ctx: &AppContext) -> AppResult<u64> {
    ctx.sessions.purge_expired_refresh_tokens(Utc::now()).await
}

/// Delete abandoned upload staging files
pub async fn sweep_stale_uploads(ctx: &AppContext) -> AppResult<u64> {
    ctx.videos.sweep_stale_uploads(STALE_UPLOAD_AGE).await
}

/// Verify database connectivity
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    db::test_connection(&ctx.db).await
}
