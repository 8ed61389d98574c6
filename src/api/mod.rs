//! API routes and handlers
pub mod auth;
pub mod middleware;
pub mod videos;

use crate::context::AppContext;
use axum::Router;

/// Build API routes
pub fn routes(max_upload_bytes: u64) -> Router<AppContext> {
    Router::new()
        .merge(auth::routes())
        .merge(videos::routes(max_upload_bytes))
}
