//! Authentication extractor for protected routes
use crate::{
    api::middleware::extract_bearer_token, context::AppContext, db::models::AccountId,
    error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, resolved from a Bearer access token
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub account: AccountId,
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let account = state.sessions.authenticate(token)?;

        Ok(AuthContext { account })
    }
}
