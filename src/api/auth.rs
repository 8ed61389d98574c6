//! Signup, login and refresh endpoints
use crate::{
    context::AppContext,
    error::AppResult,
    session::{LoginRequest, RefreshRequest, SignupRequest, SignupResponse, TokenPair},
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

/// Create an account
async fn signup(
    State(ctx): State<AppContext>,
    Json(req): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<SignupResponse>)> {
    let id = ctx
        .sessions
        .signup(&req.email, &req.username, &req.password)
        .await?;

    Ok((StatusCode::CREATED, Json(SignupResponse { id })))
}

/// Exchange credentials for an access token and refresh token
async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let tokens = ctx.sessions.login(&req.email, &req.password).await?;

    Ok(Json(tokens))
}

/// Exchange a refresh token for a new access token
///
/// With `account_id` the token must belong to that account and is echoed
/// back; without it the owner is looked up and a new refresh token issued.
async fn refresh(
    State(ctx): State<AppContext>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let tokens = match req.account_id {
        Some(account) => ctx.sessions.refresh(account, &req.refresh_token).await?,
        None => ctx.sessions.refresh_with_token(&req.refresh_token).await?,
    };

    Ok(Json(tokens))
}
