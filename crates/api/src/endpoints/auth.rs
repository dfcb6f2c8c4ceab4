//! Authentication endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use gifted_common::AppResult;
use gifted_core::RegisterInput;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState};

/// Token response for register and signin.
#[derive(Serialize)]
pub struct TokenResponse {
    pub id: String,
    pub username: String,
    pub token: String,
}

/// Create a new user account.
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterInput>,
) -> AppResult<(StatusCode, Json<TokenResponse>)> {
    let user = state.user_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            id: user.id,
            username: user.username,
            token: user.token.unwrap_or_default(),
        }),
    ))
}

/// Signin request.
#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

/// Sign in to an existing account.
async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> AppResult<Json<TokenResponse>> {
    let user = state
        .user_service
        .authenticate(&req.username, &req.password)
        .await?;

    Ok(Json(TokenResponse {
        id: user.id,
        username: user.username,
        token: user.token.unwrap_or_default(),
    }))
}

/// Sign out, invalidating the current token.
async fn signout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<StatusCode> {
    let user_id = user.id.clone();
    state.user_service.regenerate_token(user).await?;
    tracing::info!(user_id = %user_id, "Signed out");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/signin", post(signin))
        .route("/signout", post(signout))
}
