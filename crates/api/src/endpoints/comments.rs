//! Comment endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
};
use gifted_common::AppResult;
use gifted_core::{CommentView, LikeTarget, LikeToggle, UpdateCommentInput};

use crate::{endpoints::posts::like_status, extractors::AuthUser, middleware::AppState};

/// Edit a comment.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCommentInput>,
) -> AppResult<Json<CommentView>> {
    let comment = state.comment_service.update(&id, &user.id, req).await?;
    let view = state.feed_service.comment_view(&user.id, comment).await?;
    Ok(Json(view))
}

/// Delete a comment.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.comment_service.delete(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Like or unlike a comment.
async fn toggle_like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<LikeToggle>)> {
    let result = state
        .like_service
        .toggle_like(&user.id, &LikeTarget::Comment(id))
        .await?;

    Ok((like_status(result), Json(result)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(update).patch(update).delete(delete))
        .route("/{id}/like", post(toggle_like))
}
