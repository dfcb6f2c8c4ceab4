//! Notification endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use gifted_common::AppResult;
use gifted_core::{NotificationPage, clamp_limit};
use serde::Serialize;

use crate::{
    extractors::{AuthUser, Pagination},
    middleware::AppState,
};

/// List the current user's notifications with their unread count.
async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<NotificationPage>> {
    let page = state
        .notification_service
        .page(&user.id, clamp_limit(page.limit), page.until_id.as_deref())
        .await?;

    Ok(Json(page))
}

/// Mark-read response.
#[derive(Serialize)]
pub struct MarkReadResponse {
    pub message: &'static str,
}

/// Mark one notification as read.
async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<MarkReadResponse>> {
    state.notification_service.mark_read(&id, &user.id).await?;

    Ok(Json(MarkReadResponse {
        message: "Notification marked as read",
    }))
}

/// Mark-all-read response.
#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub marked_read: u64,
}

/// Mark every notification of the current user as read.
async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<MarkAllReadResponse>> {
    let marked_read = state.notification_service.mark_all_read(&user.id).await?;
    Ok(Json(MarkAllReadResponse { marked_read }))
}

/// Delete a notification.
async fn remove(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.notification_service.delete(&id, &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/read_all", post(mark_all_read))
        .route("/{id}/read", post(mark_read))
        .route("/{id}", delete(remove))
}
