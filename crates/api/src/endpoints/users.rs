//! User endpoints: the current user, follows and follower lists.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use gifted_common::AppResult;
use gifted_core::{FollowToggle, UpdateUserInput, UserProfileView, clamp_limit, media};
use serde::Serialize;

use crate::{
    extractors::{AuthUser, Pagination, read_upload},
    middleware::AppState,
};

/// Get the current user's profile.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<UserProfileView>> {
    let view = state.user_service.profile_view(&user.id, &user).await?;
    Ok(Json(view))
}

/// Partially update the current user.
async fn update_me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserInput>,
) -> AppResult<Json<UserProfileView>> {
    let user = state.user_service.update(user, req).await?;
    let view = state.user_service.profile_view(&user.id, &user).await?;
    Ok(Json(view))
}

/// Upload a new profile picture.
async fn update_avatar(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<UserProfileView>> {
    let previous = user.profile_picture.clone();
    let data = read_upload(
        multipart,
        &["profile_picture", "file"],
        state.media_service.max_upload_bytes(),
    )
    .await?;

    let url = state
        .media_service
        .store_image(media::PROFILE_PICTURES, data)
        .await?;
    let user = state.user_service.set_profile_picture(user, url).await?;
    if let Some(previous) = previous {
        state.media_service.remove_image(&previous).await;
    }

    let view = state.user_service.profile_view(&user.id, &user).await?;
    Ok(Json(view))
}

/// Follow or unfollow a user.
async fn toggle_follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> AppResult<(StatusCode, Json<FollowToggle>)> {
    let result = state
        .following_service
        .toggle_follow_by_username(&user, &username)
        .await?;

    let status = if result.following {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// Followers list response.
#[derive(Serialize)]
pub struct FollowersResponse {
    pub followers: Vec<UserProfileView>,
}

/// Following list response.
#[derive(Serialize)]
pub struct FollowingResponse {
    pub following: Vec<UserProfileView>,
}

/// Users following `username`.
async fn followers(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<FollowersResponse>> {
    let followers = state
        .following_service
        .followers(
            &user.id,
            &username,
            clamp_limit(page.limit),
            page.until_id.as_deref(),
        )
        .await?;

    Ok(Json(FollowersResponse { followers }))
}

/// Users `username` follows.
async fn following(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<FollowingResponse>> {
    let following = state
        .following_service
        .following(
            &user.id,
            &username,
            clamp_limit(page.limit),
            page.until_id.as_deref(),
        )
        .await?;

    Ok(Json(FollowingResponse { following }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update_me))
        .route("/me/avatar", put(update_avatar))
        .route("/{username}/follow", post(toggle_follow))
        .route("/{username}/followers", get(followers))
        .route("/{username}/following", get(following))
}
