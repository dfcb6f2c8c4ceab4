//! Post endpoints, including likes and comment creation.

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use gifted_common::AppResult;
use gifted_core::{
    CommentView, CreateCommentInput, CreatePostInput, LikeTarget, LikeToggle, PostView,
    UpdatePostInput, UserProfileView, clamp_limit, media,
};

use crate::{
    extractors::{AuthUser, Pagination, read_upload},
    middleware::AppState,
};

/// Create a post.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreatePostInput>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let post = state.post_service.create(&user.id, req).await?;
    let view = state.feed_service.post_view(&user.id, post).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Partially update a post.
async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdatePostInput>,
) -> AppResult<Json<PostView>> {
    let post = state.post_service.update(&id, &user.id, req).await?;
    let view = state.feed_service.post_view(&user.id, post).await?;
    Ok(Json(view))
}

/// Delete a post.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let post = state.post_service.delete(&id, &user.id).await?;
    if let Some(url) = post.gift_image {
        state.media_service.remove_image(&url).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Upload the gift image of a post.
async fn update_image(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<PostView>> {
    // Ownership before the upload is read
    let post = state.post_service.get_owned(&id, &user.id).await?;
    let previous = post.gift_image.clone();

    let data = read_upload(
        multipart,
        &["gift_image", "file"],
        state.media_service.max_upload_bytes(),
    )
    .await?;
    let url = state
        .media_service
        .store_image(media::GIFT_IMAGES, data)
        .await?;

    let post = state.post_service.set_image(post, url).await?;
    if let Some(previous) = previous {
        state.media_service.remove_image(&previous).await;
    }
    let view = state.feed_service.post_view(&user.id, post).await?;
    Ok(Json(view))
}

/// Like or unlike a post.
async fn toggle_like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<(StatusCode, Json<LikeToggle>)> {
    let result = state
        .like_service
        .toggle_like(&user.id, &LikeTarget::Post(id))
        .await?;

    Ok((like_status(result), Json(result)))
}

/// Users who liked a post.
async fn likes(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Vec<UserProfileView>>> {
    let users = state
        .like_service
        .likers(
            &user.id,
            &id,
            clamp_limit(page.limit),
            page.until_id.as_deref(),
        )
        .await?;

    Ok(Json(users))
}

/// Comment on a post.
async fn create_comment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateCommentInput>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let comment = state.comment_service.create(&user.id, &id, req).await?;
    let view = state.feed_service.comment_view(&user.id, comment).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// 201 when a like was added, 200 when it was removed.
pub(crate) const fn like_status(result: LikeToggle) -> StatusCode {
    if result.liked {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", put(update).delete(delete))
        .route("/{id}/image", put(update_image))
        .route("/like/{id}", post(toggle_like))
        .route("/{id}/likes", get(likes))
        .route("/{id}/comments", post(create_comment))
}
