//! Home feed and profile pages.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use gifted_common::AppResult;
use gifted_core::{FeedFilter, PostView, ProfileView, clamp_limit};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, Pagination},
    middleware::AppState,
};

/// Home feed query.
#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    pub filter: FeedFilter,
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Newest posts from everyone, or from followed users only.
async fn home(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let posts = state
        .feed_service
        .home_feed(
            &user.id,
            query.filter,
            clamp_limit(query.limit),
            query.until_id.as_deref(),
        )
        .await?;

    Ok(Json(posts))
}

/// A user's profile page.
async fn profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<ProfileView>> {
    let profile = state
        .feed_service
        .profile(
            &user.id,
            &username,
            clamp_limit(page.limit),
            page.until_id.as_deref(),
        )
        .await?;

    Ok(Json(profile))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/home", get(home))
        .route("/profile/{username}", get(profile))
}
