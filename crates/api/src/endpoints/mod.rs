//! API endpoints.

mod auth;
mod comments;
mod feed;
mod notifications;
mod posts;
mod users;
mod verification;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/verify_phone", verification::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/notifications", notifications::router())
        .merge(feed::router())
}
