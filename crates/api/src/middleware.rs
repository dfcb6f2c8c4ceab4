//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use gifted_common::Config;
use gifted_core::{
    CommentService, FeedService, FollowingService, LikeService, MediaService,
    NotificationService, PhoneVerificationService, PostService, SmsService, StorageService,
    UserService,
};
use gifted_db::repositories::{
    CommentLikeRepository, CommentRepository, FollowRepository, NotificationRepository,
    PostLikeRepository, PostRepository, UserRepository,
};
use sea_orm::DatabaseConnection;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub post_service: PostService,
    pub comment_service: CommentService,
    pub like_service: LikeService,
    pub following_service: FollowingService,
    pub notification_service: NotificationService,
    pub feed_service: FeedService,
    pub media_service: MediaService,
    pub verification_service: PhoneVerificationService,
}

impl AppState {
    /// Wire repositories and services over one database connection.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: &Config,
        storage: StorageService,
        sms: SmsService,
    ) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let follow_repo = FollowRepository::new(Arc::clone(&db));
        let post_repo = PostRepository::new(Arc::clone(&db));
        let comment_repo = CommentRepository::new(Arc::clone(&db));
        let post_like_repo = PostLikeRepository::new(Arc::clone(&db));
        let comment_like_repo = CommentLikeRepository::new(Arc::clone(&db));
        let notification_repo = NotificationRepository::new(Arc::clone(&db));

        let user_service = UserService::new(user_repo.clone(), follow_repo.clone());
        let notification_service =
            NotificationService::new(notification_repo, post_repo.clone(), user_service.clone());

        Self {
            post_service: PostService::new(post_repo.clone()),
            comment_service: CommentService::new(
                comment_repo.clone(),
                post_repo.clone(),
                notification_service.clone(),
            ),
            like_service: LikeService::new(
                post_repo.clone(),
                comment_repo.clone(),
                post_like_repo.clone(),
                comment_like_repo.clone(),
                notification_service.clone(),
                user_service.clone(),
            ),
            following_service: FollowingService::new(
                follow_repo.clone(),
                user_repo.clone(),
                user_service.clone(),
                notification_service.clone(),
            ),
            feed_service: FeedService::new(
                post_repo,
                comment_repo,
                post_like_repo,
                comment_like_repo,
                follow_repo,
                user_repo.clone(),
                user_service.clone(),
            ),
            media_service: MediaService::new(config.media.clone(), storage),
            verification_service: PhoneVerificationService::new(
                user_repo,
                sms,
                config.verification.code_ttl_minutes,
            ),
            notification_service,
            user_service,
        }
    }
}

/// Authentication middleware.
///
/// Resolves `Authorization: Bearer <token>` (or `Token <token>`) to a user and
/// stores it in the request extensions. Requests without a valid token pass
/// through unauthenticated; handlers that need a user reject them.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("Token ")))
        .map(|t| t.trim().to_string());

    if let Some(token) = token {
        match state.user_service.authenticate_by_token(&token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e) if e.is_server_error() => {
                tracing::error!(error = %e, "Token lookup failed");
            }
            Err(_) => {
                tracing::debug!("Rejected unknown token");
            }
        }
    }

    next.run(req).await
}
