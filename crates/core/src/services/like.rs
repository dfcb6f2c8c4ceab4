//! Like toggles for posts and comments.

use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::{comment_like, notification::NotificationType, post_like},
    repositories::{CommentLikeRepository, CommentRepository, PostLikeRepository, PostRepository},
};
use sea_orm::Set;
use serde::Serialize;

use crate::services::notification::NotificationService;
use crate::services::user::{UserProfileView, UserService};

/// What a like points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikeTarget {
    Post(String),
    Comment(String),
}

/// Like state after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
}

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    post_repo: PostRepository,
    comment_repo: CommentRepository,
    post_like_repo: PostLikeRepository,
    comment_like_repo: CommentLikeRepository,
    notifications: NotificationService,
    users: UserService,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        comment_repo: CommentRepository,
        post_like_repo: PostLikeRepository,
        comment_like_repo: CommentLikeRepository,
        notifications: NotificationService,
        users: UserService,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            post_like_repo,
            comment_like_repo,
            notifications,
            users,
            id_gen: IdGenerator::new(),
        }
    }

    /// Like the target if the actor has not liked it yet, otherwise remove the like.
    ///
    /// Liking notifies the owner of the target; unliking removes that
    /// notification again. A like inserted concurrently by another request
    /// still reports `liked: true`.
    pub async fn toggle_like(&self, actor_id: &str, target: &LikeTarget) -> AppResult<LikeToggle> {
        let liked = match target {
            LikeTarget::Post(post_id) => self.toggle_post_like(actor_id, post_id).await?,
            LikeTarget::Comment(comment_id) => {
                self.toggle_comment_like(actor_id, comment_id).await?
            }
        };

        tracing::info!(actor_id = %actor_id, target = ?target, liked, "Like toggled");
        Ok(LikeToggle { liked })
    }

    async fn toggle_post_like(&self, actor_id: &str, post_id: &str) -> AppResult<bool> {
        let post = self.post_repo.get_by_id(post_id).await?;

        if self
            .post_like_repo
            .find_by_pair(actor_id, &post.id)
            .await?
            .is_some()
        {
            self.post_like_repo
                .unlike(actor_id, &post.id, &post.author_id)
                .await?;
            return Ok(false);
        }

        let edge = post_like::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(actor_id.to_string()),
            post_id: Set(post.id.clone()),
            created_at: Set(Utc::now().into()),
        };
        let notification = self.notifications.build(
            &post.author_id,
            actor_id,
            NotificationType::LikePost,
            Some(&post.id),
            None,
        );

        absorb_conflict(self.post_like_repo.like(edge, notification).await)
    }

    async fn toggle_comment_like(&self, actor_id: &str, comment_id: &str) -> AppResult<bool> {
        let comment = self.comment_repo.get_by_id(comment_id).await?;

        if self
            .comment_like_repo
            .find_by_pair(actor_id, &comment.id)
            .await?
            .is_some()
        {
            self.comment_like_repo
                .unlike(actor_id, &comment.id, &comment.author_id)
                .await?;
            return Ok(false);
        }

        let edge = comment_like::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(actor_id.to_string()),
            comment_id: Set(comment.id.clone()),
            created_at: Set(Utc::now().into()),
        };
        let notification = self.notifications.build(
            &comment.author_id,
            actor_id,
            NotificationType::LikeComment,
            Some(&comment.post_id),
            Some(&comment.id),
        );

        absorb_conflict(self.comment_like_repo.like(edge, notification).await)
    }

    /// Profiles of the users who liked a post, most recent like first.
    pub async fn likers(
        &self,
        viewer_id: &str,
        post_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<UserProfileView>> {
        let post = self.post_repo.get_by_id(post_id).await?;
        let likes = self
            .post_like_repo
            .find_by_post(&post.id, limit, until_id)
            .await?;

        let ids: Vec<String> = likes.iter().map(|l| l.user_id.clone()).collect();
        let mut views = self.users.profile_views_by_id(viewer_id, &ids).await?;

        Ok(ids.iter().filter_map(|id| views.remove(id)).collect())
    }
}

/// A duplicate insert means the like already exists; the losing transaction
/// wrote nothing, so no second notification was stored.
fn absorb_conflict<T>(result: AppResult<T>) -> AppResult<bool> {
    match result {
        Ok(_) => Ok(true),
        Err(AppError::Conflict(_)) => {
            tracing::debug!("Concurrent like absorbed");
            Ok(true)
        }
        Err(e) => Err(e),
    }
}
