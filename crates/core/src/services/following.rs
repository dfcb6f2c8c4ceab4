//! Following service.

use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::{follow, notification::NotificationType, user},
    repositories::{FollowRepository, UserRepository},
};
use sea_orm::Set;
use serde::Serialize;

use crate::services::notification::NotificationService;
use crate::services::user::{UserProfileView, UserService};

/// Follow state after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FollowToggle {
    pub following: bool,
}

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    users: UserService,
    notifications: NotificationService,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service.
    #[must_use]
    pub const fn new(
        follow_repo: FollowRepository,
        user_repo: UserRepository,
        users: UserService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            follow_repo,
            user_repo,
            users,
            notifications,
            id_gen: IdGenerator::new(),
        }
    }

    /// Follow the target user, or unfollow if already following.
    pub async fn toggle_follow(&self, actor_id: &str, target_id: &str) -> AppResult<FollowToggle> {
        if actor_id == target_id {
            return Err(cannot_follow_self());
        }

        let target = self.user_repo.get_by_id(target_id).await?;
        self.toggle(actor_id, &target).await
    }

    /// [`Self::toggle_follow`] with the target addressed by username.
    pub async fn toggle_follow_by_username(
        &self,
        actor: &user::Model,
        username: &str,
    ) -> AppResult<FollowToggle> {
        if actor.username_lower == username.to_lowercase() {
            return Err(cannot_follow_self());
        }

        let target = self.user_repo.get_by_username(username).await?;
        if target.id == actor.id {
            return Err(cannot_follow_self());
        }
        self.toggle(&actor.id, &target).await
    }

    async fn toggle(&self, actor_id: &str, target: &user::Model) -> AppResult<FollowToggle> {
        let following = if self
            .follow_repo
            .is_following(actor_id, &target.id)
            .await?
        {
            self.follow_repo.unfollow(actor_id, &target.id).await?;
            false
        } else {
            let edge = follow::ActiveModel {
                id: Set(self.id_gen.generate()),
                follower_id: Set(actor_id.to_string()),
                following_id: Set(target.id.clone()),
                created_at: Set(Utc::now().into()),
            };
            let notification =
                self.notifications
                    .build(&target.id, actor_id, NotificationType::Follow, None, None);

            match self.follow_repo.follow(edge, notification).await {
                Ok(_) => {}
                Err(AppError::Conflict(_)) => {
                    tracing::debug!(actor_id = %actor_id, "Concurrent follow absorbed");
                }
                Err(e) => return Err(e),
            }
            true
        };

        tracing::info!(
            actor_id = %actor_id,
            target_id = %target.id,
            following,
            "Follow toggled"
        );
        Ok(FollowToggle { following })
    }

    /// Profiles of the users following `username`, newest follower first.
    pub async fn followers(
        &self,
        viewer_id: &str,
        username: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<UserProfileView>> {
        let user = self.user_repo.get_by_username(username).await?;
        let edges = self
            .follow_repo
            .find_followers(&user.id, limit, until_id)
            .await?;

        let ids: Vec<String> = edges.into_iter().map(|f| f.follower_id).collect();
        self.ordered_views(viewer_id, &ids).await
    }

    /// Profiles of the users `username` follows, most recent first.
    pub async fn following(
        &self,
        viewer_id: &str,
        username: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<UserProfileView>> {
        let user = self.user_repo.get_by_username(username).await?;
        let edges = self
            .follow_repo
            .find_following(&user.id, limit, until_id)
            .await?;

        let ids: Vec<String> = edges.into_iter().map(|f| f.following_id).collect();
        self.ordered_views(viewer_id, &ids).await
    }

    async fn ordered_views(
        &self,
        viewer_id: &str,
        ids: &[String],
    ) -> AppResult<Vec<UserProfileView>> {
        let mut views = self.users.profile_views_by_id(viewer_id, ids).await?;
        Ok(ids.iter().filter_map(|id| views.remove(id)).collect())
    }
}

fn cannot_follow_self() -> AppError {
    AppError::InvalidOperation("You cannot follow yourself".to_string())
}
