//! Notification service.

use std::collections::HashMap;

use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::notification::{self, NotificationType},
    repositories::{NotificationRepository, PostRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::Serialize;

use crate::services::user::{UserProfileView, UserService};

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    post_repo: PostRepository,
    users: UserService,
    id_gen: IdGenerator,
}

/// Short description of the post a notification points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPreview {
    pub id: String,
    pub what: String,
}

/// A notification as shown to its recipient.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub id: String,
    pub sender: UserProfileView,
    pub notification_type: NotificationType,
    pub post: Option<String>,
    pub comment: Option<String>,
    pub post_preview: Option<PostPreview>,
    pub is_read: bool,
    pub created_at: DateTimeWithTimeZone,
}

/// One page of notifications plus the recipient's total unread count.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationView>,
    pub unread_count: u64,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(
        notification_repo: NotificationRepository,
        post_repo: PostRepository,
        users: UserService,
    ) -> Self {
        Self {
            notification_repo,
            post_repo,
            users,
            id_gen: IdGenerator::new(),
        }
    }

    /// Build an unsaved notification row.
    ///
    /// Returns `None` when the sender is the recipient; nobody is notified
    /// about their own actions.
    #[must_use]
    pub fn build(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        post_id: Option<&str>,
        comment_id: Option<&str>,
    ) -> Option<notification::ActiveModel> {
        if recipient_id == sender_id {
            return None;
        }

        Some(notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            recipient_id: Set(recipient_id.to_string()),
            sender_id: Set(sender_id.to_string()),
            notification_type: Set(notification_type),
            post_id: Set(post_id.map(str::to_string)),
            comment_id: Set(comment_id.map(str::to_string)),
            is_read: Set(false),
            created_at: Set(Utc::now().into()),
        })
    }

    /// Create and store a notification. Writes nothing for self-notifications.
    pub async fn create(
        &self,
        recipient_id: &str,
        sender_id: &str,
        notification_type: NotificationType,
        post_id: Option<&str>,
        comment_id: Option<&str>,
    ) -> AppResult<Option<notification::Model>> {
        let Some(model) = self.build(
            recipient_id,
            sender_id,
            notification_type,
            post_id,
            comment_id,
        ) else {
            return Ok(None);
        };

        let created = self.notification_repo.create(model).await?;
        tracing::debug!(
            notification_id = %created.id,
            recipient_id = %recipient_id,
            kind = ?notification_type,
            "Notification created"
        );

        Ok(Some(created))
    }

    /// Newest notifications of a user and their unread count.
    ///
    /// The count covers every unread notification of the user, not just the
    /// returned page.
    pub async fn list(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<(Vec<notification::Model>, u64)> {
        let notifications = self
            .notification_repo
            .find_by_recipient(user_id, limit, until_id)
            .await?;
        let unread_count = self.notification_repo.count_unread(user_id).await?;

        Ok((notifications, unread_count))
    }

    /// Like [`Self::list`], with senders and post previews resolved.
    pub async fn page(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<NotificationPage> {
        let (notifications, unread_count) = self.list(user_id, limit, until_id).await?;
        let notifications = self.views(user_id, notifications).await?;

        Ok(NotificationPage {
            notifications,
            unread_count,
        })
    }

    /// Resolve sender profiles and post previews for a batch of notifications.
    pub async fn views(
        &self,
        viewer_id: &str,
        notifications: Vec<notification::Model>,
    ) -> AppResult<Vec<NotificationView>> {
        let mut sender_ids: Vec<String> =
            notifications.iter().map(|n| n.sender_id.clone()).collect();
        sender_ids.sort();
        sender_ids.dedup();

        let mut post_ids: Vec<String> = notifications
            .iter()
            .filter_map(|n| n.post_id.clone())
            .collect();
        post_ids.sort();
        post_ids.dedup();

        let senders = self.users.profile_views_by_id(viewer_id, &sender_ids).await?;
        let previews: HashMap<String, PostPreview> = self
            .post_repo
            .find_by_ids(&post_ids)
            .await?
            .into_iter()
            .map(|p| {
                (
                    p.id.clone(),
                    PostPreview {
                        id: p.id,
                        what: p.what,
                    },
                )
            })
            .collect();

        Ok(notifications
            .into_iter()
            .filter_map(|n| {
                let Some(sender) = senders.get(&n.sender_id).cloned() else {
                    tracing::warn!(notification_id = %n.id, "Notification sender missing");
                    return None;
                };
                let post_preview = n.post_id.as_ref().and_then(|id| previews.get(id).cloned());
                Some(NotificationView {
                    id: n.id,
                    sender,
                    notification_type: n.notification_type,
                    post: n.post_id,
                    comment: n.comment_id,
                    post_preview,
                    is_read: n.is_read,
                    created_at: n.created_at,
                })
            })
            .collect())
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_read(&self, id: &str, user_id: &str) -> AppResult<notification::Model> {
        let notification = self.get_owned(id, user_id).await?;
        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark every unread notification of the user as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Delete one of the user's notifications.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<()> {
        let notification = self.get_owned(id, user_id).await?;
        self.notification_repo.delete(&notification.id).await
    }

    /// Notifications of other users are reported as missing.
    async fn get_owned(&self, id: &str, user_id: &str) -> AppResult<notification::Model> {
        self.notification_repo
            .find_for_recipient(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gifted_db::repositories::{FollowRepository, UserRepository};
    use maplit::btreemap;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> NotificationService {
        let db = Arc::new(db);
        let users = UserService::new(
            UserRepository::new(Arc::clone(&db)),
            FollowRepository::new(Arc::clone(&db)),
        );
        NotificationService::new(
            NotificationRepository::new(Arc::clone(&db)),
            PostRepository::new(db),
            users,
        )
    }

    fn create_test_notification(id: &str, recipient_id: &str) -> notification::Model {
        notification::Model {
            id: id.to_string(),
            recipient_id: recipient_id.to_string(),
            sender_id: "sender".to_string(),
            notification_type: NotificationType::LikePost,
            post_id: Some("p1".to_string()),
            comment_id: None,
            is_read: false,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_build_skips_self_notification() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        assert!(
            svc.build("u1", "u1", NotificationType::Follow, None, None)
                .is_none()
        );
        assert!(
            svc.build("u1", "u2", NotificationType::Follow, None, None)
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_create_self_notification_writes_nothing() {
        // No results queued: any query would fail the test.
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let result = svc
            .create("u1", "u1", NotificationType::LikePost, Some("p1"), None)
            .await
            .unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_notification() {
        let stored = create_test_notification("n1", "u2");
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[stored]])
                .into_connection(),
        );

        let result = svc
            .create("u2", "sender", NotificationType::LikePost, Some("p1"), None)
            .await
            .unwrap();

        assert_eq!(result.unwrap().recipient_id, "u2");
    }

    #[tokio::test]
    async fn test_list_counts_all_unread() {
        let n1 = create_test_notification("n1", "u1");

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n1]])
                .append_query_results([[btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(4)),
                }]])
                .into_connection(),
        );

        let (items, unread) = svc.list("u1", 1, None).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(unread, 4);
    }

    #[tokio::test]
    async fn test_mark_read_other_users_notification() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<notification::Model>::new()])
                .into_connection(),
        );

        let result = svc.mark_read("n1", "intruder").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_own_notification() {
        let n1 = create_test_notification("n1", "u1");

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[n1]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        assert!(svc.delete("n1", "u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_views_of_empty_page_skip_queries() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let views = svc.views("u1", vec![]).await.unwrap();
        assert!(views.is_empty());
    }
}
