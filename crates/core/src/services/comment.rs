//! Comment service.

use chrono::Utc;
use gifted_common::{AppError, AppResult, IdGenerator};
use gifted_db::{
    entities::{comment, notification::NotificationType},
    repositories::{CommentRepository, PostRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use validator::Validate;

use crate::services::notification::NotificationService;

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    notifications: NotificationService,
    id_gen: IdGenerator,
}

/// Input for commenting on a post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

/// Input for editing a comment.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentInput {
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(
        comment_repo: CommentRepository,
        post_repo: PostRepository,
        notifications: NotificationService,
    ) -> Self {
        Self {
            comment_repo,
            post_repo,
            notifications,
            id_gen: IdGenerator::new(),
        }
    }

    /// Comment on a post and notify its author.
    pub async fn create(
        &self,
        author_id: &str,
        post_id: &str,
        input: CreateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        let post = self.post_repo.get_by_id(post_id).await?;

        let comment_id = self.id_gen.generate();
        let now = Utc::now();
        let model = comment::ActiveModel {
            id: Set(comment_id.clone()),
            author_id: Set(author_id.to_string()),
            post_id: Set(post.id.clone()),
            text: Set(input.text),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let notification = self.notifications.build(
            &post.author_id,
            author_id,
            NotificationType::Comment,
            Some(&post.id),
            Some(&comment_id),
        );

        let comment = self.comment_repo.create(model, notification).await?;
        tracing::info!(comment_id = %comment.id, post_id = %post.id, "Comment created");

        Ok(comment)
    }

    /// Edit a comment. Comment author only.
    pub async fn update(
        &self,
        id: &str,
        user_id: &str,
        input: UpdateCommentInput,
    ) -> AppResult<comment::Model> {
        input.validate()?;
        let comment = self.comment_repo.get_by_id(id).await?;
        if comment.author_id != user_id {
            return Err(AppError::Forbidden(
                "You can only edit your own comments".to_string(),
            ));
        }

        let mut active: comment::ActiveModel = comment.into();
        active.text = Set(input.text);
        active.updated_at = Set(Utc::now().into());

        self.comment_repo.update(active).await
    }

    /// Delete a comment. Allowed for the comment author and the post author.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<()> {
        let comment = self.comment_repo.get_by_id(id).await?;

        if comment.author_id != user_id {
            let post = self.post_repo.get_by_id(&comment.post_id).await?;
            if post.author_id != user_id {
                return Err(AppError::Forbidden(
                    "You can only delete your own comments or comments on your posts".to_string(),
                ));
            }
        }

        self.comment_repo.delete(&comment.id).await?;
        tracing::info!(comment_id = %id, "Comment deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::post::tests::create_test_post;
    use crate::services::user::UserService;
    use gifted_db::entities::notification;
    use gifted_db::repositories::{FollowRepository, NotificationRepository, UserRepository};
    use gifted_db::test_utils::{assert_transaction, committed, logged_transactions};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: DatabaseConnection) -> CommentService {
        service_on(&Arc::new(db))
    }

    fn service_on(db: &Arc<DatabaseConnection>) -> CommentService {
        let users = UserService::new(
            UserRepository::new(Arc::clone(db)),
            FollowRepository::new(Arc::clone(db)),
        );
        let notifications = NotificationService::new(
            NotificationRepository::new(Arc::clone(db)),
            PostRepository::new(Arc::clone(db)),
            users,
        );
        CommentService::new(
            CommentRepository::new(Arc::clone(db)),
            PostRepository::new(Arc::clone(db)),
            notifications,
        )
    }

    fn create_test_comment(id: &str, author_id: &str, post_id: &str) -> comment::Model {
        comment::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            post_id: post_id.to_string(),
            text: "Lovely".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_create_on_missing_post() {
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<gifted_db::entities::post::Model>::new()])
                .into_connection(),
        );

        let result = svc
            .create(
                "u1",
                "missing",
                CreateCommentInput {
                    text: "hi".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_notifies_post_author() {
        let post = create_test_post("p1", "author");
        let comment = create_test_comment("c1", "commenter", "p1");
        let stored_notification = notification::Model {
            id: "n1".to_string(),
            recipient_id: "author".to_string(),
            sender_id: "commenter".to_string(),
            notification_type: NotificationType::Comment,
            post_id: Some("p1".to_string()),
            comment_id: Some("c1".to_string()),
            is_read: false,
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .append_query_results([[comment]])
                .append_query_results([[stored_notification]])
                .into_connection(),
        );

        let svc = service_on(&db);
        let created = svc
            .create(
                "commenter",
                "p1",
                CreateCommentInput {
                    text: "Lovely".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.post_id, "p1");
        drop(svc);

        let log = logged_transactions(db);
        let txns = committed(&log);
        assert_eq!(txns.len(), 1);
        assert_transaction(
            txns[0],
            &[
                &["INSERT INTO comment", "commenter", "p1", "Lovely"],
                &[
                    "INSERT INTO notification",
                    "author",
                    "commenter",
                    "comment",
                    "p1",
                ],
            ],
        );
    }

    #[tokio::test]
    async fn test_comment_on_own_post_writes_no_notification() {
        let post = create_test_post("p1", "author");
        let comment = create_test_comment("c1", "author", "p1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[post]])
                .append_query_results([[comment]])
                .into_connection(),
        );

        let svc = service_on(&db);
        svc.create(
            "author",
            "p1",
            CreateCommentInput {
                text: "Thanks all".to_string(),
            },
        )
        .await
        .unwrap();
        drop(svc);

        let log = logged_transactions(db);
        let txns = committed(&log);
        assert_eq!(txns.len(), 1);
        assert_transaction(txns[0], &[&["INSERT INTO comment", "author", "p1"]]);
    }

    #[tokio::test]
    async fn test_update_by_other_user_is_forbidden() {
        let comment = create_test_comment("c1", "author", "p1");
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .into_connection(),
        );

        let result = svc
            .update(
                "c1",
                "intruder",
                UpdateCommentInput {
                    text: "edited".to_string(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_post_author_may_delete_comment() {
        let comment = create_test_comment("c1", "commenter", "p1");
        let post = create_test_post("p1", "post_author");

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .append_query_results([[post]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        assert!(svc.delete("c1", "post_author").await.is_ok());
    }

    #[tokio::test]
    async fn test_stranger_may_not_delete_comment() {
        let comment = create_test_comment("c1", "commenter", "p1");
        let post = create_test_post("p1", "post_author");

        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment]])
                .append_query_results([[post]])
                .into_connection(),
        );

        let result = svc.delete("c1", "stranger").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
