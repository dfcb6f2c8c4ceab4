//! Comment like repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{CommentLike, Notification, comment_like, notification};
use crate::repositories::{GroupCount, into_count_map, map_db_err};
use gifted_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect,
    TransactionTrait,
};

/// Comment like repository for database operations.
#[derive(Clone)]
pub struct CommentLikeRepository {
    db: Arc<DatabaseConnection>,
}

impl CommentLikeRepository {
    /// Create a new comment like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the like a user left on a comment.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        comment_id: &str,
    ) -> AppResult<Option<comment_like::Model>> {
        CommentLike::find()
            .filter(comment_like::Column::UserId.eq(user_id))
            .filter(comment_like::Column::CommentId.eq(comment_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Insert a like and its notification in one transaction.
    pub async fn like(
        &self,
        edge: comment_like::ActiveModel,
        notification: Option<notification::ActiveModel>,
    ) -> AppResult<comment_like::Model> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let created = edge.insert(&txn).await.map_err(map_db_err)?;
        if let Some(n) = notification {
            n.insert(&txn).await.map_err(map_db_err)?;
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(created)
    }

    /// Delete a like and the `like_comment` notification it produced, in one
    /// transaction.
    ///
    /// Returns whether a like was actually removed.
    pub async fn unlike(
        &self,
        user_id: &str,
        comment_id: &str,
        comment_author_id: &str,
    ) -> AppResult<bool> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let deleted = CommentLike::delete_many()
            .filter(comment_like::Column::UserId.eq(user_id))
            .filter(comment_like::Column::CommentId.eq(comment_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        Notification::delete_many()
            .filter(notification::Column::RecipientId.eq(comment_author_id))
            .filter(notification::Column::SenderId.eq(user_id))
            .filter(
                notification::Column::NotificationType
                    .eq(notification::NotificationType::LikeComment),
            )
            .filter(notification::Column::CommentId.eq(comment_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(deleted.rows_affected > 0)
    }

    /// Like counts for many comments in one grouped query.
    pub async fn count_by_comments(
        &self,
        comment_ids: &[String],
    ) -> AppResult<HashMap<String, u64>> {
        if comment_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = CommentLike::find()
            .filter(comment_like::Column::CommentId.is_in(comment_ids.to_vec()))
            .select_only()
            .column_as(comment_like::Column::CommentId, "key")
            .column_as(comment_like::Column::Id.count(), "count")
            .group_by(comment_like::Column::CommentId)
            .into_model::<GroupCount>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(into_count_map(rows))
    }

    /// Subset of `comment_ids` the user has liked.
    pub async fn liked_among(
        &self,
        user_id: &str,
        comment_ids: &[String],
    ) -> AppResult<HashSet<String>> {
        if comment_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = CommentLike::find()
            .filter(comment_like::Column::UserId.eq(user_id))
            .filter(comment_like::Column::CommentId.is_in(comment_ids.to_vec()))
            .select_only()
            .column(comment_like::Column::CommentId)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(ids.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::test_utils::{assert_transaction, committed, logged_transactions};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    #[tokio::test]
    async fn test_find_by_pair_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<comment_like::Model>::new()])
                .into_connection(),
        );

        let repo = CommentLikeRepository::new(db);
        let result = repo.find_by_pair("user1", "c1").await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let like = comment_like::Model {
            id: "cl1".to_string(),
            user_id: "user1".to_string(),
            comment_id: "c1".to_string(),
            created_at: Utc::now().into(),
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[like]])
                .into_connection(),
        );

        let repo = CommentLikeRepository::new(db);
        let result = repo.find_by_pair("user1", "c1").await.unwrap();

        assert_eq!(result.unwrap().comment_id, "c1");
    }

    #[tokio::test]
    async fn test_like_writes_edge_and_notification_together() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[comment_like::Model {
                    id: "cl1".to_string(),
                    user_id: "alice".to_string(),
                    comment_id: "c1".to_string(),
                    created_at: Utc::now().into(),
                }]])
                .append_query_results([[notification::Model {
                    id: "n1".to_string(),
                    recipient_id: "bob".to_string(),
                    sender_id: "alice".to_string(),
                    notification_type: notification::NotificationType::LikeComment,
                    post_id: Some("p1".to_string()),
                    comment_id: Some("c1".to_string()),
                    is_read: false,
                    created_at: Utc::now().into(),
                }]])
                .into_connection(),
        );

        let repo = CommentLikeRepository::new(Arc::clone(&db));
        let edge = comment_like::ActiveModel {
            id: Set("cl1".to_string()),
            user_id: Set("alice".to_string()),
            comment_id: Set("c1".to_string()),
            ..Default::default()
        };
        let note = notification::ActiveModel {
            id: Set("n1".to_string()),
            recipient_id: Set("bob".to_string()),
            sender_id: Set("alice".to_string()),
            notification_type: Set(notification::NotificationType::LikeComment),
            post_id: Set(Some("p1".to_string())),
            comment_id: Set(Some("c1".to_string())),
            is_read: Set(false),
            ..Default::default()
        };

        repo.like(edge, Some(note)).await.unwrap();
        drop(repo);

        let log = logged_transactions(db);
        assert_eq!(log.len(), 1);
        assert_transaction(
            &log[0],
            &[
                &["INSERT INTO comment_like", "alice", "c1"],
                &["INSERT INTO notification", "bob", "alice", "like_comment", "c1"],
            ],
        );
    }

    #[tokio::test]
    async fn test_unlike_already_gone_still_clears_notification() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );

        let repo = CommentLikeRepository::new(Arc::clone(&db));
        assert!(!repo.unlike("alice", "c1", "bob").await.unwrap());
        drop(repo);

        let log = logged_transactions(db);
        let txns = committed(&log);
        assert_eq!(txns.len(), 1);
        assert_transaction(
            txns[0],
            &[
                &["DELETE FROM comment_like", "alice", "c1"],
                &[
                    "DELETE FROM notification",
                    "recipient_id",
                    "sender_id",
                    "notification_type",
                    "comment_id",
                    "bob",
                    "alice",
                    "like_comment",
                    "c1",
                ],
            ],
        );
    }

    #[tokio::test]
    async fn test_liked_among_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = CommentLikeRepository::new(db);
        assert!(repo.liked_among("user1", &[]).await.unwrap().is_empty());
    }
}
