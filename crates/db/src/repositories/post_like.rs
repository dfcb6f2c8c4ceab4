//! Post like repository.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::entities::{Notification, PostLike, notification, post_like};
use crate::repositories::{GroupCount, into_count_map, map_db_err};
use gifted_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};

/// Post like repository for database operations.
#[derive(Clone)]
pub struct PostLikeRepository {
    db: Arc<DatabaseConnection>,
}

impl PostLikeRepository {
    /// Create a new post like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the like a user left on a post.
    pub async fn find_by_pair(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<Option<post_like::Model>> {
        PostLike::find()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Insert a like and its notification in one transaction.
    pub async fn like(
        &self,
        edge: post_like::ActiveModel,
        notification: Option<notification::ActiveModel>,
    ) -> AppResult<post_like::Model> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let created = edge.insert(&txn).await.map_err(map_db_err)?;
        if let Some(n) = notification {
            n.insert(&txn).await.map_err(map_db_err)?;
        }

        txn.commit().await.map_err(map_db_err)?;
        Ok(created)
    }

    /// Delete a like and the `like_post` notification it produced, in one
    /// transaction.
    ///
    /// Returns whether a like was actually removed.
    pub async fn unlike(
        &self,
        user_id: &str,
        post_id: &str,
        post_author_id: &str,
    ) -> AppResult<bool> {
        let txn = self.db.begin().await.map_err(map_db_err)?;

        let deleted = PostLike::delete_many()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        Notification::delete_many()
            .filter(notification::Column::RecipientId.eq(post_author_id))
            .filter(notification::Column::SenderId.eq(user_id))
            .filter(
                notification::Column::NotificationType
                    .eq(notification::NotificationType::LikePost),
            )
            .filter(notification::Column::PostId.eq(post_id))
            .exec(&txn)
            .await
            .map_err(map_db_err)?;

        txn.commit().await.map_err(map_db_err)?;
        Ok(deleted.rows_affected > 0)
    }

    /// Likes on a post, newest first.
    pub async fn find_by_post(
        &self,
        post_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<post_like::Model>> {
        let mut query = PostLike::find()
            .filter(post_like::Column::PostId.eq(post_id))
            .order_by_desc(post_like::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(post_like::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)
    }

    /// Like counts for many posts in one grouped query.
    pub async fn count_by_posts(&self, post_ids: &[String]) -> AppResult<HashMap<String, u64>> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = PostLike::find()
            .filter(post_like::Column::PostId.is_in(post_ids.to_vec()))
            .select_only()
            .column_as(post_like::Column::PostId, "key")
            .column_as(post_like::Column::Id.count(), "count")
            .group_by(post_like::Column::PostId)
            .into_model::<GroupCount>()
            .all(self.db.as_ref())
            .await
            .map_err(map_db_err)?;

        Ok(into_count_map(rows))
    }

    /// Subset of `post_ids` the user has liked.
    pub async fn liked_among(
        &self,
        user_id: &str,
        post_ids: &[String],
    ) -> AppResult<HashSet<String>> {
        if post_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let ids = PostLike::find()
            .filter(post_like::Column::UserId.eq(user_id))
            .filter(post_like::Column::PostId.is_in(post_ids.to_vec()))
            .select_only()
            .column(post_like::Column::PostId)
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
    use maplit::btreemap;
    use crate::test_utils::{assert_transaction, committed, logged_transactions};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_like(id: &str, user_id: &str, post_id: &str) -> post_like::Model {
        post_like::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            post_id: post_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_find_by_pair_found() {
        let like = create_test_like("l1", "user1", "p1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[like]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        let result = repo.find_by_pair("user1", "p1").await.unwrap();

        assert!(result.is_some());
    }

    #[tokio::test]
    async fn test_like_without_notification() {
        let like = create_test_like("l1", "user1", "p1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[like]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        let active = post_like::ActiveModel {
            id: Set("l1".to_string()),
            user_id: Set("user1".to_string()),
            post_id: Set("p1".to_string()),
            ..Default::default()
        };

        let created = repo.like(active, None).await.unwrap();
        assert_eq!(created.post_id, "p1");
    }

    #[tokio::test]
    async fn test_like_writes_edge_and_notification_together() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_like("l1", "alice", "p1")]])
                .append_query_results([[notification::Model {
                    id: "n1".to_string(),
                    recipient_id: "bob".to_string(),
                    sender_id: "alice".to_string(),
                    notification_type: notification::NotificationType::LikePost,
                    post_id: Some("p1".to_string()),
                    comment_id: None,
                    is_read: false,
                    created_at: Utc::now().into(),
                }]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(Arc::clone(&db));
        let edge = post_like::ActiveModel {
            id: Set("l1".to_string()),
            user_id: Set("alice".to_string()),
            post_id: Set("p1".to_string()),
            ..Default::default()
        };
        let note = notification::ActiveModel {
            id: Set("n1".to_string()),
            recipient_id: Set("bob".to_string()),
            sender_id: Set("alice".to_string()),
            notification_type: Set(notification::NotificationType::LikePost),
            post_id: Set(Some("p1".to_string())),
            comment_id: Set(None),
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
                &["INSERT INTO post_like", "alice", "p1"],
                &["INSERT INTO notification", "bob", "alice", "like_post", "p1"],
            ],
        );
    }

    #[tokio::test]
    async fn test_unlike_removes_like_and_its_notification() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                ])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(Arc::clone(&db));
        assert!(repo.unlike("alice", "p1", "bob").await.unwrap());
        drop(repo);

        let log = logged_transactions(db);
        let txns = committed(&log);
        assert_eq!(txns.len(), 1);
        assert_transaction(
            txns[0],
            &[
                &["DELETE FROM post_like", "user_id", "post_id", "alice", "p1"],
                &[
                    "DELETE FROM notification",
                    "recipient_id",
                    "sender_id",
                    "notification_type",
                    "post_id",
                    "bob",
                    "alice",
                    "like_post",
                    "p1",
                ],
            ],
        );
    }

    #[tokio::test]
    async fn test_count_by_posts() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[btreemap! {
                    "key" => sea_orm::Value::from("p1"),
                    "count" => sea_orm::Value::BigInt(Some(4)),
                }]])
                .into_connection(),
        );

        let repo = PostLikeRepository::new(db);
        let counts = repo
            .count_by_posts(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();

        assert_eq!(counts.get("p1"), Some(&4));
        assert_eq!(counts.get("p2"), None);
    }

    #[tokio::test]
    async fn test_count_by_posts_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = PostLikeRepository::new(db);
        assert!(repo.count_by_posts(&[]).await.unwrap().is_empty());
    }
}
